//! Root role engine.
//!
//! Builds, signs, versions, and rotates the `root` role; validates
//! client-signed root updates; adds new role slots; and signs arbitrary role
//! payloads for the repo server (the signing oracle).

use crate::error::{ApiError, ApiResult};
use crate::keygen;
use crate::state::AppState;
use armory_core::canonical;
use armory_core::keys::{KeyId, KeyType, TufKey};
use armory_core::roles::{ClientSignature, RoleKeys, RoleType, RootRole, SignedPayload};
use armory_metadata::models::{KeyGenRequestRow, KeyRow, SignedRootRoleRow};
use armory_metadata::repos::KeyGenStatus;
use armory_signer::{KeyPair, sign_canonical, verify_client_signature};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use time::OffsetDateTime;
use uuid::Uuid;

/// Create the key hierarchy for a new repo: one key generation request per
/// key, `threshold` keys per canonical role.
///
/// With `force_sync` the requests are inserted in ERROR state (so the
/// background loop ignores them), generated inline on the request thread, and
/// the initial root is produced before returning.
pub async fn create_root(
    state: &AppState,
    repo_id: Uuid,
    key_type: KeyType,
    threshold: u32,
    force_sync: bool,
) -> ApiResult<Vec<Uuid>> {
    if state.metadata.latest_root_role(repo_id).await?.is_some()
        || state.metadata.repo_has_keys(repo_id).await?
        || !state
            .metadata
            .key_gen_requests_for_repo(repo_id)
            .await?
            .is_empty()
    {
        return Err(ApiError::EntityAlreadyExists(format!(
            "repo {repo_id} already has a key hierarchy"
        )));
    }

    let threshold = threshold.max(1);
    let now = OffsetDateTime::now_utc();
    let initial_status = if force_sync {
        KeyGenStatus::Error
    } else {
        KeyGenStatus::Requested
    };

    let mut requests = Vec::new();
    for role in RoleType::CANONICAL {
        for _ in 0..threshold {
            requests.push(KeyGenRequestRow {
                id: Uuid::new_v4(),
                repo_id,
                role_type: role.to_string(),
                key_type: key_type.to_string(),
                key_size: key_type.default_key_size() as i64,
                threshold: threshold as i64,
                status: initial_status.as_str().to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            });
        }
    }

    for request in &requests {
        state.metadata.create_key_gen_request(request).await?;
    }
    tracing::info!(
        repo_id = %repo_id,
        key_type = %key_type,
        requests = requests.len(),
        force_sync,
        "key hierarchy requested"
    );

    if force_sync {
        for request in &requests {
            keygen::generate_for_request(state, request).await?;
        }
        build_initial_root(state, repo_id).await?;
    }

    Ok(requests.iter().map(|r| r.id).collect())
}

/// Return the latest root role, producing the initial or a refreshed version
/// when needed.
///
/// A stored root whose expiry falls before `max(now, expires_not_before)` is
/// re-issued with the same key set and a version bump of exactly one. When
/// the root private keys are offline the stored document is served as-is.
pub async fn find_fresh(
    state: &AppState,
    repo_id: Uuid,
    expires_not_before: Option<OffsetDateTime>,
) -> ApiResult<SignedPayload<RootRole>> {
    let Some(row) = state.metadata.latest_root_role(repo_id).await? else {
        return build_initial_root(state, repo_id).await;
    };

    let now = OffsetDateTime::now_utc();
    let refresh_before = match expires_not_before {
        Some(floor) if floor > now => floor,
        _ => now,
    };
    if row.expires_at > refresh_before {
        return payload_from_row(&row);
    }

    let previous = payload_from_row(&row)?;
    let mut next = previous.signed.clone();
    next.version += 1;
    let ttl_expiry = now + state.config.tuf.root_ttl();
    next.expires = if ttl_expiry > refresh_before {
        ttl_expiry
    } else {
        refresh_before
    };

    match sign_root_document(state, repo_id, &next).await {
        Ok(signatures) => {
            let payload = SignedPayload::new(signatures, next);
            state
                .metadata
                .insert_root_role(&row_from_payload(repo_id, &payload)?)
                .await?;
            crate::metrics::ROOT_ROLES_SIGNED.inc();
            tracing::info!(repo_id = %repo_id, version = payload.signed.version, "root role refreshed");
            Ok(payload)
        }
        // All root keys offline (e.g. fully client-managed root): serve stored.
        Err(ApiError::RoleKeyNotFound(_)) => Ok(previous),
        Err(e) => Err(e),
    }
}

/// Fetch a specific historical root version.
pub async fn find_version(
    state: &AppState,
    repo_id: Uuid,
    version: u64,
) -> ApiResult<SignedPayload<RootRole>> {
    let row = state
        .metadata
        .get_root_role(repo_id, version as i64)
        .await?
        .ok_or_else(|| {
            ApiError::MissingEntity(format!("root role version {version} for repo {repo_id}"))
        })?;
    payload_from_row(&row)
}

/// Build the initial root when the repo's key set is complete. Returns false
/// when keys are still pending or a root already exists.
pub async fn initialize_if_ready(state: &AppState, repo_id: Uuid) -> ApiResult<bool> {
    if state.metadata.latest_root_role(repo_id).await?.is_some() {
        return Ok(false);
    }
    match build_initial_root(state, repo_id).await {
        Ok(_) => Ok(true),
        Err(ApiError::KeysNotReady(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Rotate the root key: publish a cross-signed root whose root key set is
/// only the new key, then take the outgoing private keys offline. Role key
/// assignments for targets/snapshot/timestamp are preserved.
pub async fn rotate(state: &AppState, repo_id: Uuid) -> ApiResult<SignedPayload<RootRole>> {
    let row = state
        .metadata
        .latest_root_role(repo_id)
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("root role for repo {repo_id}")))?;
    let previous = payload_from_row(&row)?;

    let old_root_keyids = previous
        .signed
        .role_keys(RoleType::Root)
        .ok_or_else(|| ApiError::Internal("root document declares no root role".to_string()))?
        .keyids
        .clone();

    let key_type = repo_key_type(state, repo_id, &old_root_keyids).await?;
    let (new_keyid, new_key) =
        keygen::generate_and_store_key(state, repo_id, RoleType::Root, key_type).await?;

    let mut keys = previous.signed.keys.clone();
    for keyid in &old_root_keyids {
        keys.remove(keyid);
    }
    keys.insert(new_keyid.clone(), new_key);

    let mut roles = previous.signed.roles.clone();
    roles.insert(
        RoleType::Root,
        RoleKeys {
            keyids: vec![new_keyid.clone()],
            threshold: 1,
        },
    );

    let now = OffsetDateTime::now_utc();
    let next = RootRole::new(
        keys,
        roles,
        previous.signed.version + 1,
        now + state.config.tuf.root_ttl(),
    );

    // Cross-sign: the outgoing private keys are still online at this point,
    // and the incoming key signs alongside them.
    let canonical_bytes = canonical::to_canonical_json(&next)?;
    let mut signatures = Vec::new();
    let mut signer_ids = HashSet::new();
    for key_row in online_keys_among(state, repo_id, &old_root_keyids).await? {
        let (keyid, keypair) = load_keypair(state, &key_row).await?;
        if signer_ids.insert(keyid.clone()) {
            signatures.push(sign_canonical(&keypair, &keyid, &canonical_bytes)?);
        }
    }
    let new_key_row = state
        .metadata
        .get_key(repo_id, new_keyid.as_str())
        .await?
        .ok_or_else(|| ApiError::Internal("rotated key not found after insert".to_string()))?;
    let (keyid, keypair) = load_keypair(state, &new_key_row).await?;
    if signer_ids.insert(keyid.clone()) {
        signatures.push(sign_canonical(&keypair, &keyid, &canonical_bytes)?);
    }

    let payload = SignedPayload::new(signatures, next);
    state
        .metadata
        .insert_root_role(&row_from_payload(repo_id, &payload)?)
        .await?;
    crate::metrics::ROOT_ROLES_SIGNED.inc();

    for keyid in &old_root_keyids {
        if let Some(key) = state.metadata.get_key(repo_id, keyid.as_str()).await?
            && let Some(private_ref) = key.private_ref
        {
            state.vault.delete(&private_ref).await?;
            state
                .metadata
                .clear_private_ref(repo_id, keyid.as_str())
                .await?;
        }
    }

    tracing::info!(
        repo_id = %repo_id,
        version = payload.signed.version,
        new_key = %new_keyid,
        "root role rotated"
    );
    Ok(payload)
}

/// The next root version for offline signing, unsigned.
pub async fn next_unsigned(state: &AppState, repo_id: Uuid) -> ApiResult<RootRole> {
    let row = state
        .metadata
        .latest_root_role(repo_id)
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("root role for repo {repo_id}")))?;
    let previous = payload_from_row(&row)?;

    let mut next = previous.signed;
    next.version += 1;
    next.expires = OffsetDateTime::now_utc() + state.config.tuf.root_ttl();
    Ok(next)
}

/// Validate and persist a client-signed root update.
///
/// All checks run and every breach is collected so the caller sees the full
/// cause list: version is exactly previous + 1, role entries are well-formed,
/// embedded key material matches its key IDs, and the document is signed
/// under the threshold of both the previous and the new root key sets.
pub async fn store_client_root(
    state: &AppState,
    repo_id: Uuid,
    payload: SignedPayload<RootRole>,
) -> ApiResult<()> {
    let row = state
        .metadata
        .latest_root_role(repo_id)
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("root role for repo {repo_id}")))?;
    let previous = payload_from_row(&row)?;

    let mut causes = Vec::new();

    let expected = previous.signed.version + 1;
    if payload.signed.version != expected {
        causes.push(format!(
            "version must be exactly {expected}, got {}",
            payload.signed.version
        ));
    }

    if payload.signed.role_keys(RoleType::Root).is_none() {
        causes.push("root role entry is missing".to_string());
    }
    for (role, role_keys) in &payload.signed.roles {
        if role_keys.threshold < 1 {
            causes.push(format!(
                "role {role} declares invalid threshold {}",
                role_keys.threshold
            ));
        }
        if role_keys.keyids.is_empty() {
            causes.push(format!("role {role} declares no keys"));
        }
        for keyid in &role_keys.keyids {
            if !payload.signed.keys.contains_key(keyid) {
                causes.push(format!("role {role} references undeclared key {keyid}"));
            }
        }
    }

    for (keyid, key) in &payload.signed.keys {
        match key.key_id() {
            Ok(computed) if &computed == keyid => {}
            Ok(computed) => causes.push(format!(
                "key {keyid} does not match its public material (computed {computed})"
            )),
            Err(e) => causes.push(format!("key {keyid} is malformed: {e}")),
        }
    }

    let canonical_bytes = canonical::to_canonical_json(&payload.signed)?;
    if let Some(previous_keys) = previous.signed.role_keys(RoleType::Root) {
        let valid = count_valid_signatures(&previous.signed, &canonical_bytes, &payload.signatures);
        if valid < previous_keys.threshold {
            causes.push(format!(
                "signed under {valid} of {} required previous root keys",
                previous_keys.threshold
            ));
        }
    }
    if let Some(new_keys) = payload.signed.role_keys(RoleType::Root) {
        let valid = count_valid_signatures(&payload.signed, &canonical_bytes, &payload.signatures);
        if valid < new_keys.threshold {
            causes.push(format!(
                "signed under {valid} of {} required new root keys",
                new_keys.threshold
            ));
        }
    }

    if !causes.is_empty() {
        return Err(ApiError::InvalidRootRole(causes));
    }

    state
        .metadata
        .insert_root_role(&row_from_payload(repo_id, &payload)?)
        .await?;
    tracing::info!(repo_id = %repo_id, version = payload.signed.version, "client-signed root stored");
    Ok(())
}

/// Add role slots to the root, generating their keys synchronously.
/// Idempotent: roles already present are skipped, and a root with nothing to
/// add is returned unchanged.
pub async fn add_roles(
    state: &AppState,
    repo_id: Uuid,
    new_roles: &[RoleType],
) -> ApiResult<SignedPayload<RootRole>> {
    let current = find_fresh(state, repo_id, None).await?;

    let missing: Vec<RoleType> = new_roles
        .iter()
        .copied()
        .filter(|role| !current.signed.roles.contains_key(role))
        .collect();
    if missing.is_empty() {
        return Ok(current);
    }

    let root_keyids = current
        .signed
        .role_keys(RoleType::Root)
        .map(|rk| rk.keyids.clone())
        .unwrap_or_default();
    let key_type = repo_key_type(state, repo_id, &root_keyids).await?;

    let mut keys = current.signed.keys.clone();
    let mut roles = current.signed.roles.clone();
    for role in &missing {
        let (keyid, key) = keygen::generate_and_store_key(state, repo_id, *role, key_type).await?;
        keys.insert(keyid.clone(), key);
        roles.insert(
            *role,
            RoleKeys {
                keyids: vec![keyid],
                threshold: 1,
            },
        );
    }

    let next = RootRole::new(
        keys,
        roles,
        current.signed.version + 1,
        OffsetDateTime::now_utc() + state.config.tuf.root_ttl(),
    );
    let signatures = sign_root_document(state, repo_id, &next).await?;
    let payload = SignedPayload::new(signatures, next);
    state
        .metadata
        .insert_root_role(&row_from_payload(repo_id, &payload)?)
        .await?;
    crate::metrics::ROOT_ROLES_SIGNED.inc();
    tracing::info!(repo_id = %repo_id, roles = ?missing, "role slots added to root");
    Ok(payload)
}

/// The signing oracle: sign an arbitrary role payload with every currently
/// online private key for the role.
pub async fn sign_payload(
    state: &AppState,
    repo_id: Uuid,
    role: RoleType,
    value: Value,
) -> ApiResult<SignedPayload<Value>> {
    let rows = state
        .metadata
        .keys_for_role(repo_id, &role.to_string())
        .await?;
    let online: Vec<KeyRow> = rows
        .into_iter()
        .filter(|row| row.private_ref.is_some())
        .collect();
    if online.is_empty() {
        return Err(ApiError::RoleKeyNotFound(format!(
            "no online key for role {role} in repo {repo_id}"
        )));
    }

    let canonical_bytes = canonical::to_canonical_json(&value)?;
    let mut signatures = Vec::new();
    for row in &online {
        let (keyid, keypair) = load_keypair(state, row).await?;
        signatures.push(sign_canonical(&keypair, &keyid, &canonical_bytes)?);
    }

    crate::metrics::PAYLOADS_SIGNED.inc();
    Ok(SignedPayload::new(signatures, value))
}

/// Take a private key offline: delete it from the vault and null the handle.
/// Deleting an already-offline key is a no-op.
pub async fn delete_private_key(state: &AppState, repo_id: Uuid, key_id: &str) -> ApiResult<()> {
    let key = state
        .metadata
        .get_key(repo_id, key_id)
        .await?
        .ok_or_else(|| ApiError::MissingEntity(format!("key {key_id}")))?;

    if let Some(private_ref) = key.private_ref {
        state.vault.delete(&private_ref).await?;
        state.metadata.clear_private_ref(repo_id, key_id).await?;
        tracing::info!(repo_id = %repo_id, key_id = %key_id, "private key taken offline");
    }
    Ok(())
}

/// Move a repo's errored key generation requests back to REQUESTED.
pub async fn retry_key_generation(state: &AppState, repo_id: Uuid) -> ApiResult<u64> {
    let retried = state.metadata.retry_key_gen_requests(repo_id).await?;
    tracing::info!(repo_id = %repo_id, retried, "errored key generation requests retried");
    Ok(retried)
}

async fn build_initial_root(
    state: &AppState,
    repo_id: Uuid,
) -> ApiResult<SignedPayload<RootRole>> {
    let requests = state.metadata.key_gen_requests_for_repo(repo_id).await?;
    if requests.is_empty() && !state.metadata.repo_has_keys(repo_id).await? {
        return Err(ApiError::MissingEntity(format!("repo {repo_id}")));
    }
    if requests
        .iter()
        .any(|r| r.status == KeyGenStatus::Requested.as_str())
    {
        return Err(ApiError::KeysNotReady(
            "key generation in progress".to_string(),
        ));
    }
    if requests
        .iter()
        .any(|r| r.status == KeyGenStatus::Error.as_str())
    {
        return Err(ApiError::KeysNotReady(
            "key generation failed; retry the errored requests".to_string(),
        ));
    }

    let mut keys = BTreeMap::new();
    let mut roles = BTreeMap::new();
    for role in RoleType::CANONICAL {
        let rows = state
            .metadata
            .keys_for_role(repo_id, &role.to_string())
            .await?;
        if rows.is_empty() {
            return Err(ApiError::KeysNotReady(format!("no keys for role {role}")));
        }

        let mut keyids = Vec::new();
        for row in &rows {
            let key: TufKey = serde_json::from_str(&row.public_key)
                .map_err(|e| ApiError::Internal(format!("stored key is corrupt: {e}")))?;
            let keyid = KeyId::from(row.key_id.clone());
            keyids.push(keyid.clone());
            keys.insert(keyid, key);
        }
        let threshold = keyids.len() as u32;
        roles.insert(role, RoleKeys { keyids, threshold });
    }

    let root = RootRole::new(
        keys,
        roles,
        1,
        OffsetDateTime::now_utc() + state.config.tuf.root_ttl(),
    );
    let signatures = sign_root_document(state, repo_id, &root).await?;
    let payload = SignedPayload::new(signatures, root);
    state
        .metadata
        .insert_root_role(&row_from_payload(repo_id, &payload)?)
        .await?;
    crate::metrics::ROOT_ROLES_SIGNED.inc();
    tracing::info!(repo_id = %repo_id, "initial root role signed");
    Ok(payload)
}

/// Sign a root document with every online key among its declared root keys.
async fn sign_root_document(
    state: &AppState,
    repo_id: Uuid,
    root: &RootRole,
) -> ApiResult<Vec<ClientSignature>> {
    let declared = root
        .role_keys(RoleType::Root)
        .ok_or_else(|| ApiError::Internal("root document declares no root role".to_string()))?
        .keyids
        .clone();

    let online = online_keys_among(state, repo_id, &declared).await?;
    if online.is_empty() {
        return Err(ApiError::RoleKeyNotFound(format!(
            "no online root key for repo {repo_id}"
        )));
    }

    let canonical_bytes = canonical::to_canonical_json(root)?;
    let mut signatures = Vec::new();
    for row in &online {
        let (keyid, keypair) = load_keypair(state, row).await?;
        signatures.push(sign_canonical(&keypair, &keyid, &canonical_bytes)?);
    }
    Ok(signatures)
}

/// Server-managed keys among `declared` whose private half is still online.
async fn online_keys_among(
    state: &AppState,
    repo_id: Uuid,
    declared: &[KeyId],
) -> ApiResult<Vec<KeyRow>> {
    let mut online = Vec::new();
    for keyid in declared {
        if let Some(row) = state.metadata.get_key(repo_id, keyid.as_str()).await?
            && row.private_ref.is_some()
        {
            online.push(row);
        }
    }
    Ok(online)
}

async fn load_keypair(state: &AppState, row: &KeyRow) -> ApiResult<(KeyId, KeyPair)> {
    let private_ref = row.private_ref.as_deref().ok_or_else(|| {
        ApiError::RoleKeyNotFound(format!("key {} is offline", row.key_id))
    })?;
    let pem = state.vault.get(private_ref).await?;
    let key_type: KeyType = row
        .key_type
        .parse()
        .map_err(|_| ApiError::Internal(format!("stored key type '{}' unknown", row.key_type)))?;
    let keypair = KeyPair::from_private_pem(key_type, &pem)?;
    Ok((KeyId::from(row.key_id.clone()), keypair))
}

/// Count distinct valid signatures from the root key set declared by `doc`.
fn count_valid_signatures(
    doc: &RootRole,
    canonical_bytes: &[u8],
    signatures: &[ClientSignature],
) -> u32 {
    let Some(role_keys) = doc.role_keys(RoleType::Root) else {
        return 0;
    };

    let mut seen = HashSet::new();
    let mut valid = 0;
    for signature in signatures {
        if !role_keys.keyids.contains(&signature.keyid) {
            continue;
        }
        if !seen.insert(signature.keyid.clone()) {
            continue;
        }
        let Some(key) = doc.key(&signature.keyid) else {
            continue;
        };
        if verify_client_signature(key, canonical_bytes, signature).is_ok() {
            valid += 1;
        }
    }
    valid
}

/// Key type used for new server-generated keys: whatever the repo's root
/// keys use, falling back to Ed25519.
async fn repo_key_type(
    state: &AppState,
    repo_id: Uuid,
    root_keyids: &[KeyId],
) -> ApiResult<KeyType> {
    for keyid in root_keyids {
        if let Some(row) = state.metadata.get_key(repo_id, keyid.as_str()).await?
            && let Ok(key_type) = row.key_type.parse()
        {
            return Ok(key_type);
        }
    }
    Ok(KeyType::Ed25519)
}

fn payload_from_row(row: &SignedRootRoleRow) -> ApiResult<SignedPayload<RootRole>> {
    let signed: RootRole = serde_json::from_str(&row.canonical_bytes)
        .map_err(|e| ApiError::Internal(format!("stored root role is corrupt: {e}")))?;
    let signatures: Vec<ClientSignature> = serde_json::from_str(&row.signatures)
        .map_err(|e| ApiError::Internal(format!("stored signatures are corrupt: {e}")))?;
    Ok(SignedPayload::new(signatures, signed))
}

fn row_from_payload(
    repo_id: Uuid,
    payload: &SignedPayload<RootRole>,
) -> ApiResult<SignedRootRoleRow> {
    let canonical_bytes = String::from_utf8(canonical::to_canonical_json(&payload.signed)?)
        .map_err(|e| ApiError::Internal(format!("canonical bytes are not utf-8: {e}")))?;
    let signatures = serde_json::to_string(&payload.signatures)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(SignedRootRoleRow {
        repo_id,
        version: payload.signed.version as i64,
        expires_at: payload.signed.expires,
        canonical_bytes,
        signatures,
        created_at: OffsetDateTime::now_utc(),
    })
}
