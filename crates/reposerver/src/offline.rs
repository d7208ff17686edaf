//! Offline-signed targets intake and the delegations verifier.
//!
//! An offline push replaces the server-signed `targets` with a client-signed
//! document. Preconditions are evaluated in order and the first failure wins:
//! optimistic checksum, well-formedness, signature threshold, delegations
//! consistency. On success only `snapshot` and `timestamp` are regenerated;
//! the pushed targets is already signed.

use crate::error::{ApiError, ApiResult};
use crate::rolegen;
use crate::state::AppState;
use armory_core::canonical;
use armory_core::keys::TufKey;
use armory_core::roles::{
    ClientSignature, Delegations, RoleType, SignedPayload, TargetsRole,
};
use armory_core::targets::{TargetCustom, TargetFilename};
use armory_metadata::models::DelegationRow;
use armory_signer::verify_client_signature;
use std::collections::{BTreeMap, HashSet};
use time::OffsetDateTime;
use uuid::Uuid;

/// Store a client-signed `targets` document.
pub async fn store_offline_targets(
    state: &AppState,
    repo_id: Uuid,
    payload: SignedPayload<TargetsRole>,
    checksum_header: Option<&str>,
) -> ApiResult<()> {
    let current = state
        .metadata
        .get_signed_role(repo_id, &RoleType::Targets.to_string())
        .await?;

    // 1. Optimistic concurrency. The first-ever push needs no checksum.
    if let Some(current_row) = &current {
        match checksum_header {
            None => {
                return Err(ApiError::PreconditionRequired(format!(
                    "{} header is required when a targets role exists",
                    armory_core::ROLE_CHECKSUM_HEADER
                )));
            }
            Some(checksum) if !checksum.eq_ignore_ascii_case(&current_row.checksum_hex) => {
                return Err(ApiError::PreconditionFailed(
                    "targets role checksum does not match the current version".to_string(),
                ));
            }
            _ => {}
        }
    }

    // Republishing the identical document at the current version is a no-op.
    let canonical_payload = canonical::to_canonical_json(&payload)?;
    if let Some(current_row) = &current
        && payload.signed.version == current_row.version as u64
        && canonical_payload == current_row.canonical_bytes.as_bytes()
    {
        return Ok(());
    }

    let prior = match &current {
        Some(row) => Some(rolegen::parse_targets_payload(row)?.signed),
        None => None,
    };

    // 2. Well-formedness of every item; items new to this push must carry
    // full custom metadata.
    for (filename, item) in &payload.signed.targets {
        TargetFilename::parse(filename.clone())?;
        if item.length == 0 {
            return Err(ApiError::BadRequest(format!(
                "target {filename} declares zero length"
            )));
        }
        if !item.hashes.get("sha256").is_some_and(|h| !h.is_empty()) {
            return Err(ApiError::BadRequest(format!(
                "target {filename} is missing a sha256 hash"
            )));
        }

        let is_new = prior
            .as_ref()
            .is_none_or(|p| !p.targets.contains_key(filename));
        if is_new {
            let Some(custom) = &item.custom else {
                return Err(ApiError::BadRequest(format!(
                    "new target {filename} must include custom metadata"
                )));
            };
            serde_json::from_value::<TargetCustom>(custom.clone()).map_err(|e| {
                ApiError::BadRequest(format!("new target {filename} has invalid custom metadata: {e}"))
            })?;
        }
    }

    // 3. Signature validity against the current root's targets key set.
    let root = state.keys.fetch_root(repo_id, None).await?;
    let role_keys = root
        .signed
        .role_keys(RoleType::Targets)
        .ok_or_else(|| ApiError::Internal("root declares no targets role".to_string()))?;
    let signed_bytes = canonical::to_canonical_json(&payload.signed)?;
    verify_threshold(
        &signed_bytes,
        &payload.signatures,
        &root.signed.keys,
        &role_keys.keyids.iter().cloned().collect::<Vec<_>>(),
        role_keys.threshold,
    )?;

    // 4. Delegations consistency.
    if let Some(delegations) = &payload.signed.delegations {
        validate_delegations_block(delegations)?;
    }

    // Version bump rule, then persist the pushed document and regenerate
    // snapshot/timestamp only.
    let expected = current.as_ref().map_or(1, |r| r.version as u64 + 1);
    if payload.signed.version != expected {
        return Err(ApiError::InvalidVersionBump {
            expected,
            got: payload.signed.version,
        });
    }

    let floor = state.metadata.get_expires_not_before(repo_id).await?;
    let targets_row = rolegen::row_from_signed_payload(
        repo_id,
        RoleType::Targets,
        &payload,
        payload.signed.version,
        payload.signed.expires,
    )?;
    let [snapshot_row, timestamp_row] = rolegen::derive_snapshot_and_timestamp(
        state,
        repo_id,
        &root,
        targets_row.canonical_bytes.as_bytes(),
        payload.signed.version,
        floor,
    )
    .await?;

    state
        .metadata
        .persist_signed_roles(repo_id, None, &[targets_row, snapshot_row, timestamp_row])
        .await?;
    crate::metrics::OFFLINE_PUSHES.inc();
    tracing::info!(
        repo_id = %repo_id,
        version = payload.signed.version,
        targets = payload.signed.targets.len(),
        "offline-signed targets stored"
    );

    // Targets dropped by this push lose their stored blobs.
    if let Some(prior) = prior {
        for filename in prior.targets.keys() {
            if payload.signed.targets.contains_key(filename) {
                continue;
            }
            let Ok(parsed) = TargetFilename::parse(filename.clone()) else {
                continue;
            };
            match state.storage.exists(repo_id, &parsed).await {
                Ok(true) => {
                    if let Err(e) = state.storage.delete(repo_id, &parsed).await {
                        tracing::warn!(repo_id = %repo_id, filename = %filename, error = %e, "failed to delete dropped target blob");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(repo_id = %repo_id, filename = %filename, error = %e, "failed to check dropped target blob");
                }
            }
        }
    }

    Ok(())
}

/// Validate and store a pushed delegated targets document.
pub async fn store_delegated_targets(
    state: &AppState,
    repo_id: Uuid,
    name: &str,
    payload: SignedPayload<TargetsRole>,
) -> ApiResult<()> {
    let targets_row = state
        .metadata
        .get_signed_role(repo_id, &RoleType::Targets.to_string())
        .await?
        .ok_or_else(|| ApiError::DelegationNotDefined(format!("repo {repo_id} has no targets role")))?;
    let targets = rolegen::parse_targets_payload(&targets_row)?;

    let delegations = targets
        .signed
        .delegations
        .ok_or_else(|| ApiError::DelegationNotDefined(name.to_string()))?;
    let delegation = delegations
        .role(name)
        .ok_or_else(|| ApiError::DelegationNotDefined(name.to_string()))?;

    if delegation.threshold == 0 {
        return Err(ApiError::PayloadSignatureInvalid(format!(
            "delegation {name} declares a zero threshold"
        )));
    }

    let signed_bytes = canonical::to_canonical_json(&payload.signed)?;
    verify_threshold(
        &signed_bytes,
        &payload.signatures,
        &delegations.keys,
        &delegation.keyids,
        delegation.threshold,
    )?;

    let stored = state.metadata.get_delegation(repo_id, name).await?;
    let minimum = stored.as_ref().map_or(1, |d| d.version as u64 + 1);
    if payload.signed.version < minimum {
        return Err(ApiError::InvalidVersionBump {
            expected: minimum,
            got: payload.signed.version,
        });
    }

    let canonical_bytes = String::from_utf8(canonical::to_canonical_json(&payload)?)
        .map_err(|e| ApiError::Internal(format!("canonical bytes are not utf-8: {e}")))?;
    let now = OffsetDateTime::now_utc();
    state
        .metadata
        .upsert_delegation(&DelegationRow {
            repo_id,
            name: name.to_string(),
            version: payload.signed.version as i64,
            canonical_bytes,
            created_at: now,
            updated_at: now,
        })
        .await?;

    tracing::info!(repo_id = %repo_id, name, version = payload.signed.version, "delegated targets stored");
    Ok(())
}

/// Verify signatures against a declared key set: unknown key IDs, duplicate
/// signers, and keys outside the declared set are rejected outright; the
/// count of cryptographically valid signatures must meet the threshold.
fn verify_threshold(
    signed_bytes: &[u8],
    signatures: &[ClientSignature],
    keys: &BTreeMap<armory_core::keys::KeyId, TufKey>,
    declared: &[armory_core::keys::KeyId],
    threshold: u32,
) -> ApiResult<()> {
    let mut seen = HashSet::new();
    let mut valid = 0u32;

    for signature in signatures {
        if !declared.contains(&signature.keyid) {
            return Err(ApiError::PayloadSignatureInvalid(format!(
                "signature from key {} which is not among the declared keys",
                signature.keyid
            )));
        }
        if !seen.insert(signature.keyid.clone()) {
            return Err(ApiError::PayloadSignatureInvalid(format!(
                "duplicate signature from key {}",
                signature.keyid
            )));
        }
        let key = keys.get(&signature.keyid).ok_or_else(|| {
            ApiError::PayloadSignatureInvalid(format!(
                "signature from unknown key {}",
                signature.keyid
            ))
        })?;
        if verify_client_signature(key, signed_bytes, signature).is_ok() {
            valid += 1;
        }
    }

    if valid < threshold {
        return Err(ApiError::PayloadSignatureInvalid(format!(
            "{valid} valid signatures, {threshold} required"
        )));
    }
    Ok(())
}

/// Every referenced key ID must be declared and every path pattern must be
/// well-formed.
fn validate_delegations_block(delegations: &Delegations) -> ApiResult<()> {
    for role in &delegations.roles {
        if role.name.is_empty() {
            return Err(ApiError::BadRequest(
                "delegation with empty name".to_string(),
            ));
        }
        for keyid in &role.keyids {
            if !delegations.keys.contains_key(keyid) {
                return Err(ApiError::BadRequest(format!(
                    "delegation {} references undeclared key {keyid}",
                    role.name
                )));
            }
        }
        for pattern in &role.paths {
            validate_path_pattern(pattern).map_err(|e| {
                ApiError::BadRequest(format!("delegation {} has invalid path: {e}", role.name))
            })?;
        }
    }
    Ok(())
}

fn validate_path_pattern(pattern: &str) -> Result<(), String> {
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }
    if pattern.len() > armory_core::targets::MAX_FILENAME_LENGTH {
        return Err("pattern too long".to_string());
    }
    if pattern.starts_with('/') {
        return Err("pattern must not start with '/'".to_string());
    }
    if pattern.split('/').any(|segment| segment == "..") {
        return Err("pattern must not contain '..'".to_string());
    }
    Ok(())
}
