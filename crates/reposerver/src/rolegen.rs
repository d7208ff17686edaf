//! Role generation engine.
//!
//! Builds `targets`, `snapshot`, and `timestamp`, cascades regeneration on
//! catalog changes, and refreshes stale documents on read. All three derived
//! roles persist in one transaction so a reader never observes a `snapshot`
//! that references anything but the `targets` it was built from.

use crate::error::{ApiError, ApiResult};
use crate::keyclient::KeyClientError;
use crate::state::AppState;
use armory_core::canonical;
use armory_core::roles::{
    ClientTargetItem, MetaItem, RoleType, RootRole, SignedPayload, SnapshotRole, TargetsRole,
    TimestampRole,
};
use armory_metadata::models::SignedRoleRow;
use armory_metadata::repos::TargetItemChange;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

pub(crate) const ROOT_PATH: &str = "root.json";
pub(crate) const TARGETS_PATH: &str = "targets.json";
pub(crate) const SNAPSHOT_PATH: &str = "snapshot.json";

/// Timestamp documents closer than this to expiry are refreshed on read.
const TIMESTAMP_REFRESH_WINDOW: time::Duration = time::Duration::hours(1);

/// Whether an error means the role's signing key is offline.
pub(crate) fn is_role_key_offline(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RoleKeyNotFound(_) | ApiError::KeyClient(KeyClientError::RoleKeyNotFound(_))
    )
}

/// Fetch the current document for a derived role, refreshing it when stale.
pub async fn find_role(
    state: &AppState,
    repo_id: Uuid,
    role: RoleType,
) -> ApiResult<SignedRoleRow> {
    match role {
        RoleType::Targets | RoleType::Snapshot => find_cascading(state, repo_id, role).await,
        RoleType::Timestamp => find_timestamp(state, repo_id).await,
        other => Err(ApiError::BadRequest(format!(
            "role {other} is not served by the repo server"
        ))),
    }
}

/// Generate the initial empty role set if the repo has none yet.
pub async fn ensure_initialized(state: &AppState, repo_id: Uuid) -> ApiResult<()> {
    if state
        .metadata
        .get_signed_role(repo_id, &RoleType::Targets.to_string())
        .await?
        .is_none()
    {
        regenerate(state, repo_id, None).await?;
    }
    Ok(())
}

/// Rebuild and persist `targets`, `snapshot`, and `timestamp`, applying an
/// optional catalog change atomically with them.
///
/// The change is applied to the catalog in memory for document building and
/// committed in the same transaction as the role rows, so a version-bump
/// conflict rolls everything back.
pub async fn regenerate(
    state: &AppState,
    repo_id: Uuid,
    change: Option<TargetItemChange>,
) -> ApiResult<()> {
    let floor = state.metadata.get_expires_not_before(repo_id).await?;
    let root = state.keys.fetch_root(repo_id, floor).await?;
    let now = OffsetDateTime::now_utc();

    let mut items = state.metadata.list_target_items(repo_id).await?;
    match &change {
        Some(TargetItemChange::Upsert(item)) => {
            items.retain(|i| i.filename != item.filename);
            items.push(item.clone());
        }
        Some(TargetItemChange::Delete(filename)) => {
            if !items.iter().any(|i| &i.filename == filename) {
                return Err(ApiError::MissingEntity(format!("target {filename}")));
            }
            items.retain(|i| &i.filename != filename);
        }
        None => {}
    }

    let current_targets = state
        .metadata
        .get_signed_role(repo_id, &RoleType::Targets.to_string())
        .await?;
    let targets_version = current_targets.as_ref().map_or(1, |r| r.version as u64 + 1);
    let delegations = match &current_targets {
        Some(row) => parse_targets_payload(row)?.signed.delegations,
        None => None,
    };

    let mut targets_map = BTreeMap::new();
    for item in &items {
        let custom: Value = serde_json::from_str(&item.custom_json)
            .map_err(|e| ApiError::Internal(format!("stored custom metadata is corrupt: {e}")))?;
        let mut hashes = BTreeMap::new();
        hashes.insert("sha256".to_string(), item.checksum_hex.clone());
        targets_map.insert(
            item.filename.clone(),
            ClientTargetItem {
                hashes,
                length: item.length as u64,
                custom: Some(custom),
            },
        );
    }

    let targets_expires = role_expiry(now + state.config.tuf.targets_ttl(), floor);
    let targets_doc = TargetsRole::new(targets_map, delegations, targets_version, targets_expires);
    let targets_row = sign_role_row(
        state,
        repo_id,
        RoleType::Targets,
        &targets_doc,
        targets_version,
        targets_expires,
    )
    .await?;

    let [snapshot_row, timestamp_row] = derive_snapshot_and_timestamp(
        state,
        repo_id,
        &root,
        targets_row.canonical_bytes.as_bytes(),
        targets_version,
        floor,
    )
    .await?;

    state
        .metadata
        .persist_signed_roles(repo_id, change, &[targets_row, snapshot_row, timestamp_row])
        .await?;
    crate::metrics::CASCADES_GENERATED.inc();
    tracing::info!(repo_id = %repo_id, targets_version, "role cascade regenerated");
    Ok(())
}

/// Build and sign `snapshot` (root + targets meta entries) and `timestamp`
/// (snapshot meta entry) for the given targets bytes.
pub(crate) async fn derive_snapshot_and_timestamp(
    state: &AppState,
    repo_id: Uuid,
    root: &SignedPayload<RootRole>,
    targets_bytes: &[u8],
    targets_version: u64,
    floor: Option<OffsetDateTime>,
) -> ApiResult<[SignedRoleRow; 2]> {
    let now = OffsetDateTime::now_utc();
    let root_bytes = canonical::to_canonical_json(root)?;

    let mut meta = BTreeMap::new();
    meta.insert(
        ROOT_PATH.to_string(),
        MetaItem::from_canonical_bytes(&root_bytes, root.signed.version),
    );
    meta.insert(
        TARGETS_PATH.to_string(),
        MetaItem::from_canonical_bytes(targets_bytes, targets_version),
    );

    let snapshot_version = next_version(state, repo_id, RoleType::Snapshot).await?;
    let snapshot_expires = role_expiry(now + state.config.tuf.snapshot_ttl(), floor);
    let snapshot_doc = SnapshotRole::new(meta, snapshot_version, snapshot_expires);
    let snapshot_row = sign_role_row(
        state,
        repo_id,
        RoleType::Snapshot,
        &snapshot_doc,
        snapshot_version,
        snapshot_expires,
    )
    .await?;

    let mut ts_meta = BTreeMap::new();
    ts_meta.insert(
        SNAPSHOT_PATH.to_string(),
        MetaItem::from_canonical_bytes(snapshot_row.canonical_bytes.as_bytes(), snapshot_version),
    );
    let timestamp_version = next_version(state, repo_id, RoleType::Timestamp).await?;
    let timestamp_expires = role_expiry(now + state.config.tuf.timestamp_ttl(), floor);
    let timestamp_doc = TimestampRole::new(ts_meta, timestamp_version, timestamp_expires);
    let timestamp_row = sign_role_row(
        state,
        repo_id,
        RoleType::Timestamp,
        &timestamp_doc,
        timestamp_version,
        timestamp_expires,
    )
    .await?;

    Ok([snapshot_row, timestamp_row])
}

async fn find_cascading(
    state: &AppState,
    repo_id: Uuid,
    role: RoleType,
) -> ApiResult<SignedRoleRow> {
    let current = state
        .metadata
        .get_signed_role(repo_id, &role.to_string())
        .await?;
    let floor = state.metadata.get_expires_not_before(repo_id).await?;
    let now = OffsetDateTime::now_utc();

    let mut stale = match &current {
        None => true,
        Some(row) => row.expires_at <= now || floor.is_some_and(|f| row.expires_at < f),
    };

    // A rotated root invalidates the snapshot (and the cascade) that still
    // references the old version.
    match state.keys.fetch_root(repo_id, floor).await {
        Ok(root) => {
            let snapshot = state
                .metadata
                .get_signed_role(repo_id, &RoleType::Snapshot.to_string())
                .await?;
            if let Some(snapshot) = snapshot
                && snapshot_root_version(&snapshot)? != Some(root.signed.version)
            {
                stale = true;
            }
        }
        Err(e) => {
            let e = ApiError::from(e);
            if current.is_none() || !is_key_unavailable(&e) {
                return Err(e);
            }
            // The key server cannot help right now; serve what we have.
            stale = false;
        }
    }

    if let Some(row) = current.clone()
        && !stale
    {
        return Ok(row);
    }

    match regenerate(state, repo_id, None).await {
        Ok(()) => {}
        // The signing key is offline: expired documents are still served.
        Err(e) if is_role_key_offline(&e) && current.is_some() => {
            return Ok(current.expect("stored role row"));
        }
        Err(e) => return Err(e),
    }

    state
        .metadata
        .get_signed_role(repo_id, &role.to_string())
        .await?
        .ok_or_else(|| ApiError::Internal(format!("role {role} missing after regeneration")))
}

/// The root version a stored snapshot references.
fn snapshot_root_version(row: &SignedRoleRow) -> ApiResult<Option<u64>> {
    let payload: SignedPayload<SnapshotRole> = serde_json::from_str(&row.canonical_bytes)
        .map_err(|e| ApiError::Internal(format!("stored snapshot role is corrupt: {e}")))?;
    Ok(payload.signed.meta.get(ROOT_PATH).map(|m| m.version))
}

/// Key-server failures that should not break serving stored documents.
fn is_key_unavailable(error: &ApiError) -> bool {
    is_role_key_offline(error)
        || matches!(
            error,
            ApiError::KeysNotReady(_) | ApiError::KeyClient(KeyClientError::KeysNotReady(_))
        )
}

async fn find_timestamp(state: &AppState, repo_id: Uuid) -> ApiResult<SignedRoleRow> {
    let role_name = RoleType::Timestamp.to_string();
    let Some(current) = state.metadata.get_signed_role(repo_id, &role_name).await? else {
        regenerate(state, repo_id, None).await?;
        return state
            .metadata
            .get_signed_role(repo_id, &role_name)
            .await?
            .ok_or_else(|| ApiError::Internal("timestamp missing after regeneration".to_string()));
    };

    let floor = state.metadata.get_expires_not_before(repo_id).await?;
    let now = OffsetDateTime::now_utc();
    let refresh = current.expires_at < now + TIMESTAMP_REFRESH_WINDOW
        || floor.is_some_and(|f| current.expires_at < f);
    if !refresh {
        return Ok(current);
    }

    let snapshot = state
        .metadata
        .get_signed_role(repo_id, &RoleType::Snapshot.to_string())
        .await?
        .ok_or_else(|| ApiError::Internal("timestamp exists without snapshot".to_string()))?;

    let mut meta = BTreeMap::new();
    meta.insert(
        SNAPSHOT_PATH.to_string(),
        MetaItem::from_canonical_bytes(snapshot.canonical_bytes.as_bytes(), snapshot.version as u64),
    );
    let version = current.version as u64 + 1;
    let expires = role_expiry(now + state.config.tuf.timestamp_ttl(), floor);
    let doc = TimestampRole::new(meta, version, expires);

    match sign_role_row(state, repo_id, RoleType::Timestamp, &doc, version, expires).await {
        Ok(row) => {
            state
                .metadata
                .persist_signed_roles(repo_id, None, &[row])
                .await?;
            state
                .metadata
                .get_signed_role(repo_id, &role_name)
                .await?
                .ok_or_else(|| ApiError::Internal("timestamp missing after refresh".to_string()))
        }
        Err(e) if is_role_key_offline(&e) => Ok(current),
        Err(e) => Err(e),
    }
}

/// Sign a role document via the key server and build its persistence row.
pub(crate) async fn sign_role_row<T: Serialize>(
    state: &AppState,
    repo_id: Uuid,
    role: RoleType,
    doc: &T,
    version: u64,
    expires: OffsetDateTime,
) -> ApiResult<SignedRoleRow> {
    let value =
        serde_json::to_value(doc).map_err(|e| ApiError::Internal(format!("serialize role: {e}")))?;
    let signed = state.keys.sign(repo_id, role, value).await?;
    row_from_signed_payload(repo_id, role, &signed, version, expires)
}

/// Build a persistence row from a complete signed payload: canonical bytes
/// plus their checksum and length.
pub(crate) fn row_from_signed_payload<T: Serialize>(
    repo_id: Uuid,
    role: RoleType,
    payload: &SignedPayload<T>,
    version: u64,
    expires: OffsetDateTime,
) -> ApiResult<SignedRoleRow> {
    let bytes = canonical::to_canonical_json(payload)?;
    let canonical_bytes = String::from_utf8(bytes)
        .map_err(|e| ApiError::Internal(format!("canonical bytes are not utf-8: {e}")))?;
    let checksum_hex = canonical::sha256_hex_bytes(canonical_bytes.as_bytes());
    let now = OffsetDateTime::now_utc();

    Ok(SignedRoleRow {
        repo_id,
        role_type: role.to_string(),
        version: version as i64,
        expires_at: expires,
        checksum_hex,
        length: canonical_bytes.len() as i64,
        canonical_bytes,
        created_at: now,
        updated_at: now,
    })
}

/// Parse a stored targets row back into its signed payload.
pub(crate) fn parse_targets_payload(row: &SignedRoleRow) -> ApiResult<SignedPayload<TargetsRole>> {
    serde_json::from_str(&row.canonical_bytes)
        .map_err(|e| ApiError::Internal(format!("stored targets role is corrupt: {e}")))
}

/// The expiry for a fresh document: the default TTL, floored by the per-repo
/// `expires_not_before` instant.
pub(crate) fn role_expiry(
    default: OffsetDateTime,
    floor: Option<OffsetDateTime>,
) -> OffsetDateTime {
    match floor {
        Some(floor) if floor > default => floor,
        _ => default,
    }
}

async fn next_version(state: &AppState, repo_id: Uuid, role: RoleType) -> ApiResult<u64> {
    let current = state
        .metadata
        .get_signed_role(repo_id, &role.to_string())
        .await?;
    Ok(current.map_or(1, |r| r.version as u64 + 1))
}
