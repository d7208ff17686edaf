//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{
    DelegationRepo, KeyGenRepo, KeyRepo, RepoRepo, RootRoleRepo, SignedRoleRepo, TargetItemRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    KeyGenRepo
    + KeyRepo
    + RootRoleRepo
    + TargetItemRepo
    + SignedRoleRepo
    + DelegationRepo
    + RepoRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // serializes writers so version-bump conflicts surface as typed
            // errors instead of lock failures.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Internal(format!("io error: {e}"))
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint"))
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use crate::repos::keygen::KeyGenStatus;
    use crate::repos::roles::TargetItemChange;
    use crate::repos::targets::TargetItemPage;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl KeyGenRepo for SqliteStore {
        async fn create_key_gen_request(&self, request: &KeyGenRequestRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO key_gen_requests (
                    id, repo_id, role_type, key_type, key_size, threshold,
                    status, description, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(request.id)
            .bind(request.repo_id)
            .bind(&request.role_type)
            .bind(&request.key_type)
            .bind(request.key_size)
            .bind(request.threshold)
            .bind(&request.status)
            .bind(&request.description)
            .bind(request.created_at)
            .bind(request.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!("key gen request {}", request.id))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_key_gen_request(
            &self,
            id: Uuid,
        ) -> MetadataResult<Option<KeyGenRequestRow>> {
            let row = sqlx::query_as::<_, KeyGenRequestRow>(
                "SELECT * FROM key_gen_requests WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn key_gen_requests_for_repo(
            &self,
            repo_id: Uuid,
        ) -> MetadataResult<Vec<KeyGenRequestRow>> {
            let rows = sqlx::query_as::<_, KeyGenRequestRow>(
                "SELECT * FROM key_gen_requests WHERE repo_id = ? ORDER BY created_at, id",
            )
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn pending_key_gen_requests(
            &self,
            limit: u32,
        ) -> MetadataResult<Vec<KeyGenRequestRow>> {
            let rows = sqlx::query_as::<_, KeyGenRequestRow>(
                "SELECT * FROM key_gen_requests WHERE status = ? ORDER BY created_at, id LIMIT ?",
            )
            .bind(KeyGenStatus::Requested.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn complete_key_gen_request(
            &self,
            request_id: Uuid,
            key: &KeyRow,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            // A request has at most one successful terminal transition.
            let updated = sqlx::query(
                "UPDATE key_gen_requests SET status = ?, description = NULL, updated_at = ?
                 WHERE id = ? AND status != ?",
            )
            .bind(KeyGenStatus::Generated.as_str())
            .bind(OffsetDateTime::now_utc())
            .bind(request_id)
            .bind(KeyGenStatus::Generated.as_str())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(MetadataError::InvalidStateTransition {
                    from: KeyGenStatus::Generated.as_str().to_string(),
                    to: KeyGenStatus::Generated.as_str().to_string(),
                });
            }

            sqlx::query(
                r#"
                INSERT INTO keys (key_id, repo_id, role_type, key_type, public_key, private_ref, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.key_id)
            .bind(key.repo_id)
            .bind(&key.role_type)
            .bind(&key.key_type)
            .bind(&key.public_key)
            .bind(&key.private_ref)
            .bind(key.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!("key {}", key.key_id))
                } else {
                    e.into()
                }
            })?;

            tx.commit().await?;
            Ok(())
        }

        async fn fail_key_gen_request(
            &self,
            request_id: Uuid,
            cause: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE key_gen_requests SET status = ?, description = ?, updated_at = ? WHERE id = ?",
            )
            .bind(KeyGenStatus::Error.as_str())
            .bind(cause)
            .bind(OffsetDateTime::now_utc())
            .bind(request_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "key gen request {request_id}"
                )));
            }
            Ok(())
        }

        async fn retry_key_gen_requests(&self, repo_id: Uuid) -> MetadataResult<u64> {
            let result = sqlx::query(
                "UPDATE key_gen_requests SET status = ?, description = NULL, updated_at = ?
                 WHERE repo_id = ? AND status = ?",
            )
            .bind(KeyGenStatus::Requested.as_str())
            .bind(OffsetDateTime::now_utc())
            .bind(repo_id)
            .bind(KeyGenStatus::Error.as_str())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        }
    }

    #[async_trait]
    impl KeyRepo for SqliteStore {
        async fn insert_key(&self, key: &KeyRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO keys (key_id, repo_id, role_type, key_type, public_key, private_ref, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.key_id)
            .bind(key.repo_id)
            .bind(&key.role_type)
            .bind(&key.key_type)
            .bind(&key.public_key)
            .bind(&key.private_ref)
            .bind(key.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!("key {}", key.key_id))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_key(&self, repo_id: Uuid, key_id: &str) -> MetadataResult<Option<KeyRow>> {
            let row = sqlx::query_as::<_, KeyRow>(
                "SELECT * FROM keys WHERE repo_id = ? AND key_id = ?",
            )
            .bind(repo_id)
            .bind(key_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn keys_for_role(
            &self,
            repo_id: Uuid,
            role_type: &str,
        ) -> MetadataResult<Vec<KeyRow>> {
            let rows = sqlx::query_as::<_, KeyRow>(
                "SELECT * FROM keys WHERE repo_id = ? AND role_type = ? ORDER BY created_at, key_id",
            )
            .bind(repo_id)
            .bind(role_type)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn clear_private_ref(&self, repo_id: Uuid, key_id: &str) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE keys SET private_ref = NULL WHERE repo_id = ? AND key_id = ?",
            )
            .bind(repo_id)
            .bind(key_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("key {key_id}")));
            }
            Ok(())
        }

        async fn repo_has_keys(&self, repo_id: Uuid) -> MetadataResult<bool> {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM keys WHERE repo_id = ?)")
                    .bind(repo_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(exists)
        }
    }

    #[async_trait]
    impl RootRoleRepo for SqliteStore {
        async fn insert_root_role(&self, row: &SignedRootRoleRow) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let current: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(version), 0) FROM signed_root_roles WHERE repo_id = ?",
            )
            .bind(row.repo_id)
            .fetch_one(&mut *tx)
            .await?;

            if row.version != current + 1 {
                return Err(MetadataError::VersionConflict {
                    role: "root".to_string(),
                    expected: current + 1,
                    got: row.version,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO signed_root_roles (repo_id, version, expires_at, canonical_bytes, signatures, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.repo_id)
            .bind(row.version)
            .bind(row.expires_at)
            .bind(&row.canonical_bytes)
            .bind(&row.signatures)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        }

        async fn latest_root_role(
            &self,
            repo_id: Uuid,
        ) -> MetadataResult<Option<SignedRootRoleRow>> {
            let row = sqlx::query_as::<_, SignedRootRoleRow>(
                "SELECT * FROM signed_root_roles WHERE repo_id = ? ORDER BY version DESC LIMIT 1",
            )
            .bind(repo_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn get_root_role(
            &self,
            repo_id: Uuid,
            version: i64,
        ) -> MetadataResult<Option<SignedRootRoleRow>> {
            let row = sqlx::query_as::<_, SignedRootRoleRow>(
                "SELECT * FROM signed_root_roles WHERE repo_id = ? AND version = ?",
            )
            .bind(repo_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }
    }

    #[async_trait]
    impl TargetItemRepo for SqliteStore {
        async fn get_target_item(
            &self,
            repo_id: Uuid,
            filename: &str,
        ) -> MetadataResult<Option<TargetItemRow>> {
            let row = sqlx::query_as::<_, TargetItemRow>(
                "SELECT * FROM target_items WHERE repo_id = ? AND filename = ?",
            )
            .bind(repo_id)
            .bind(filename)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_target_items(&self, repo_id: Uuid) -> MetadataResult<Vec<TargetItemRow>> {
            let rows = sqlx::query_as::<_, TargetItemRow>(
                "SELECT * FROM target_items WHERE repo_id = ? ORDER BY filename",
            )
            .bind(repo_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn page_target_items(
            &self,
            repo_id: Uuid,
            name_contains: Option<&str>,
            offset: u64,
            limit: u64,
        ) -> MetadataResult<TargetItemPage> {
            let (total, values) = match name_contains {
                Some(fragment) => {
                    let pattern = format!("%{fragment}%");
                    let total: i64 = sqlx::query_scalar(
                        "SELECT COUNT(*) FROM target_items WHERE repo_id = ? AND filename LIKE ?",
                    )
                    .bind(repo_id)
                    .bind(&pattern)
                    .fetch_one(&self.pool)
                    .await?;

                    let values = sqlx::query_as::<_, TargetItemRow>(
                        "SELECT * FROM target_items WHERE repo_id = ? AND filename LIKE ?
                         ORDER BY filename LIMIT ? OFFSET ?",
                    )
                    .bind(repo_id)
                    .bind(&pattern)
                    .bind(limit as i64)
                    .bind(offset as i64)
                    .fetch_all(&self.pool)
                    .await?;
                    (total, values)
                }
                None => {
                    let total: i64 =
                        sqlx::query_scalar("SELECT COUNT(*) FROM target_items WHERE repo_id = ?")
                            .bind(repo_id)
                            .fetch_one(&self.pool)
                            .await?;

                    let values = sqlx::query_as::<_, TargetItemRow>(
                        "SELECT * FROM target_items WHERE repo_id = ?
                         ORDER BY filename LIMIT ? OFFSET ?",
                    )
                    .bind(repo_id)
                    .bind(limit as i64)
                    .bind(offset as i64)
                    .fetch_all(&self.pool)
                    .await?;
                    (total, values)
                }
            };

            Ok(TargetItemPage {
                total: total as u64,
                offset,
                limit,
                values,
            })
        }
    }

    #[async_trait]
    impl SignedRoleRepo for SqliteStore {
        async fn get_signed_role(
            &self,
            repo_id: Uuid,
            role_type: &str,
        ) -> MetadataResult<Option<SignedRoleRow>> {
            let row = sqlx::query_as::<_, SignedRoleRow>(
                "SELECT * FROM signed_roles WHERE repo_id = ? AND role_type = ?",
            )
            .bind(repo_id)
            .bind(role_type)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn persist_signed_roles(
            &self,
            repo_id: Uuid,
            change: Option<TargetItemChange>,
            roles: &[SignedRoleRow],
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            match change {
                Some(TargetItemChange::Upsert(item)) => {
                    sqlx::query(
                        r#"
                        INSERT INTO target_items (
                            repo_id, filename, length, checksum_method, checksum_hex,
                            custom_json, created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                        ON CONFLICT(repo_id, filename) DO UPDATE SET
                            length = excluded.length,
                            checksum_method = excluded.checksum_method,
                            checksum_hex = excluded.checksum_hex,
                            custom_json = excluded.custom_json,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(item.repo_id)
                    .bind(&item.filename)
                    .bind(item.length)
                    .bind(&item.checksum_method)
                    .bind(&item.checksum_hex)
                    .bind(&item.custom_json)
                    .bind(item.created_at)
                    .bind(item.updated_at)
                    .execute(&mut *tx)
                    .await?;
                }
                Some(TargetItemChange::Delete(filename)) => {
                    let result = sqlx::query(
                        "DELETE FROM target_items WHERE repo_id = ? AND filename = ?",
                    )
                    .bind(repo_id)
                    .bind(&filename)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(MetadataError::NotFound(format!("target {filename}")));
                    }
                }
                None => {}
            }

            for role in roles {
                let current: Option<i64> = sqlx::query_scalar(
                    "SELECT version FROM signed_roles WHERE repo_id = ? AND role_type = ?",
                )
                .bind(repo_id)
                .bind(&role.role_type)
                .fetch_optional(&mut *tx)
                .await?;

                let expected = current.unwrap_or(0) + 1;
                if role.version != expected {
                    return Err(MetadataError::VersionConflict {
                        role: role.role_type.clone(),
                        expected,
                        got: role.version,
                    });
                }

                sqlx::query(
                    r#"
                    INSERT INTO signed_roles (
                        repo_id, role_type, version, expires_at, checksum_hex,
                        length, canonical_bytes, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(repo_id, role_type) DO UPDATE SET
                        version = excluded.version,
                        expires_at = excluded.expires_at,
                        checksum_hex = excluded.checksum_hex,
                        length = excluded.length,
                        canonical_bytes = excluded.canonical_bytes,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(role.repo_id)
                .bind(&role.role_type)
                .bind(role.version)
                .bind(role.expires_at)
                .bind(&role.checksum_hex)
                .bind(role.length)
                .bind(&role.canonical_bytes)
                .bind(role.created_at)
                .bind(role.updated_at)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl DelegationRepo for SqliteStore {
        async fn get_delegation(
            &self,
            repo_id: Uuid,
            name: &str,
        ) -> MetadataResult<Option<DelegationRow>> {
            let row = sqlx::query_as::<_, DelegationRow>(
                "SELECT * FROM delegations WHERE repo_id = ? AND name = ?",
            )
            .bind(repo_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn upsert_delegation(&self, row: &DelegationRow) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;

            let current: Option<i64> = sqlx::query_scalar(
                "SELECT version FROM delegations WHERE repo_id = ? AND name = ?",
            )
            .bind(row.repo_id)
            .bind(&row.name)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(current) = current
                && row.version <= current
            {
                return Err(MetadataError::VersionConflict {
                    role: format!("delegation {}", row.name),
                    expected: current + 1,
                    got: row.version,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO delegations (repo_id, name, version, canonical_bytes, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(repo_id, name) DO UPDATE SET
                    version = excluded.version,
                    canonical_bytes = excluded.canonical_bytes,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(row.repo_id)
            .bind(&row.name)
            .bind(row.version)
            .bind(&row.canonical_bytes)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl RepoRepo for SqliteStore {
        async fn create_repo(&self, repo: &RepoRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO repos (repo_id, namespace, key_type, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(repo.repo_id)
            .bind(&repo.namespace)
            .bind(&repo.key_type)
            .bind(repo.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    MetadataError::AlreadyExists(format!("namespace '{}'", repo.namespace))
                } else {
                    e.into()
                }
            })?;
            Ok(())
        }

        async fn get_repo(&self, repo_id: Uuid) -> MetadataResult<Option<RepoRow>> {
            let row = sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE repo_id = ?")
                .bind(repo_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_repo_by_namespace(&self, namespace: &str) -> MetadataResult<Option<RepoRow>> {
            let row = sqlx::query_as::<_, RepoRow>("SELECT * FROM repos WHERE namespace = ?")
                .bind(namespace)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn set_expires_not_before(
            &self,
            repo_id: Uuid,
            not_before: OffsetDateTime,
            updated_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO repo_expires (repo_id, not_before, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(repo_id) DO UPDATE SET
                    not_before = excluded.not_before,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(repo_id)
            .bind(not_before)
            .bind(updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_expires_not_before(
            &self,
            repo_id: Uuid,
        ) -> MetadataResult<Option<OffsetDateTime>> {
            let not_before: Option<OffsetDateTime> = sqlx::query_scalar(
                "SELECT not_before FROM repo_expires WHERE repo_id = ?",
            )
            .bind(repo_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(not_before)
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Key generation requests
CREATE TABLE IF NOT EXISTS key_gen_requests (
    id BLOB PRIMARY KEY,
    repo_id BLOB NOT NULL,
    role_type TEXT NOT NULL,
    key_type TEXT NOT NULL,
    key_size INTEGER NOT NULL,
    threshold INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL DEFAULT 'REQUESTED',
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_key_gen_requests_status ON key_gen_requests(status, created_at);
CREATE INDEX IF NOT EXISTS idx_key_gen_requests_repo ON key_gen_requests(repo_id);

-- Public keys; private halves live in the secret store under private_ref
CREATE TABLE IF NOT EXISTS keys (
    key_id TEXT PRIMARY KEY,
    repo_id BLOB NOT NULL,
    role_type TEXT NOT NULL,
    key_type TEXT NOT NULL,
    public_key TEXT NOT NULL,
    private_ref TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_keys_repo_role ON keys(repo_id, role_type);

-- Immutable signed root role versions
CREATE TABLE IF NOT EXISTS signed_root_roles (
    repo_id BLOB NOT NULL,
    version INTEGER NOT NULL,
    expires_at TEXT NOT NULL,
    canonical_bytes TEXT NOT NULL,
    signatures TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (repo_id, version)
);

-- Target catalog
CREATE TABLE IF NOT EXISTS target_items (
    repo_id BLOB NOT NULL,
    filename TEXT NOT NULL,
    length INTEGER NOT NULL,
    checksum_method TEXT NOT NULL,
    checksum_hex TEXT NOT NULL,
    custom_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (repo_id, filename)
);

-- Current signed document per non-root role
CREATE TABLE IF NOT EXISTS signed_roles (
    repo_id BLOB NOT NULL,
    role_type TEXT NOT NULL,
    version INTEGER NOT NULL,
    expires_at TEXT NOT NULL,
    checksum_hex TEXT NOT NULL,
    length INTEGER NOT NULL,
    canonical_bytes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (repo_id, role_type)
);

-- Pushed delegated targets documents
CREATE TABLE IF NOT EXISTS delegations (
    repo_id BLOB NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    canonical_bytes TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (repo_id, name)
);

-- Repo registrations (namespace -> repo)
CREATE TABLE IF NOT EXISTS repos (
    repo_id BLOB PRIMARY KEY,
    namespace TEXT NOT NULL UNIQUE,
    key_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Per-repo expiry floor
CREATE TABLE IF NOT EXISTS repo_expires (
    repo_id BLOB PRIMARY KEY,
    not_before TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
