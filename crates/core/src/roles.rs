//! TUF role documents and the signed payload envelope.

use crate::keys::{KeyId, SignatureMethod, TufKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// TUF role identifier.
///
/// The four canonical roles exist for every repository; the remaining
/// variants are optional role slots added after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleType {
    Root,
    Targets,
    Snapshot,
    Timestamp,
    OfflineUpdates,
    OfflineSnapshot,
    RemoteSessions,
}

serde_plain::forward_display_to_serde!(RoleType);
serde_plain::forward_from_str_to_serde!(RoleType);

impl RoleType {
    /// The four roles every repository starts with.
    pub const CANONICAL: [RoleType; 4] = [
        RoleType::Root,
        RoleType::Targets,
        RoleType::Snapshot,
        RoleType::Timestamp,
    ];

    /// Metadata filename served for this role (e.g. `targets.json`).
    pub fn metadata_path(&self) -> String {
        format!("{self}.json")
    }
}

/// A role's authorized key set and signature threshold as declared by root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleKeys {
    pub keyids: Vec<KeyId>,
    pub threshold: u32,
}

/// The root role document: the key hierarchy of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRole {
    #[serde(rename = "_type")]
    pub typ: RoleType,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub keys: BTreeMap<KeyId, TufKey>,
    pub roles: BTreeMap<RoleType, RoleKeys>,
    pub version: u64,
}

impl RootRole {
    pub fn new(
        keys: BTreeMap<KeyId, TufKey>,
        roles: BTreeMap<RoleType, RoleKeys>,
        version: u64,
        expires: OffsetDateTime,
    ) -> Self {
        Self {
            typ: RoleType::Root,
            expires,
            keys,
            roles,
            version,
        }
    }

    /// Key set declared for a role, if the role slot exists.
    pub fn role_keys(&self, role: RoleType) -> Option<&RoleKeys> {
        self.roles.get(&role)
    }

    /// Look up an embedded public key by ID.
    pub fn key(&self, keyid: &KeyId) -> Option<&TufKey> {
        self.keys.get(keyid)
    }
}

/// A target entry as published in a `targets` role document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientTargetItem {
    pub hashes: BTreeMap<String, String>,
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<Value>,
}

/// A named sub-authority allowed to sign for a set of path patterns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelegatedRole {
    pub name: String,
    pub keyids: Vec<KeyId>,
    pub paths: Vec<String>,
    pub threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminating: Option<bool>,
}

/// The delegations block of a `targets` role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delegations {
    pub keys: BTreeMap<KeyId, TufKey>,
    pub roles: Vec<DelegatedRole>,
}

impl Delegations {
    /// Find a delegated role declaration by name.
    pub fn role(&self, name: &str) -> Option<&DelegatedRole> {
        self.roles.iter().find(|r| r.name == name)
    }
}

/// The targets role document: the published target map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetsRole {
    #[serde(rename = "_type")]
    pub typ: RoleType,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub targets: BTreeMap<String, ClientTargetItem>,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegations: Option<Delegations>,
}

impl TargetsRole {
    pub fn new(
        targets: BTreeMap<String, ClientTargetItem>,
        delegations: Option<Delegations>,
        version: u64,
        expires: OffsetDateTime,
    ) -> Self {
        Self {
            typ: RoleType::Targets,
            expires,
            targets,
            version,
            delegations,
        }
    }
}

/// A reference to another role document: length and hashes over its canonical
/// bytes, plus its version.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaItem {
    pub hashes: BTreeMap<String, String>,
    pub length: u64,
    pub version: u64,
}

impl MetaItem {
    /// Build a meta entry from the canonical bytes of a role document.
    pub fn from_canonical_bytes(bytes: &[u8], version: u64) -> Self {
        let mut hashes = BTreeMap::new();
        hashes.insert("sha256".to_string(), crate::canonical::sha256_hex_bytes(bytes));
        Self {
            hashes,
            length: bytes.len() as u64,
            version,
        }
    }
}

/// The snapshot role document: references root and targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRole {
    #[serde(rename = "_type")]
    pub typ: RoleType,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub meta: BTreeMap<String, MetaItem>,
    pub version: u64,
}

impl SnapshotRole {
    pub fn new(meta: BTreeMap<String, MetaItem>, version: u64, expires: OffsetDateTime) -> Self {
        Self {
            typ: RoleType::Snapshot,
            expires,
            meta,
            version,
        }
    }
}

/// The timestamp role document: references the current snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimestampRole {
    #[serde(rename = "_type")]
    pub typ: RoleType,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    pub meta: BTreeMap<String, MetaItem>,
    pub version: u64,
}

impl TimestampRole {
    pub fn new(meta: BTreeMap<String, MetaItem>, version: u64, expires: OffsetDateTime) -> Self {
        Self {
            typ: RoleType::Timestamp,
            expires,
            meta,
            version,
        }
    }
}

/// A signature over the canonical bytes of a role document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSignature {
    pub keyid: KeyId,
    pub method: SignatureMethod,
    /// Base64-encoded signature bytes.
    pub sig: String,
}

/// The envelope wrapping every role document on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedPayload<T> {
    pub signatures: Vec<ClientSignature>,
    pub signed: T,
}

impl<T> SignedPayload<T> {
    pub fn new(signatures: Vec<ClientSignature>, signed: T) -> Self {
        Self { signatures, signed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical;
    use crate::keys::KeyType;
    use time::macros::datetime;

    fn sample_root() -> RootRole {
        let key = TufKey::new(KeyType::Ed25519, "cd".repeat(32));
        let keyid = key.key_id().unwrap();
        let mut keys = BTreeMap::new();
        keys.insert(keyid.clone(), key);

        let mut roles = BTreeMap::new();
        for role in RoleType::CANONICAL {
            roles.insert(
                role,
                RoleKeys {
                    keyids: vec![keyid.clone()],
                    threshold: 1,
                },
            );
        }
        RootRole::new(keys, roles, 1, datetime!(2030-01-01 00:00:00 UTC))
    }

    #[test]
    fn role_type_wire_names() {
        assert_eq!(RoleType::Root.to_string(), "root");
        assert_eq!(RoleType::OfflineUpdates.to_string(), "offline-updates");
        assert_eq!(
            "remote-sessions".parse::<RoleType>().unwrap(),
            RoleType::RemoteSessions
        );
        assert_eq!(RoleType::Targets.metadata_path(), "targets.json");
    }

    #[test]
    fn root_role_serde_roundtrip() {
        let root = sample_root();
        let bytes = canonical::to_canonical_json(&root).unwrap();
        let reparsed: RootRole = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reparsed, root);
        assert_eq!(canonical::to_canonical_json(&reparsed).unwrap(), bytes);
    }

    #[test]
    fn root_role_type_field_is_underscore_type() {
        let root = sample_root();
        let value = serde_json::to_value(&root).unwrap();
        assert_eq!(value.get("_type").and_then(|v| v.as_str()), Some("root"));
    }

    #[test]
    fn meta_item_hashes_canonical_bytes() {
        let bytes = b"role document bytes";
        let meta = MetaItem::from_canonical_bytes(bytes, 3);
        assert_eq!(meta.length, bytes.len() as u64);
        assert_eq!(meta.version, 3);
        assert_eq!(
            meta.hashes.get("sha256").unwrap(),
            &canonical::sha256_hex_bytes(bytes)
        );
    }

    #[test]
    fn signed_payload_roundtrip() {
        let root = sample_root();
        let payload = SignedPayload::new(
            vec![ClientSignature {
                keyid: KeyId::from("aa"),
                method: SignatureMethod::Ed25519,
                sig: "c2ln".to_string(),
            }],
            root,
        );
        let json = serde_json::to_string(&payload).unwrap();
        let reparsed: SignedPayload<RootRole> = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed, payload);
    }
}
