//! Integration tests for offline-signed targets intake and delegated
//! targets.

mod common;

use armory_core::canonical;
use armory_core::keys::{KeyId, KeyType, TufKey};
use armory_core::roles::{
    ClientTargetItem, DelegatedRole, Delegations, SignedPayload, TargetsRole,
};
use armory_signer::{KeyPair, sign_canonical};
use axum::http::StatusCode;
use common::TestRepoServer;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}

fn target_entry(content: &[u8], with_custom: bool) -> ClientTargetItem {
    let mut hashes = BTreeMap::new();
    hashes.insert("sha256".to_string(), sha256_hex(content));
    let custom = with_custom.then(|| {
        json!({
            "name": "pkg",
            "version": "1.0.0",
            "hardwareIds": ["hw-1"],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z",
        })
    });
    ClientTargetItem {
        hashes,
        length: content.len() as u64,
        custom,
    }
}

fn targets_doc(
    entries: Vec<(&str, ClientTargetItem)>,
    version: u64,
    delegations: Option<Delegations>,
) -> TargetsRole {
    let mut targets = BTreeMap::new();
    for (name, entry) in entries {
        targets.insert(name.to_string(), entry);
    }
    TargetsRole::new(
        targets,
        delegations,
        version,
        OffsetDateTime::now_utc() + time::Duration::days(30),
    )
}

/// Sign a targets document with the repo's online targets keys, the way an
/// operator holding those keys would.
async fn oracle_sign(
    server: &TestRepoServer,
    repo_id: Uuid,
    doc: &TargetsRole,
) -> SignedPayload<TargetsRole> {
    let value = serde_json::to_value(doc).unwrap();
    let signed = armory_keyserver::roots::sign_payload(
        &server.keyserver,
        repo_id,
        armory_core::roles::RoleType::Targets,
        value,
    )
    .await
    .unwrap();
    SignedPayload::new(signed.signatures, doc.clone())
}

async fn current_checksum(server: &TestRepoServer, repo_id: Uuid) -> String {
    let (status, headers, _) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets.json"), vec![])
        .await;
    assert_eq!(status, StatusCode::OK);
    headers
        .get("x-ats-role-checksum")
        .and_then(|v| v.to_str().ok())
        .expect("checksum header")
        .to_string()
}

async fn push(
    server: &TestRepoServer,
    repo_id: Uuid,
    payload: &SignedPayload<TargetsRole>,
    checksum: Option<&str>,
) -> (StatusCode, Value) {
    let headers: Vec<(&str, &str)> = checksum
        .map(|sum| vec![("x-ats-role-checksum", sum)])
        .unwrap_or_default();
    let (status, _, body) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/targets"),
            Some(serde_json::to_value(payload).unwrap()),
            &headers,
        )
        .await;
    (status, body)
}

#[tokio::test]
async fn checksum_preconditions_are_enforced_in_order() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("offline").await;

    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 2, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;

    // Missing checksum while a targets role exists.
    let (status, body) = push(&server, repo_id, &payload, None).await;
    assert_eq!(status, StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(body["code"], json!("precondition_required"));

    // Stale checksum.
    let (status, body) = push(&server, repo_id, &payload, Some(&"0".repeat(64))).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], json!("precondition_failed"));

    // Correct checksum.
    let checksum = current_checksum(&server, repo_id).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    // The pushed bytes are served verbatim and snapshot/timestamp advanced.
    let (_, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(targets["signed"]["version"], json!(2));
    assert!(targets["signed"]["targets"]["pkg.bin"].is_object());

    for file in ["snapshot.json", "timestamp.json"] {
        let (_, _, body) = server
            .request("GET", &format!("/repo/{repo_id}/{file}"), None, &[])
            .await;
        assert_eq!(body["signed"]["version"], json!(2), "{file}");
    }
}

#[tokio::test]
async fn identical_republish_is_a_noop() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("republish").await;

    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 2, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;

    let checksum = current_checksum(&server, repo_id).await;
    let (status, _) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, first_bytes) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets.json"), vec![])
        .await;

    // Same document again, against the new checksum: accepted, unchanged.
    let checksum = current_checksum(&server, repo_id).await;
    let (status, _) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, second_bytes) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets.json"), vec![])
        .await;
    assert_eq!(first_bytes, second_bytes);
}

#[tokio::test]
async fn version_must_bump_by_exactly_one() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("versions").await;

    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 20, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;

    let checksum = current_checksum(&server, repo_id).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("invalid_version_bump"));
}

#[tokio::test]
async fn tampered_documents_fail_the_threshold() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("tamper").await;

    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 2, None);
    let mut payload = oracle_sign(&server, repo_id, &doc).await;
    payload
        .signed
        .targets
        .insert("sneaky.bin".to_string(), target_entry(b"injected", true));

    let checksum = current_checksum(&server, repo_id).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("payload_signature_invalid"));
}

#[tokio::test]
async fn foreign_and_duplicate_signers_are_rejected() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("signers").await;

    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 2, None);
    let checksum = current_checksum(&server, repo_id).await;

    // Signed by a key the root never declared for targets.
    let foreign = KeyPair::generate(KeyType::Ed25519, 256).unwrap();
    let foreign_id = foreign.tuf_key().unwrap().key_id().unwrap();
    let bytes = canonical::to_canonical_json(&doc).unwrap();
    let foreign_payload = SignedPayload::new(
        vec![sign_canonical(&foreign, &foreign_id, &bytes).unwrap()],
        doc.clone(),
    );
    let (status, body) = push(&server, repo_id, &foreign_payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("payload_signature_invalid"));

    // The same valid signer twice.
    let mut duplicated = oracle_sign(&server, repo_id, &doc).await;
    let first = duplicated.signatures[0].clone();
    duplicated.signatures.push(first);
    let (status, body) = push(&server, repo_id, &duplicated, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("payload_signature_invalid"));
}

#[tokio::test]
async fn malformed_items_are_rejected() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("malformed").await;
    let checksum = current_checksum(&server, repo_id).await;

    // New item without custom metadata.
    let doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", false))], 2, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["description"]
            .as_str()
            .unwrap()
            .contains("custom metadata")
    );

    // Zero length.
    let mut entry = target_entry(b"payload", true);
    entry.length = 0;
    let doc = targets_doc(vec![("pkg.bin", entry)], 2, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let (status, _) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing sha256 entry.
    let mut entry = target_entry(b"payload", true);
    entry.hashes.clear();
    let doc = targets_doc(vec![("pkg.bin", entry)], 2, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let (status, _) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dropped_targets_lose_their_blobs() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("cleanup").await;

    // Upload a managed blob, then push an offline targets that drops it.
    let content = b"stale firmware".to_vec();
    let (status, _, _) = server
        .request_raw(
            "PUT",
            &format!("/repo/{repo_id}/targets/old.bin?name=old&version=1"),
            content,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let filename = armory_core::targets::TargetFilename::parse("old.bin").unwrap();
    assert!(server.state.storage.exists(repo_id, &filename).await.unwrap());

    let doc = targets_doc(vec![("new.bin", target_entry(b"fresh", true))], 3, None);
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let checksum = current_checksum(&server, repo_id).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    assert!(!server.state.storage.exists(repo_id, &filename).await.unwrap());
}

#[tokio::test]
async fn expired_offline_targets_are_served_when_key_is_offline() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("expired").await;

    let mut doc = targets_doc(vec![("pkg.bin", target_entry(b"payload", true))], 2, None);
    doc.expires = OffsetDateTime::now_utc() - time::Duration::days(1);
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let checksum = current_checksum(&server, repo_id).await;
    let (status, _) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Take the targets key offline so the server cannot re-sign.
    let root = armory_keyserver::roots::find_fresh(&server.keyserver, repo_id, None)
        .await
        .unwrap();
    let targets_keyid = root
        .signed
        .role_keys(armory_core::roles::RoleType::Targets)
        .unwrap()
        .keyids[0]
        .clone();
    armory_keyserver::roots::delete_private_key(&server.keyserver, repo_id, targets_keyid.as_str())
        .await
        .unwrap();

    // The stored document is served even though it is expired.
    let (status, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(targets["signed"]["version"], json!(2));
}

#[tokio::test]
async fn offline_key_blocks_catalog_deletion() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("blocked").await;

    let (status, _, _) = server
        .request(
            "POST",
            &format!("/repo/{repo_id}/targets/app.bin"),
            Some(json!({"length": 4, "sha256": sha256_hex(b"data")})),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let root = armory_keyserver::roots::find_fresh(&server.keyserver, repo_id, None)
        .await
        .unwrap();
    let targets_keyid = root
        .signed
        .role_keys(armory_core::roles::RoleType::Targets)
        .unwrap()
        .keyids[0]
        .clone();
    armory_keyserver::roots::delete_private_key(&server.keyserver, repo_id, targets_keyid.as_str())
        .await
        .unwrap();

    let (status, _, body) = server
        .request(
            "DELETE",
            &format!("/repo/{repo_id}/targets/app.bin"),
            None,
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], json!("precondition_failed"));
}

fn delegation_block(keypair: &KeyPair, name: &str, threshold: u32) -> (Delegations, KeyId) {
    let key = keypair.tuf_key().unwrap();
    let keyid = key.key_id().unwrap();
    let mut keys: BTreeMap<KeyId, TufKey> = BTreeMap::new();
    keys.insert(keyid.clone(), key);
    (
        Delegations {
            keys,
            roles: vec![DelegatedRole {
                name: name.to_string(),
                keyids: vec![keyid.clone()],
                paths: vec!["vendor/*".to_string()],
                threshold,
                terminating: None,
            }],
        },
        keyid,
    )
}

fn sign_delegated(
    doc: &TargetsRole,
    keypair: &KeyPair,
    keyid: &KeyId,
) -> SignedPayload<TargetsRole> {
    let bytes = canonical::to_canonical_json(doc).unwrap();
    SignedPayload::new(
        vec![sign_canonical(keypair, keyid, &bytes).unwrap()],
        doc.clone(),
    )
}

#[tokio::test]
async fn delegated_targets_lifecycle() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("delegated").await;

    // Publish a targets with a delegation declared for "vendor".
    let vendor = KeyPair::generate(KeyType::Ed25519, 256).unwrap();
    let (delegations, vendor_keyid) = delegation_block(&vendor, "vendor", 1);
    let doc = targets_doc(
        vec![("pkg.bin", target_entry(b"payload", true))],
        2,
        Some(delegations),
    );
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let checksum = current_checksum(&server, repo_id).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    // Push the delegated document signed by the vendor key.
    let delegated = targets_doc(vec![("vendor/app.bin", target_entry(b"vendor build", true))], 1, None);
    let delegated_payload = sign_delegated(&delegated, &vendor, &vendor_keyid);
    let (status, _, body) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/delegations/vendor.json"),
            Some(serde_json::to_value(&delegated_payload).unwrap()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{body}");

    // It is served back verbatim.
    let (status, _, stored) = server
        .request(
            "GET",
            &format!("/repo/{repo_id}/delegations/vendor.json"),
            None,
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["signed"]["version"], json!(1));
    assert!(stored["signed"]["targets"]["vendor/app.bin"].is_object());

    // Version replay is rejected.
    let (status, _, body) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/delegations/vendor.json"),
            Some(serde_json::to_value(&delegated_payload).unwrap()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("invalid_version_bump"));

    // A delegation the targets never declared.
    let (status, _, body) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/delegations/unknown.json"),
            Some(serde_json::to_value(&delegated_payload).unwrap()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("delegation_not_defined"));

    // Signed by a key outside the delegation's key set.
    let impostor = KeyPair::generate(KeyType::Ed25519, 256).unwrap();
    let impostor_keyid = impostor.tuf_key().unwrap().key_id().unwrap();
    let next = targets_doc(vec![("vendor/app.bin", target_entry(b"v2", true))], 2, None);
    let forged = sign_delegated(&next, &impostor, &impostor_keyid);
    let (status, _, body) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/delegations/vendor.json"),
            Some(serde_json::to_value(&forged).unwrap()),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("payload_signature_invalid"));
}

#[tokio::test]
async fn delegations_block_must_be_consistent() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("delegation-block").await;
    let checksum = current_checksum(&server, repo_id).await;

    // A delegation referencing a key that is not declared in the block.
    let vendor = KeyPair::generate(KeyType::Ed25519, 256).unwrap();
    let (mut delegations, _) = delegation_block(&vendor, "vendor", 1);
    delegations.keys.clear();
    let doc = targets_doc(
        vec![("pkg.bin", target_entry(b"payload", true))],
        2,
        Some(delegations),
    );
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["description"].as_str().unwrap().contains("undeclared key"));

    // A malformed path pattern.
    let (mut delegations, _) = delegation_block(&vendor, "vendor", 1);
    delegations.roles[0].paths = vec!["/absolute/*".to_string()];
    let doc = targets_doc(
        vec![("pkg.bin", target_entry(b"payload", true))],
        2,
        Some(delegations),
    );
    let payload = oracle_sign(&server, repo_id, &doc).await;
    let (status, body) = push(&server, repo_id, &payload, Some(&checksum)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["description"].as_str().unwrap().contains("invalid path"));
}
