//! Integration tests for repo creation, the target catalog, and the role
//! generation cascade.

mod common;

use armory_core::canonical;
use armory_core::roles::{ClientSignature, RoleType, RootRole, SignedPayload};
use axum::http::StatusCode;
use common::TestRepoServer;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(data))
}

async fn add_target(server: &TestRepoServer, repo_id: Uuid, filename: &str, content: &[u8]) {
    let (status, _, body) = server
        .request(
            "POST",
            &format!("/repo/{repo_id}/targets/{filename}"),
            Some(json!({
                "length": content.len(),
                "sha256": sha256_hex(content),
                "name": filename,
                "version": "1.0.0",
                "hardwareIds": ["hw-1"],
            })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK, "add target failed: {body}");
}

fn parse_expires(signed: &Value) -> OffsetDateTime {
    let raw = signed["expires"].as_str().expect("expires field");
    OffsetDateTime::parse(raw, &Rfc3339).expect("rfc3339 expires")
}

#[tokio::test]
async fn fresh_repo_serves_empty_version_one_roles() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("fresh").await;

    for file in ["targets.json", "snapshot.json", "timestamp.json"] {
        let (status, _, body) = server
            .request("GET", &format!("/repo/{repo_id}/{file}"), None, &[])
            .await;
        assert_eq!(status, StatusCode::OK, "{file}: {body}");
        assert_eq!(body["signed"]["version"], json!(1), "{file}");
    }

    let (_, _, body) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(body["signed"]["targets"], json!({}));
}

#[tokio::test]
async fn duplicate_namespace_is_conflict() {
    let server = TestRepoServer::new().await;
    server.create_repo("tenant-a").await;

    let (status, _, body) = server
        .request(
            "POST",
            "/user_repo",
            Some(json!({"keyType": "ed25519"})),
            &[("x-ats-namespace", "tenant-a")],
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], json!("entity_already_exists"));
}

#[tokio::test]
async fn add_target_cascades_into_consistent_roles() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("cascade").await;

    let content = b"ab";
    let digest = sha256_hex(content);
    add_target(&server, repo_id, "myfile", content).await;

    // targets.json: version 2, the item present, checksum header attached.
    let (status, headers, targets_bytes) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets.json"), vec![])
        .await;
    assert_eq!(status, StatusCode::OK);
    let checksum_header = headers
        .get("x-ats-role-checksum")
        .and_then(|v| v.to_str().ok())
        .expect("checksum header")
        .to_string();
    assert_eq!(checksum_header, sha256_hex(&targets_bytes));

    let targets: Value = serde_json::from_slice(&targets_bytes).unwrap();
    assert_eq!(targets["signed"]["version"], json!(2));
    let item = &targets["signed"]["targets"]["myfile"];
    assert_eq!(item["length"], json!(2));
    assert_eq!(item["hashes"]["sha256"], json!(digest));

    // snapshot.json: version 2, references the exact targets bytes.
    let (_, _, snapshot_bytes) = server
        .request_raw("GET", &format!("/repo/{repo_id}/snapshot.json"), vec![])
        .await;
    let snapshot: Value = serde_json::from_slice(&snapshot_bytes).unwrap();
    assert_eq!(snapshot["signed"]["version"], json!(2));
    let targets_meta = &snapshot["signed"]["meta"]["targets.json"];
    assert_eq!(targets_meta["length"], json!(targets_bytes.len()));
    assert_eq!(targets_meta["version"], json!(2));
    assert_eq!(
        targets_meta["hashes"]["sha256"],
        json!(sha256_hex(&targets_bytes))
    );
    assert!(snapshot["signed"]["meta"]["root.json"].is_object());

    // timestamp.json references the exact snapshot bytes.
    let (_, _, timestamp_bytes) = server
        .request_raw("GET", &format!("/repo/{repo_id}/timestamp.json"), vec![])
        .await;
    let timestamp: Value = serde_json::from_slice(&timestamp_bytes).unwrap();
    let snapshot_meta = &timestamp["signed"]["meta"]["snapshot.json"];
    assert_eq!(snapshot_meta["length"], json!(snapshot_bytes.len()));
    assert_eq!(
        snapshot_meta["hashes"]["sha256"],
        json!(sha256_hex(&snapshot_bytes))
    );
}

#[tokio::test]
async fn served_roles_verify_under_the_root_key_set() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("verify").await;
    add_target(&server, repo_id, "app.bin", b"content").await;

    let (_, _, root_body) = server
        .request("GET", &format!("/repo/{repo_id}/root.json"), None, &[])
        .await;
    let root: SignedPayload<RootRole> = serde_json::from_value(root_body).unwrap();

    for (file, role) in [
        ("targets.json", RoleType::Targets),
        ("snapshot.json", RoleType::Snapshot),
        ("timestamp.json", RoleType::Timestamp),
    ] {
        let (_, _, body) = server
            .request("GET", &format!("/repo/{repo_id}/{file}"), None, &[])
            .await;
        let signatures: Vec<ClientSignature> =
            serde_json::from_value(body["signatures"].clone()).unwrap();
        let signed_bytes = canonical::to_canonical_json(&body["signed"]).unwrap();

        let role_keys = root.signed.role_keys(role).expect("role declared");
        let mut verified = 0;
        for signature in &signatures {
            assert!(
                role_keys.keyids.contains(&signature.keyid),
                "{file}: signer not declared for {role}"
            );
            let key = root.signed.key(&signature.keyid).expect("key declared");
            armory_signer::verify_client_signature(key, &signed_bytes, signature)
                .unwrap_or_else(|e| panic!("{file}: signature invalid: {e}"));
            verified += 1;
        }
        assert!(verified >= role_keys.threshold as usize, "{file}");
    }
}

#[tokio::test]
async fn rotation_regenerates_the_cascade() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("rotate").await;
    add_target(&server, repo_id, "app.bin", b"v1").await;

    let (_, _, old_root) = server
        .request("GET", &format!("/repo/{repo_id}/root.json"), None, &[])
        .await;
    let (_, _, old_targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(old_root["signed"]["version"], json!(1));
    assert_eq!(old_targets["signed"]["version"], json!(2));

    armory_keyserver::roots::rotate(&server.keyserver, repo_id)
        .await
        .unwrap();

    let (_, _, new_root) = server
        .request("GET", &format!("/repo/{repo_id}/root.json"), None, &[])
        .await;
    assert_eq!(new_root["signed"]["version"], json!(2));

    // The cascade regenerates so snapshot references the new root.
    let (_, _, new_targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(new_targets["signed"]["version"], json!(3));

    let (_, _, snapshot) = server
        .request("GET", &format!("/repo/{repo_id}/snapshot.json"), None, &[])
        .await;
    assert_eq!(snapshot["signed"]["meta"]["root.json"]["version"], json!(2));

    // Historical root still served.
    let (status, _, v1) = server
        .request("GET", &format!("/repo/{repo_id}/1.root.json"), None, &[])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1["signed"]["version"], json!(1));
}

#[tokio::test]
async fn expire_not_before_reissues_roles_once() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("expiry").await;

    let floor = OffsetDateTime::now_utc() + time::Duration::days(180);
    let (status, _, _) = server
        .request(
            "PUT",
            &format!("/repo/{repo_id}/targets/expire/not-before"),
            Some(json!({"expireAt": floor.format(&Rfc3339).unwrap()})),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(targets["signed"]["version"], json!(2));
    assert!(parse_expires(&targets["signed"]) >= floor);

    // Reading again does not bump the version a second time.
    let (_, _, again) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert_eq!(again["signed"]["version"], json!(2));

    // The default-TTL roles honor the floor as well.
    let (_, _, timestamp) = server
        .request("GET", &format!("/repo/{repo_id}/timestamp.json"), None, &[])
        .await;
    assert!(parse_expires(&timestamp["signed"]) >= floor);
}

#[tokio::test]
async fn near_expiry_timestamp_is_refreshed_on_read() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("timestamp").await;

    // Force the stored timestamp close to expiry.
    let current = server
        .state
        .metadata
        .get_signed_role(repo_id, "timestamp")
        .await
        .unwrap()
        .unwrap();
    let mut near_expiry = current.clone();
    near_expiry.version += 1;
    near_expiry.expires_at = OffsetDateTime::now_utc() + time::Duration::minutes(20);
    server
        .state
        .metadata
        .persist_signed_roles(repo_id, None, &[near_expiry.clone()])
        .await
        .unwrap();

    let (_, _, body) = server
        .request("GET", &format!("/repo/{repo_id}/timestamp.json"), None, &[])
        .await;
    assert_eq!(body["signed"]["version"], json!(near_expiry.version + 1));
    assert!(parse_expires(&body["signed"]) > OffsetDateTime::now_utc() + time::Duration::hours(12));
}

#[tokio::test]
async fn delete_target_removes_it_from_the_catalog() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("delete").await;
    add_target(&server, repo_id, "keep.bin", b"keep").await;
    add_target(&server, repo_id, "drop.bin", b"drop").await;

    let (status, _, _) = server
        .request(
            "DELETE",
            &format!("/repo/{repo_id}/targets/drop.bin"),
            None,
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    assert!(targets["signed"]["targets"]["drop.bin"].is_null());
    assert!(targets["signed"]["targets"]["keep.bin"].is_object());

    let (status, _, body) = server
        .request(
            "DELETE",
            &format!("/repo/{repo_id}/targets/ghost.bin"),
            None,
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("missing_entity"));
}

#[tokio::test]
async fn concurrent_catalog_writers_never_diverge() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("concurrent").await;

    let writes = (0..4).map(|i| {
        let server = &server;
        async move {
            server
                .request(
                    "POST",
                    &format!("/repo/{repo_id}/targets/file-{i}.bin"),
                    Some(json!({"length": 1, "sha256": sha256_hex(&[i as u8])})),
                    &[],
                )
                .await
                .0
        }
    });
    let statuses = futures::future::join_all(writes).await;

    // Writers serialize through the store; every add lands or conflicts, and
    // the catalog matches the published targets either way.
    let succeeded = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert!(succeeded >= 1);

    let (_, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    let published = targets["signed"]["targets"].as_object().unwrap().len();
    let (_, _, listing) = server
        .request("GET", &format!("/repo/{repo_id}/target_items"), None, &[])
        .await;
    assert_eq!(listing["total"], json!(published));
}

#[tokio::test]
async fn listing_is_paginated_and_filtered() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("listing").await;
    for name in ["app-a.bin", "app-b.bin", "firmware.img"] {
        add_target(&server, repo_id, name, name.as_bytes()).await;
    }

    let (_, _, page) = server
        .request(
            "GET",
            &format!("/repo/{repo_id}/target_items?offset=0&limit=2"),
            None,
            &[],
        )
        .await;
    assert_eq!(page["total"], json!(3));
    assert_eq!(page["limit"], json!(2));
    assert_eq!(page["values"].as_array().unwrap().len(), 2);
    assert_eq!(page["values"][0]["filename"], json!("app-a.bin"));

    let (_, _, filtered) = server
        .request(
            "GET",
            &format!("/repo/{repo_id}/target_items?nameContains=app"),
            None,
            &[],
        )
        .await;
    assert_eq!(filtered["total"], json!(2));

    // The limit is capped.
    let (_, _, capped) = server
        .request(
            "GET",
            &format!("/repo/{repo_id}/target_items?limit=99999"),
            None,
            &[],
        )
        .await;
    assert_eq!(capped["limit"], json!(1000));
}

#[tokio::test]
async fn proprietary_patch_never_touches_managed_fields() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("patch").await;

    let content = b"data";
    let (status, _, _) = server
        .request(
            "POST",
            &format!("/repo/{repo_id}/targets/app.bin"),
            Some(json!({
                "length": content.len(),
                "sha256": sha256_hex(content),
                "name": "app",
                "version": "2.0.0",
                "proprietaryCustom": {"team": "fleet", "tier": 1},
            })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // A patch key that shadows a managed field name only lands inside
    // proprietary.
    let (status, _, item) = server
        .request(
            "PATCH",
            &format!("/repo/{repo_id}/proprietary-custom/app.bin"),
            Some(json!({"tier": 2, "name": "sneaky"})),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["custom"]["name"], json!("app"));
    assert_eq!(item["custom"]["version"], json!("2.0.0"));
    assert_eq!(item["custom"]["proprietary"]["tier"], json!(2));
    assert_eq!(item["custom"]["proprietary"]["team"], json!("fleet"));
    assert_eq!(item["custom"]["proprietary"]["name"], json!("sneaky"));

    // An empty patch changes nothing.
    let (_, _, unchanged) = server
        .request(
            "PATCH",
            &format!("/repo/{repo_id}/proprietary-custom/app.bin"),
            Some(json!({})),
            &[],
        )
        .await;
    assert_eq!(unchanged["custom"]["proprietary"], item["custom"]["proprietary"]);

    let (status, _, body) = server
        .request(
            "PATCH",
            &format!("/repo/{repo_id}/proprietary-custom/ghost.bin"),
            Some(json!({})),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("missing_entity"));
}

#[tokio::test]
async fn edit_target_updates_mutable_fields() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("edit").await;
    add_target(&server, repo_id, "app.bin", b"data").await;

    let (status, _, item) = server
        .request(
            "PATCH",
            &format!("/repo/{repo_id}/targets/app.bin"),
            Some(json!({
                "uri": "https://mirror.example.com/app.bin",
                "hardwareIds": ["hw-2", "hw-3"],
            })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["custom"]["uri"], json!("https://mirror.example.com/app.bin"));
    assert_eq!(item["custom"]["hardwareIds"], json!(["hw-2", "hw-3"]));
}

#[tokio::test]
async fn upload_and_download_target_blob() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("blobs").await;

    let content = b"firmware image contents".to_vec();
    let (status, _, _) = server
        .request_raw(
            "PUT",
            &format!("/repo/{repo_id}/targets/fw.img?name=fw&version=1.2.3&hardwareIds=hw-1,hw-2"),
            content.clone(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, downloaded) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets/fw.img"), vec![])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(downloaded, content);

    let (_, _, targets) = server
        .request("GET", &format!("/repo/{repo_id}/targets.json"), None, &[])
        .await;
    let item = &targets["signed"]["targets"]["fw.img"];
    assert_eq!(item["length"], json!(content.len()));
    assert_eq!(item["hashes"]["sha256"], json!(sha256_hex(&content)));
    assert_eq!(item["custom"]["cliUploaded"], json!(true));
    assert_eq!(item["custom"]["hardwareIds"], json!(["hw-1", "hw-2"]));
}

#[tokio::test]
async fn unmanaged_targets_redirect_or_fail() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("unmanaged").await;

    let (status, _, _) = server
        .request(
            "POST",
            &format!("/repo/{repo_id}/targets/external.bin"),
            Some(json!({
                "length": 10,
                "sha256": sha256_hex(b"whatever"),
                "uri": "https://cdn.example.com/external.bin",
            })),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, _) = server
        .request_raw("GET", &format!("/repo/{repo_id}/targets/external.bin"), vec![])
        .await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers.get("location").and_then(|v| v.to_str().ok()),
        Some("https://cdn.example.com/external.bin")
    );

    add_target(&server, repo_id, "nouri.bin", b"x").await;
    let (status, _, body) = server
        .request("GET", &format!("/repo/{repo_id}/targets/nouri.bin"), None, &[])
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], json!("no_uri_for_unmanaged_target"));

    let (status, _, _) = server
        .request("GET", &format!("/repo/{repo_id}/targets/ghost.bin"), None, &[])
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_target_filenames_are_rejected() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("names").await;

    let (status, _, body) = server
        .request(
            "POST",
            &format!("/repo/{repo_id}/targets/a/../b"),
            Some(json!({"length": 1, "sha256": sha256_hex(b"x")})),
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn unknown_role_files_are_missing_entities() {
    let server = TestRepoServer::new().await;
    let repo_id = server.create_repo("rolefiles").await;

    let (status, _, body) = server
        .request("GET", &format!("/repo/{repo_id}/nonsense.json"), None, &[])
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("missing_entity"));

    let (status, _, _) = server
        .request("GET", &format!("/repo/{repo_id}/99.root.json"), None, &[])
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
