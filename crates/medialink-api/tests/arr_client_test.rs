#![allow(clippy::unwrap_used)]
// Integration tests for `ArrClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medialink_api::arr::{Provider, RootFolder};
use medialink_api::{ApiVersion, ArrClient, Error, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(version: ApiVersion) -> (MockServer, ArrClient) {
    let server = MockServer::start().await;
    let client = ArrClient::new(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("sonarr-key"),
        version,
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── System ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_system_status_sends_api_key() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("GET"))
        .and(path("/api/v3/system/status"))
        .and(header("X-Api-Key", "sonarr-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "appName": "Sonarr", "version": "4.0.9" })),
        )
        .mount(&server)
        .await;

    let status = client.system_status().await.unwrap();
    assert_eq!(status.version, "4.0.9");
    assert_eq!(status.app_name.as_deref(), Some("Sonarr"));
}

#[tokio::test]
async fn test_v1_paths_for_prowlarr() {
    let (server, client) = setup(ApiVersion::V1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/applications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "name": "Sonarr",
            "implementation": "Sonarr",
            "configContract": "SonarrSettings",
            "syncLevel": "fullSync",
            "fields": [{ "name": "baseUrl", "value": "http://sonarr:8989" }]
        }])))
        .mount(&server)
        .await;

    let apps = client.applications().await.unwrap();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].field("baseUrl"), Some(&json!("http://sonarr:8989")));
}

// ── Root folders ────────────────────────────────────────────────────

#[tokio::test]
async fn test_root_folder_lifecycle() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("GET"))
        .and(path("/api/v3/rootfolder"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": 7, "path": "/downloads", "freeSpace": 1024 }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v3/rootfolder/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/rootfolder"))
        .and(body_partial_json(json!({ "path": "/media/tv" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 8, "path": "/media/tv" })))
        .expect(1)
        .mount(&server)
        .await;

    let folders = client.root_folders().await.unwrap();
    assert_eq!(folders[0].id, Some(7));
    client.delete_root_folder(7).await.unwrap();
    let created = client.add_root_folder(&RootFolder::new("/media/tv")).await.unwrap();
    assert_eq!(created.id, Some(8));
}

// ── Providers ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_download_client_forces_save() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("POST"))
        .and(path("/api/v3/downloadclient"))
        .and(query_param("forceSave", "true"))
        .and(body_partial_json(json!({
            "name": "qBittorrent",
            "implementation": "QBittorrent",
            "fields": [{ "name": "host", "value": "qbittorrent" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1,
            "name": "qBittorrent",
            "implementation": "QBittorrent",
            "configContract": "QBittorrentSettings",
            "fields": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("qBittorrent", "QBittorrent", "QBittorrentSettings")
        .with_field("host", "qbittorrent");
    let created = client.add_download_client(&provider).await.unwrap();
    assert_eq!(created.id, Some(1));
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.root_folders().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_carries_body_preview() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("GET"))
        .and(path("/api/v3/qualityprofile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is locked"))
        .mount(&server)
        .await;

    match client.quality_profiles().await {
        Err(Error::Http { status, ref message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("database is locked"), "got: {message}");
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup(ApiVersion::V3).await;

    Mock::given(method("GET"))
        .and(path("/api/v3/notification"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.notifications().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}
