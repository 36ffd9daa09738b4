#![allow(clippy::unwrap_used)]
// Integration tests for the non-*arr clients using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medialink_api::jellyseerr::ArrFlavor;
use medialink_api::{
    BazarrClient, Error, JellyfinClient, JellyseerrClient, QbitClient, SabnzbdClient,
    TransportConfig,
};

fn base(server: &MockServer) -> Url {
    Url::parse(&server.uri()).unwrap()
}

// ── qBittorrent ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_qbit_login_keeps_session_cookie() {
    let server = MockServer::start().await;
    let client = QbitClient::new(base(&server), &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .and(body_string_contains("username=admin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SID=abc123; HttpOnly; path=/")
                .set_body_string("Ok."),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/app/version"))
        .and(header("cookie", "SID=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v4.6.2"))
        .mount(&server)
        .await;

    client
        .login("admin", &SecretString::from("adminadmin"))
        .await
        .unwrap();
    assert_eq!(client.version().await.unwrap(), "v4.6.2");
}

#[tokio::test]
async fn test_qbit_login_fails_body_is_auth_error() {
    let server = MockServer::start().await;
    let client = QbitClient::new(base(&server), &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Fails."))
        .mount(&server)
        .await;

    let err = client
        .login("admin", &SecretString::from("wrong"))
        .await
        .unwrap_err();
    assert!(err.is_auth(), "got: {err:?}");
}

#[tokio::test]
async fn test_qbit_categories_are_keyed_by_name() {
    let server = MockServer::start().await;
    let client = QbitClient::new(base(&server), &TransportConfig::default()).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v2/torrents/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tv": { "name": "tv", "savePath": "/downloads/torrents/tv" }
        })))
        .mount(&server)
        .await;

    let categories = client.categories().await.unwrap();
    assert_eq!(categories["tv"].save_path, "/downloads/torrents/tv");
}

// ── SABnzbd ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sabnzbd_sends_key_and_json_output() {
    let server = MockServer::start().await;
    let client = SabnzbdClient::new(
        base(&server),
        SecretString::from("sabkey"),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api"))
        .and(query_param("mode", "version"))
        .and(query_param("output", "json"))
        .and(query_param("apikey", "sabkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "4.3.3" })))
        .mount(&server)
        .await;

    assert_eq!(client.version().await.unwrap(), "4.3.3");
}

#[tokio::test]
async fn test_sabnzbd_status_false_is_rejected() {
    let server = MockServer::start().await;
    let client = SabnzbdClient::new(
        base(&server),
        SecretString::from("wrong"),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": false, "error": "API Key Incorrect" })),
        )
        .mount(&server)
        .await;

    match client.config_section("misc").await {
        Err(Error::Rejected { message }) => assert_eq!(message, "API Key Incorrect"),
        other => panic!("expected Rejected, got: {other:?}"),
    }
}

// ── Jellyfin ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_jellyfin_authenticate_returns_token() {
    let server = MockServer::start().await;
    let client = JellyfinClient::new(base(&server), &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/Users/AuthenticateByName"))
        .and(header_regex("authorization", r#"^MediaBrowser Client="medialink""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccessToken": "tok-1",
            "User": { "Name": "admin" }
        })))
        .mount(&server)
        .await;

    let token = client
        .authenticate("admin", &SecretString::from("pw"))
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "tok-1");
}

#[tokio::test]
async fn test_jellyfin_token_travels_in_header() {
    let server = MockServer::start().await;
    let client = JellyfinClient::with_token(
        base(&server),
        SecretString::from("tok-1"),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/Auth/Keys"))
        .and(header_regex("authorization", r#"Token="tok-1""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{ "AccessToken": "k1", "AppName": "medialink" }],
            "TotalRecordCount": 1
        })))
        .mount(&server)
        .await;

    let keys = client.api_keys().await.unwrap();
    assert_eq!(keys[0].app_name.as_deref(), Some("medialink"));
}

// ── Jellyseerr ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_jellyseerr_servers_by_flavor() {
    let server = MockServer::start().await;
    let client = JellyseerrClient::with_api_key(
        base(&server),
        SecretString::from("seerr"),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/settings/radarr"))
        .and(header("X-Api-Key", "seerr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 0,
            "name": "Radarr",
            "hostname": "radarr",
            "port": 7878,
            "apiKey": "rk",
            "activeProfileId": 1,
            "activeProfileName": "Any",
            "activeDirectory": "/media/movies",
            "is4k": false,
            "isDefault": true
        }])))
        .mount(&server)
        .await;

    let servers = client.servers(ArrFlavor::Radarr).await.unwrap();
    assert_eq!(servers[0].active_directory, "/media/movies");
    assert!(servers[0].is_default);
}

// ── Bazarr ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bazarr_settings_written_as_form() {
    let server = MockServer::start().await;
    let client = BazarrClient::new(
        base(&server),
        SecretString::from("bz"),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/system/settings"))
        .and(header("X-API-KEY", "bz"))
        .and(body_string_contains("settings-general-use_sonarr=true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update_settings(&[("settings-general-use_sonarr".into(), "true".into())])
        .await
        .unwrap();
}
