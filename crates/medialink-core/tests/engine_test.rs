#![allow(clippy::unwrap_used)]
// End-to-end engine tests: one wiremock server stands in for every enabled
// service; everything else is disabled.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use medialink_core::{
    ActionOutcome, AdminAccount, CheckOutcome, NoopObserver, Pipeline, RunContext, ServiceName,
    ServiceSettings, StackSettings, WaitPolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn settings(config_root: &Path, server: &MockServer, enabled: &[ServiceName]) -> StackSettings {
    let mut settings = StackSettings::new(
        config_root,
        AdminAccount {
            username: "admin".into(),
            password: SecretString::from("hunter2"),
            email: "admin@example.com".into(),
        },
    );
    settings.readiness = WaitPolicy {
        max_attempts: 2,
        interval: Duration::from_millis(10),
        connect_timeout: Duration::from_millis(500),
    };
    settings.verify_backoff = Duration::from_millis(10);

    let url = Url::parse(&server.uri()).unwrap();
    for service in ServiceName::all() {
        settings.services.insert(
            service,
            ServiceSettings {
                enabled: enabled.contains(&service),
                external_url: Some(url.clone()),
                internal_url: None,
            },
        );
    }
    settings
}

fn write_key(config_root: &Path, service: &str, key: &str) {
    let dir = config_root.join(service);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.xml"),
        format!("<Config>\n  <ApiKey>{key}</ApiKey>\n</Config>\n"),
    )
    .unwrap();
}

fn write_sonarr_key(config_root: &Path) {
    write_key(config_root, "sonarr", "sonarr-key");
}

async fn mount_json(server: &MockServer, verb: &str, route: &str, body: serde_json::Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// qBittorrent in its configured state, with the given categories.
async fn mount_qbit(server: &MockServer, categories: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ok."))
        .mount(server)
        .await;
    mount_json(
        server,
        "GET",
        "/api/v2/app/preferences",
        json!({ "save_path": "/downloads/torrents" }),
    )
    .await;
    mount_json(server, "GET", "/api/v2/torrents/categories", categories).await;
}

/// Sonarr with forms auth and an upgradable default profile.
async fn mount_sonarr_basics(server: &MockServer) {
    mount_json(
        server,
        "GET",
        "/api/v3/config/host",
        json!({ "id": 1, "authenticationMethod": "forms", "username": "admin" }),
    )
    .await;
    mount_json(
        server,
        "GET",
        "/api/v3/qualityprofile",
        json!([{ "id": 1, "name": "Any", "upgradeAllowed": true }]),
    )
    .await;
    mount_json(
        server,
        "GET",
        "/api/v3/system/status",
        json!({ "appName": "Sonarr", "version": "4.0.9" }),
    )
    .await;
}

fn qbit_download_client() -> serde_json::Value {
    json!({
        "id": 3,
        "name": "qBittorrent",
        "implementation": "QBittorrent",
        "configContract": "QBittorrentSettings",
        "fields": [
            { "name": "host", "value": "qbittorrent" },
            { "name": "port", "value": 8080 },
            { "name": "tvCategory", "value": "tv" }
        ]
    })
}

fn is_mutation(req: &Request) -> bool {
    req.method.as_str() != "GET" && req.url.path() != "/api/v2/auth/login"
}

fn position(requests: &[Request], verb: &str, route: &str) -> Option<usize> {
    requests
        .iter()
        .position(|r| r.method.as_str() == verb && r.url.path() == route)
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_converged_stack_sees_no_mutations() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write_sonarr_key(&root);

    mount_qbit(
        &server,
        json!({ "tv": { "name": "tv", "savePath": "/downloads/torrents/tv" } }),
    )
    .await;
    mount_sonarr_basics(&server).await;
    mount_json(
        &server,
        "GET",
        "/api/v3/rootfolder",
        json!([{ "id": 1, "path": "/media/tv" }]),
    )
    .await;
    mount_json(&server, "GET", "/api/v3/downloadclient", json!([qbit_download_client()])).await;

    let settings = settings(&root, &server, &[ServiceName::Qbittorrent, ServiceName::Sonarr]);
    let pipeline = Pipeline::new(RunContext::new(settings).unwrap());
    let report = pipeline.setup(&mut NoopObserver).await;

    assert!(!report.actions.is_empty());
    for record in &report.actions {
        assert_eq!(
            record.outcome,
            ActionOutcome::AlreadyConfigured,
            "{} {}",
            record.service,
            record.description
        );
    }

    let requests = server.received_requests().await.unwrap();
    let mutations: Vec<_> = requests
        .iter()
        .filter(|r| is_mutation(r))
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect();
    assert_eq!(mutations, Vec::<String>::new());
}

// ── Ordering ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_category_exists_before_arr_registers_downloader() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write_sonarr_key(&root);

    mount_qbit(&server, json!({})).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/torrents/createCategory"))
        .and(body_string_contains("category=tv"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    mount_sonarr_basics(&server).await;
    mount_json(
        &server,
        "GET",
        "/api/v3/rootfolder",
        json!([{ "id": 1, "path": "/media/tv" }]),
    )
    .await;
    mount_json(&server, "GET", "/api/v3/downloadclient", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/v3/downloadclient"))
        .respond_with(ResponseTemplate::new(201).set_body_json(qbit_download_client()))
        .expect(1)
        .mount(&server)
        .await;

    let settings = settings(&root, &server, &[ServiceName::Qbittorrent, ServiceName::Sonarr]);
    let pipeline = Pipeline::new(RunContext::new(settings).unwrap());
    let report = pipeline.setup(&mut NoopObserver).await;
    assert_eq!(report.failed_actions(), 0);

    let requests = server.received_requests().await.unwrap();
    let category = position(&requests, "POST", "/api/v2/torrents/createCategory").unwrap();
    let client = position(&requests, "POST", "/api/v3/downloadclient").unwrap();
    assert!(category < client, "category created at {category}, client at {client}");
}

// ── Skip vs fail ────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_credentials_skip_instead_of_failing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    // No sonarr/config.xml: the Sonarr key cannot be resolved.

    mount_qbit(
        &server,
        json!({ "tv": { "name": "tv", "savePath": "/downloads/torrents/tv" } }),
    )
    .await;

    let settings = settings(&root, &server, &[ServiceName::Qbittorrent, ServiceName::Sonarr]);
    let pipeline = Pipeline::new(RunContext::new(settings).unwrap());

    let setup = pipeline.setup(&mut NoopObserver).await;
    assert_eq!(setup.failed_actions(), 0);
    assert!(setup.credentials.missing.contains(&ServiceName::Sonarr));
    assert!(
        setup
            .actions
            .iter()
            .filter(|r| r.service == ServiceName::Sonarr)
            .all(|r| matches!(r.outcome, ActionOutcome::Skipped { .. }))
    );

    let verify = pipeline.verify(None, &mut NoopObserver).await;
    assert_eq!(verify.failed, 0, "{:#?}", verify.results);
    assert!(verify.skipped > 0);
    assert_eq!(verify.exit_code(), 0);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/api/v3/")));
}

#[tokio::test]
async fn test_standalone_verify_fails_unlinked_application() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write_sonarr_key(&root);
    write_key(&root, "prowlarr", "prowlarr-key");
    mount_json(&server, "GET", "/api/v1/applications", json!([])).await;

    let settings = settings(&root, &server, &[ServiceName::Sonarr, ServiceName::Prowlarr]);
    let pipeline = Pipeline::new(RunContext::new(settings).unwrap());
    let report = pipeline.verify(None, &mut NoopObserver).await;

    let sync = report
        .results
        .iter()
        .find(|r| r.description == "Prowlarr syncs to Sonarr")
        .unwrap();
    assert_eq!(
        sync.outcome,
        CheckOutcome::Fail {
            reason: "not registered".into()
        }
    );
}

// ── Stale-entry reconciliation ──────────────────────────────────────

/// Sonarr's root folder list, kept in step with POST and DELETE.
#[derive(Clone)]
struct RootFolders(Arc<Mutex<Vec<serde_json::Value>>>);

impl RootFolders {
    fn seeded(folders: serde_json::Value) -> Self {
        let list = folders.as_array().cloned().unwrap_or_default();
        Self(Arc::new(Mutex::new(list)))
    }

    fn paths(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap().to_owned())
            .collect()
    }
}

impl Respond for RootFolders {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut folders = self.0.lock().unwrap();
        match request.method.as_str() {
            "GET" => ResponseTemplate::new(200).set_body_json(folders.clone()),
            "POST" => {
                let mut folder: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                let id = folders
                    .iter()
                    .filter_map(|f| f["id"].as_i64())
                    .max()
                    .unwrap_or(0)
                    + 1;
                folder["id"] = json!(id);
                folders.push(folder.clone());
                ResponseTemplate::new(201).set_body_json(folder)
            }
            "DELETE" => {
                let id: i64 = request
                    .url
                    .path()
                    .rsplit('/')
                    .next()
                    .unwrap()
                    .parse()
                    .unwrap();
                folders.retain(|f| f["id"].as_i64() != Some(id));
                ResponseTemplate::new(200)
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

#[tokio::test]
async fn test_stale_root_folder_is_replaced() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write_sonarr_key(&root);

    mount_sonarr_basics(&server).await;
    let folders = RootFolders::seeded(json!([{ "id": 7, "path": "/downloads" }]));
    Mock::given(path_regex(r"^/api/v3/rootfolder(/\d+)?$"))
        .respond_with(folders.clone())
        .mount(&server)
        .await;

    let settings = settings(&root, &server, &[ServiceName::Sonarr]);
    let first = Pipeline::new(RunContext::new(settings.clone()).unwrap())
        .setup(&mut NoopObserver)
        .await;

    let root_folder = first
        .actions
        .iter()
        .find(|r| r.description == "root folder /media/tv")
        .unwrap();
    assert_eq!(root_folder.outcome, ActionOutcome::Applied);
    assert_eq!(folders.paths(), vec!["/media/tv".to_owned()]);

    let requests = server.received_requests().await.unwrap();
    let delete = position(&requests, "DELETE", "/api/v3/rootfolder/7").unwrap();
    let add = position(&requests, "POST", "/api/v3/rootfolder").unwrap();
    assert!(delete < add);
    assert_eq!(requests.iter().filter(|r| is_mutation(r)).count(), 2);
    let seen = requests.len();

    // Re-running against the converged state changes nothing.
    let second = Pipeline::new(RunContext::new(settings).unwrap())
        .setup(&mut NoopObserver)
        .await;
    for record in &second.actions {
        assert_eq!(
            record.outcome,
            ActionOutcome::AlreadyConfigured,
            "{} {}",
            record.service,
            record.description
        );
    }
    let requests = server.received_requests().await.unwrap();
    let repeated: Vec<_> = requests
        .iter()
        .skip(seen)
        .filter(|r| is_mutation(r))
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect();
    assert_eq!(repeated, Vec::<String>::new());
    assert_eq!(folders.paths(), vec!["/media/tv".to_owned()]);
}

// ── Rendering ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_env_file_carries_discovered_key_and_is_stable() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("config");
    write_sonarr_key(&root);
    mount_sonarr_basics(&server).await;
    mount_json(
        &server,
        "GET",
        "/api/v3/rootfolder",
        json!([{ "id": 1, "path": "/media/tv" }]),
    )
    .await;

    let settings = settings(&root, &server, &[ServiceName::Sonarr]);

    let first = Pipeline::new(RunContext::new(settings.clone()).unwrap())
        .setup(&mut NoopObserver)
        .await;
    let env = std::fs::read_to_string(dir.path().join(".env")).unwrap();
    assert!(env.contains("SONARR_API_KEY=sonarr-key"), "{env}");
    assert!(first.rendered.iter().all(|r| matches!(r.status, medialink_core::ArtifactStatus::Written)));

    let second = Pipeline::new(RunContext::new(settings).unwrap())
        .setup(&mut NoopObserver)
        .await;
    assert!(second.rendered.iter().all(|r| matches!(r.status, medialink_core::ArtifactStatus::Unchanged)));
    assert_eq!(std::fs::read_to_string(dir.path().join(".env")).unwrap(), env);
}
