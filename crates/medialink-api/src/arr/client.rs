// Client for the *arr family (Sonarr, Radarr, Lidarr, Prowlarr).
//
// All four share one REST dialect: `X-Api-Key` auth, `/api/{version}/`
// resources, and the provider/fields shape for download clients,
// notifications, applications, and indexers.

use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use super::models::{MetadataProfile, Provider, QualityProfile, RootFolder, SystemStatus};
use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::RestClient;
use crate::transport::TransportConfig;

/// API generation exposed by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// Sonarr v4, Radarr v5.
    V3,
    /// Lidarr, Prowlarr.
    V1,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V3 => "v3",
            Self::V1 => "v1",
        }
    }
}

/// Async client for one *arr application.
#[derive(Debug, Clone)]
pub struct ArrClient {
    rest: RestClient,
    version: ApiVersion,
}

impl ArrClient {
    /// Build from an API key; injects `X-Api-Key` on every request.
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        version: ApiVersion,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = ApiAuth::Header {
            name: "X-Api-Key",
            value: api_key,
        };
        Ok(Self {
            rest: RestClient::new(base_url, auth, transport)?,
            version,
        })
    }

    /// Wrap an existing `RestClient` (caller manages auth).
    pub fn from_rest(rest: RestClient, version: ApiVersion) -> Self {
        Self { rest, version }
    }

    fn path(&self, resource: &str) -> String {
        format!("api/{}/{resource}", self.version.as_str())
    }

    // ── System ───────────────────────────────────────────────────────

    pub async fn system_status(&self) -> Result<SystemStatus, Error> {
        self.rest.get(&self.path("system/status")).await
    }

    /// Host settings (auth method, username, ...), kept as raw JSON so a
    /// GET-modify-PUT round trip preserves every field.
    pub async fn host_config(&self) -> Result<Value, Error> {
        self.rest.get(&self.path("config/host")).await
    }

    pub async fn update_host_config(&self, config: &Value) -> Result<Value, Error> {
        let id = config.get("id").and_then(Value::as_i64).unwrap_or(1);
        self.rest
            .put(&self.path(&format!("config/host/{id}")), config)
            .await
    }

    // ── Root folders ─────────────────────────────────────────────────

    pub async fn root_folders(&self) -> Result<Vec<RootFolder>, Error> {
        self.rest.get(&self.path("rootfolder")).await
    }

    pub async fn add_root_folder(&self, folder: &RootFolder) -> Result<RootFolder, Error> {
        self.rest.post(&self.path("rootfolder"), folder).await
    }

    pub async fn delete_root_folder(&self, id: i64) -> Result<(), Error> {
        self.rest.delete(&self.path(&format!("rootfolder/{id}"))).await
    }

    // ── Download clients ─────────────────────────────────────────────

    pub async fn download_clients(&self) -> Result<Vec<Provider>, Error> {
        self.rest.get(&self.path("downloadclient")).await
    }

    /// Create a download client. `forceSave` skips the connectivity test the
    /// app would otherwise run against the downloader.
    pub async fn add_download_client(&self, client: &Provider) -> Result<Provider, Error> {
        self.rest
            .post(&self.path("downloadclient?forceSave=true"), client)
            .await
    }

    pub async fn update_download_client(&self, client: &Provider) -> Result<Provider, Error> {
        let id = client.id.unwrap_or_default();
        self.rest
            .put(&self.path(&format!("downloadclient/{id}?forceSave=true")), client)
            .await
    }

    // ── Notifications ────────────────────────────────────────────────

    pub async fn notifications(&self) -> Result<Vec<Provider>, Error> {
        self.rest.get(&self.path("notification")).await
    }

    pub async fn add_notification(&self, notification: &Provider) -> Result<Provider, Error> {
        self.rest
            .post(&self.path("notification?forceSave=true"), notification)
            .await
    }

    pub async fn update_notification(&self, notification: &Provider) -> Result<Provider, Error> {
        let id = notification.id.unwrap_or_default();
        self.rest
            .put(
                &self.path(&format!("notification/{id}?forceSave=true")),
                notification,
            )
            .await
    }

    // ── Profiles ─────────────────────────────────────────────────────

    pub async fn quality_profiles(&self) -> Result<Vec<QualityProfile>, Error> {
        self.rest.get(&self.path("qualityprofile")).await
    }

    pub async fn update_quality_profile(
        &self,
        profile: &QualityProfile,
    ) -> Result<QualityProfile, Error> {
        self.rest
            .put(&self.path(&format!("qualityprofile/{}", profile.id)), profile)
            .await
    }

    /// Lidarr only.
    pub async fn metadata_profiles(&self) -> Result<Vec<MetadataProfile>, Error> {
        self.rest.get(&self.path("metadataprofile")).await
    }

    // ── Prowlarr: applications ───────────────────────────────────────

    pub async fn applications(&self) -> Result<Vec<Provider>, Error> {
        self.rest.get(&self.path("applications")).await
    }

    pub async fn add_application(&self, app: &Provider) -> Result<Provider, Error> {
        self.rest
            .post(&self.path("applications?forceSave=true"), app)
            .await
    }

    pub async fn update_application(&self, app: &Provider) -> Result<Provider, Error> {
        let id = app.id.unwrap_or_default();
        self.rest
            .put(&self.path(&format!("applications/{id}?forceSave=true")), app)
            .await
    }

    // ── Prowlarr: indexers ───────────────────────────────────────────

    pub async fn indexers(&self) -> Result<Vec<Provider>, Error> {
        self.rest.get(&self.path("indexer")).await
    }

    /// Every indexer definition the app knows, as creatable templates.
    pub async fn indexer_schema(&self) -> Result<Vec<Provider>, Error> {
        self.rest.get(&self.path("indexer/schema")).await
    }

    pub async fn add_indexer(&self, indexer: &Provider) -> Result<Provider, Error> {
        self.rest
            .post(&self.path("indexer?forceSave=true"), indexer)
            .await
    }
}
