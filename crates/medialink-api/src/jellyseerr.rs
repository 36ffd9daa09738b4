// Jellyseerr API (v1)
//
// Before initialisation the portal has no API key; setup authenticates by
// logging in with the Jellyfin admin, which sets a session cookie. After
// that either the cookie or `X-Api-Key` works.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::RestClient;
use crate::transport::TransportConfig;

/// Jellyseerr's server-type discriminator for Jellyfin.
const SERVER_TYPE_JELLYFIN: u8 = 2;

/// `GET settings/public`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub media_server_type: Option<u8>,
}

/// A Jellyfin library as Jellyseerr sees it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// A registered Sonarr or Radarr server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
    pub hostname: String,
    pub port: u16,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub base_url: String,
    pub active_profile_id: i64,
    pub active_profile_name: String,
    pub active_directory: String,
    #[serde(default)]
    pub is4k: bool,
    #[serde(default)]
    pub is_default: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Jellyfin connection details for the first-run login.
#[derive(Debug, Clone)]
pub struct JellyfinLogin<'a> {
    pub username: &'a str,
    pub password: &'a SecretString,
    pub hostname: &'a str,
    pub port: u16,
    pub use_ssl: bool,
    pub email: &'a str,
}

/// Which *arr flavour a server entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrFlavor {
    Sonarr,
    Radarr,
}

impl ArrFlavor {
    fn path(self) -> &'static str {
        match self {
            Self::Sonarr => "api/v1/settings/sonarr",
            Self::Radarr => "api/v1/settings/radarr",
        }
    }
}

/// Async client for Jellyseerr.
#[derive(Debug, Clone)]
pub struct JellyseerrClient {
    rest: RestClient,
}

impl JellyseerrClient {
    /// Cookie-session client (first-run setup).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        Ok(Self {
            rest: RestClient::new(base_url, ApiAuth::None, &config)?,
        })
    }

    /// API-key client.
    pub fn with_api_key(
        base_url: Url,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = ApiAuth::Header {
            name: "X-Api-Key",
            value: api_key,
        };
        Ok(Self {
            rest: RestClient::new(base_url, auth, transport)?,
        })
    }

    // ── Status ───────────────────────────────────────────────────────

    pub async fn public_settings(&self) -> Result<PublicSettings, Error> {
        self.rest.get("api/v1/settings/public").await
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Log in through Jellyfin. On an uninitialised portal this also
    /// records the Jellyfin server address.
    pub async fn login_jellyfin(&self, login: &JellyfinLogin<'_>) -> Result<(), Error> {
        let body = json!({
            "username": login.username,
            "password": login.password.expose_secret(),
            "hostname": login.hostname,
            "port": login.port,
            "useSsl": login.use_ssl,
            "urlBase": "",
            "email": login.email,
            "serverType": SERVER_TYPE_JELLYFIN,
        });
        self.rest.post_no_response("api/v1/auth/jellyfin", &body).await
    }

    // ── Jellyfin settings ────────────────────────────────────────────

    pub async fn jellyfin_settings(&self) -> Result<Value, Error> {
        self.rest.get("api/v1/settings/jellyfin").await
    }

    /// Refresh the library list from Jellyfin.
    pub async fn sync_libraries(&self) -> Result<Vec<Library>, Error> {
        self.rest
            .get_with_params("api/v1/settings/jellyfin/library", &[("sync", "true".into())])
            .await
    }

    /// Enable exactly the given library ids.
    pub async fn enable_libraries(&self, ids: &[String]) -> Result<Vec<Library>, Error> {
        self.rest
            .get_with_params(
                "api/v1/settings/jellyfin/library",
                &[("enable", ids.join(","))],
            )
            .await
    }

    // ── *arr servers ─────────────────────────────────────────────────

    pub async fn servers(&self, flavor: ArrFlavor) -> Result<Vec<ArrServer>, Error> {
        self.rest.get(flavor.path()).await
    }

    pub async fn add_server(&self, flavor: ArrFlavor, server: &ArrServer) -> Result<ArrServer, Error> {
        self.rest.post(flavor.path(), server).await
    }

    pub async fn update_server(
        &self,
        flavor: ArrFlavor,
        server: &ArrServer,
    ) -> Result<ArrServer, Error> {
        let id = server.id.unwrap_or_default();
        self.rest
            .put(&format!("{}/{id}", flavor.path()), server)
            .await
    }

    // ── Initialisation ───────────────────────────────────────────────

    pub async fn initialize(&self) -> Result<(), Error> {
        self.rest
            .post_no_response("api/v1/settings/initialize", &json!({}))
            .await
    }
}
