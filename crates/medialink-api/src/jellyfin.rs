// Jellyfin API
//
// PascalCase JSON, `Authorization: MediaBrowser ...` header. The startup
// wizard endpoints are unauthenticated until the wizard completes.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::RestClient;
use crate::transport::TransportConfig;

/// `GET /System/Info/Public`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub startup_wizard_completed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
}

/// One API key issued by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiKeyInfo {
    pub access_token: String,
    #[serde(default)]
    pub app_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryResult<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// A library ("virtual folder").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualFolder {
    pub name: String,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub collection_type: Option<String>,
}

/// Async client for Jellyfin.
#[derive(Debug, Clone)]
pub struct JellyfinClient {
    rest: RestClient,
}

impl JellyfinClient {
    /// Client without a token: wizard and login endpoints only.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            rest: RestClient::new(base_url, ApiAuth::MediaBrowser { token: None }, transport)?,
        })
    }

    /// Client authenticated with an access token or API key.
    pub fn with_token(
        base_url: Url,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = ApiAuth::MediaBrowser { token: Some(token) };
        Ok(Self {
            rest: RestClient::new(base_url, auth, transport)?,
        })
    }

    /// Switch to token auth for the remaining calls.
    pub fn set_token(&mut self, token: SecretString) {
        self.rest.set_auth(ApiAuth::MediaBrowser { token: Some(token) });
    }

    // ── System ───────────────────────────────────────────────────────

    pub async fn public_info(&self) -> Result<PublicSystemInfo, Error> {
        self.rest.get("System/Info/Public").await
    }

    // ── Startup wizard ───────────────────────────────────────────────

    pub async fn startup_configuration(&self, culture: &str, country: &str) -> Result<(), Error> {
        self.rest
            .post_no_response(
                "Startup/Configuration",
                &json!({
                    "UICulture": culture,
                    "MetadataCountryCode": country,
                    "PreferredMetadataLanguage": culture.split('-').next().unwrap_or(culture),
                }),
            )
            .await
    }

    /// Create the initial admin user. The wizard requires a GET of the
    /// pending user before the POST takes effect.
    pub async fn startup_user(&self, name: &str, password: &SecretString) -> Result<(), Error> {
        let _pending: serde_json::Value = self.rest.get("Startup/User").await?;
        self.rest
            .post_no_response(
                "Startup/User",
                &json!({ "Name": name, "Password": password.expose_secret() }),
            )
            .await
    }

    pub async fn startup_remote_access(&self) -> Result<(), Error> {
        self.rest
            .post_no_response(
                "Startup/RemoteAccess",
                &json!({ "EnableRemoteAccess": true, "EnableAutomaticPortMapping": false }),
            )
            .await
    }

    pub async fn startup_complete(&self) -> Result<(), Error> {
        self.rest.post_no_response("Startup/Complete", &json!({})).await
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Authenticate a user by name; returns the session access token.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SecretString, Error> {
        let result: AuthenticationResult = self
            .rest
            .post(
                "Users/AuthenticateByName",
                &json!({ "Username": username, "Pw": password.expose_secret() }),
            )
            .await?;
        Ok(SecretString::from(result.access_token))
    }

    pub async fn api_keys(&self) -> Result<Vec<ApiKeyInfo>, Error> {
        let result: QueryResult<ApiKeyInfo> = self.rest.get("Auth/Keys").await?;
        Ok(result.items)
    }

    pub async fn create_api_key(&self, app: &str) -> Result<(), Error> {
        self.rest
            .post_with_params("Auth/Keys", &[("app", app.to_owned())], &json!({}))
            .await
    }

    // ── Libraries ────────────────────────────────────────────────────

    pub async fn virtual_folders(&self) -> Result<Vec<VirtualFolder>, Error> {
        self.rest.get("Library/VirtualFolders").await
    }

    pub async fn add_virtual_folder(
        &self,
        name: &str,
        collection_type: &str,
        path: &str,
    ) -> Result<(), Error> {
        self.rest
            .post_with_params(
                "Library/VirtualFolders",
                &[
                    ("name", name.to_owned()),
                    ("collectionType", collection_type.to_owned()),
                    ("paths", path.to_owned()),
                    ("refreshLibrary", "true".to_owned()),
                ],
                &json!({ "LibraryOptions": {} }),
            )
            .await
    }
}
