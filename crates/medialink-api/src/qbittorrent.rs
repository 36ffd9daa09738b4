// qBittorrent WebUI API (v2)
//
// Cookie-session auth: `POST auth/login` sets an `SID` cookie in the
// client's jar. The WebUI rejects requests whose `Referer` does not match
// its own origin, so the client pins that header on every request.

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::RestClient;
use crate::transport::TransportConfig;

/// One torrent category.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub save_path: String,
}

/// Async client for the qBittorrent WebUI.
#[derive(Debug, Clone)]
pub struct QbitClient {
    rest: RestClient,
}

impl QbitClient {
    /// Build a client with its own cookie jar.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };

        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(base_url.as_str())
            .map_err(|e| Error::InvalidHeader(format!("Referer: {e}")))?;
        headers.insert(REFERER, referer);

        let http = config.build_client_with_headers(headers)?;
        Ok(Self {
            rest: RestClient::with_client(http, base_url, ApiAuth::None),
        })
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Log in; the session cookie is kept for subsequent calls.
    ///
    /// qBittorrent answers `200 "Ok."` on success and `200 "Fails."` on bad
    /// credentials; HTTP 403 means the client IP is temporarily banned.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        debug!(username, "qBittorrent login");
        let form = [("username", username), ("password", password.expose_secret())];
        let body = self.rest.post_form("api/v2/auth/login", &form).await?;

        if body.trim() == "Ok." {
            Ok(())
        } else {
            Err(Error::Authentication {
                message: format!("qBittorrent login refused: {}", body.trim()),
            })
        }
    }

    // ── App ──────────────────────────────────────────────────────────

    pub async fn version(&self) -> Result<String, Error> {
        self.rest.get_text("api/v2/app/version").await
    }

    /// All preferences as raw JSON.
    pub async fn preferences(&self) -> Result<Value, Error> {
        self.rest.get("api/v2/app/preferences").await
    }

    /// Apply a partial preferences object (only the keys present change).
    pub async fn set_preferences(&self, prefs: &Value) -> Result<(), Error> {
        let json = prefs.to_string();
        self.rest
            .post_form("api/v2/app/setPreferences", &[("json", json.as_str())])
            .await
            .map(|_| ())
    }

    // ── Categories ───────────────────────────────────────────────────

    pub async fn categories(&self) -> Result<HashMap<String, Category>, Error> {
        self.rest.get("api/v2/torrents/categories").await
    }

    pub async fn create_category(&self, name: &str, save_path: &str) -> Result<(), Error> {
        self.rest
            .post_form(
                "api/v2/torrents/createCategory",
                &[("category", name), ("savePath", save_path)],
            )
            .await
            .map(|_| ())
    }

    pub async fn edit_category(&self, name: &str, save_path: &str) -> Result<(), Error> {
        self.rest
            .post_form(
                "api/v2/torrents/editCategory",
                &[("category", name), ("savePath", save_path)],
            )
            .await
            .map(|_| ())
    }
}
