// Bazarr API
//
// Settings are read as nested JSON but written back as a flat urlencoded
// form of `settings-<section>-<key>` fields.

use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::RestClient;
use crate::transport::TransportConfig;

/// Async client for Bazarr.
#[derive(Debug, Clone)]
pub struct BazarrClient {
    rest: RestClient,
}

impl BazarrClient {
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = ApiAuth::Header {
            name: "X-API-KEY",
            value: api_key,
        };
        Ok(Self {
            rest: RestClient::new(base_url, auth, transport)?,
        })
    }

    pub async fn status(&self) -> Result<Value, Error> {
        self.rest.get("api/system/status").await
    }

    /// Full settings tree (`general`, `sonarr`, `radarr`, ...).
    pub async fn settings(&self) -> Result<Value, Error> {
        self.rest.get("api/system/settings").await
    }

    /// Write settings as `(settings-section-key, value)` pairs.
    pub async fn update_settings(&self, fields: &[(String, String)]) -> Result<(), Error> {
        self.rest
            .post_form("api/system/settings", fields)
            .await
            .map(|_| ())
    }
}
