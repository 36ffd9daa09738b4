// SABnzbd API
//
// Single endpoint (`/api`) multiplexed by `mode=`; the key travels as the
// `apikey` query parameter. Failures come back as HTTP 200 with
// `{"status": false, "error": "..."}`.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::rest::{RestClient, decode_value};
use crate::transport::TransportConfig;

#[derive(Deserialize)]
struct StatusEnvelope {
    status: Option<bool>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct VersionResponse {
    version: String,
}

/// A news server definition.
#[derive(Debug, Clone)]
pub struct NewsServer {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub connections: u16,
    pub ssl: bool,
}

/// Async client for SABnzbd.
#[derive(Debug, Clone)]
pub struct SabnzbdClient {
    rest: RestClient,
}

impl SabnzbdClient {
    pub fn new(
        base_url: Url,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let auth = ApiAuth::Query {
            param: "apikey",
            value: api_key,
        };
        Ok(Self {
            rest: RestClient::new(base_url, auth, transport)?,
        })
    }

    async fn call(&self, params: &[(&str, String)]) -> Result<Value, Error> {
        let mut query = vec![("output", "json".to_owned())];
        query.extend(params.iter().cloned());
        let body: Value = self.rest.get_with_params("api", &query).await?;

        let envelope: StatusEnvelope = decode_value(&body)?;
        if envelope.status == Some(false) {
            return Err(Error::Rejected {
                message: envelope.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(body)
    }

    pub async fn version(&self) -> Result<String, Error> {
        let body = self.call(&[("mode", "version".into())]).await?;
        let parsed: VersionResponse = decode_value(&body)?;
        Ok(parsed.version)
    }

    /// One config section (`misc`, `categories`, `servers`, ...).
    pub async fn config_section(&self, section: &str) -> Result<Value, Error> {
        let body = self
            .call(&[("mode", "get_config".into()), ("section", section.into())])
            .await?;
        Ok(body
            .get("config")
            .and_then(|c| c.get(section))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Set a single `misc`-style keyword.
    pub async fn set_keyword(&self, section: &str, keyword: &str, value: &str) -> Result<(), Error> {
        self.call(&[
            ("mode", "set_config".into()),
            ("section", section.into()),
            ("keyword", keyword.into()),
            ("value", value.into()),
        ])
        .await
        .map(|_| ())
    }

    /// Create or update a category whose completed dir is `dir`.
    pub async fn set_category(&self, name: &str, dir: &str) -> Result<(), Error> {
        self.call(&[
            ("mode", "set_config".into()),
            ("section", "categories".into()),
            ("name", name.into()),
            ("dir", dir.into()),
        ])
        .await
        .map(|_| ())
    }

    /// Create or update a news server, keyed by host.
    pub async fn set_server(&self, server: &NewsServer) -> Result<(), Error> {
        self.call(&[
            ("mode", "set_config".into()),
            ("section", "servers".into()),
            ("name", server.host.clone()),
            ("host", server.host.clone()),
            ("port", server.port.to_string()),
            ("username", server.username.clone()),
            ("password", server.password.expose_secret().to_owned()),
            ("connections", server.connections.to_string()),
            ("ssl", u8::from(server.ssl).to_string()),
            ("enable", "1".into()),
        ])
        .await
        .map(|_| ())
    }
}

/// Split SABnzbd's comma-separated list values, tolerating the list form
/// newer versions return.
pub fn list_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_value_handles_both_shapes() {
        assert_eq!(list_value(&json!("a, b,,c")), vec!["a", "b", "c"]);
        assert_eq!(list_value(&json!(["a", " b "])), vec!["a", "b"]);
        assert!(list_value(&json!(null)).is_empty());
    }
}
