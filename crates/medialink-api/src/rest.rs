// Generic JSON REST client
//
// Wraps `reqwest::Client` with base-URL joining, per-service auth, and
// uniform response handling. Every service client (arr, qbittorrent,
// jellyfin, ...) is a thin typed layer over one of these.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::ApiAuth;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest body excerpt carried in error messages.
const BODY_PREVIEW: usize = 200;

/// Raw HTTP client for one service's REST API.
///
/// Paths passed to the request helpers are relative to `base_url`, so a
/// service mounted under a prefix (`http://host/sonarr`) works unchanged.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    auth: ApiAuth,
}

impl RestClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, auth: ApiAuth, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, auth))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, auth: ApiAuth) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Replace the credentials used for subsequent requests.
    pub fn set_auth(&mut self, auth: ApiAuth) {
        self.auth = auth;
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a full URL: `{base}/{path}`.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.auth.apply(self.http.request(method, url))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET and decode a JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_with_params(path, &[]).await
    }

    /// GET with query parameters and decode a JSON body.
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self
            .request(reqwest::Method::GET, url)
            .query(params)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// GET and return the raw body text.
    pub async fn get_text(&self, path: &str) -> Result<String, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.request(reqwest::Method::GET, url).send().await?;
        handle_text(resp).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// POST a JSON body, ignoring whatever the service returns.
    pub async fn post_no_response<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .request(reqwest::Method::POST, url)
            .json(body)
            .send()
            .await?;
        handle_empty(resp).await
    }

    /// POST a JSON body with query parameters, ignoring the response.
    pub async fn post_with_params<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url} params={params:?}");

        let resp = self
            .request(reqwest::Method::POST, url)
            .query(params)
            .json(body)
            .send()
            .await?;
        handle_empty(resp).await
    }

    /// POST an urlencoded form and return the raw body text.
    pub async fn post_form<B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        form: &B,
    ) -> Result<String, Error> {
        let url = self.url(path)?;
        debug!("POST {url} (form)");

        let resp = self
            .request(reqwest::Method::POST, url)
            .form(form)
            .send()
            .await?;
        handle_text(resp).await
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put<T: DeserializeOwned, B: Serialize + Sync + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        handle_empty(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = handle_text(resp).await?;
    decode(&body)
}

async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
    handle_text(resp).await.map(|_| ())
}

async fn handle_text(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("credentials rejected (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                preview(&body).to_owned()
            },
        });
    }

    Ok(resp.text().await?)
}

/// Decode a JSON body, keeping a preview of the payload on failure.
pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: format!("{e} (body preview: {:?})", preview(body)),
        body: body.to_owned(),
    })
}

/// Decode an already-parsed JSON value into a typed shape.
pub(crate) fn decode_value<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(BODY_PREVIEW);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
