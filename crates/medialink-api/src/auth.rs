use secrecy::{ExposeSecret, SecretString};

const JELLYFIN_CLIENT: &str = "medialink";

/// How a request authenticates against a service.
///
/// Each variant carries the secret material needed for its scheme.
/// Cookie sessions (qBittorrent, Jellyseerr login) are `None` here: the
/// session cookie lives in the transport's cookie jar.
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// No credentials on the request (health probes, login endpoints, cookie sessions).
    None,

    /// A fixed header, e.g. `X-Api-Key` for the *arr family and Jellyseerr.
    Header {
        name: &'static str,
        value: SecretString,
    },

    /// A query parameter, e.g. SABnzbd's `apikey`.
    Query {
        param: &'static str,
        value: SecretString,
    },

    /// Jellyfin's `Authorization: MediaBrowser ...` header. The token is
    /// absent before the admin user has authenticated.
    MediaBrowser { token: Option<SecretString> },
}

impl ApiAuth {
    /// Attach credentials to an outgoing request.
    pub fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::None => builder,
            Self::Header { name, value } => builder.header(*name, value.expose_secret()),
            Self::Query { param, value } => builder.query(&[(*param, value.expose_secret())]),
            Self::MediaBrowser { token } => {
                builder.header(reqwest::header::AUTHORIZATION, media_browser_header(token.as_ref()))
            }
        }
    }
}

fn media_browser_header(token: Option<&SecretString>) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let mut value = format!(
        "MediaBrowser Client=\"{JELLYFIN_CLIENT}\", Device=\"{JELLYFIN_CLIENT}\", \
         DeviceId=\"{JELLYFIN_CLIENT}\", Version=\"{version}\""
    );
    if let Some(token) = token {
        value.push_str(&format!(", Token=\"{}\"", token.expose_secret()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_browser_header_without_token() {
        let header = media_browser_header(None);
        assert!(header.starts_with("MediaBrowser Client=\"medialink\""));
        assert!(!header.contains("Token="));
    }

    #[test]
    fn media_browser_header_with_token() {
        let token = SecretString::from("abc123");
        let header = media_browser_header(Some(&token));
        assert!(header.ends_with(", Token=\"abc123\""));
    }
}
