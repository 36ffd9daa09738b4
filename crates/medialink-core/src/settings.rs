// ── Runtime stack settings ──
//
// Everything the engine needs to know about the host and the operator's
// intent. Built by the config crate (or directly in tests) and handed to
// `RunContext::new`; core never reads the declared configuration file.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use crate::readiness::WaitPolicy;
use crate::registry::ServiceName;

/// The admin account applied to every service that has a login.
#[derive(Debug, Clone)]
pub struct AdminAccount {
    pub username: String,
    pub password: SecretString,
    pub email: String,
}

/// Host directories as seen from inside the containers.
#[derive(Debug, Clone)]
pub struct MediaPaths {
    pub downloads: String,
    pub tv: String,
    pub movies: String,
    pub music: String,
}

impl MediaPaths {
    /// The library path an *arr app manages, if it is one.
    pub fn for_service(&self, service: ServiceName) -> Option<&str> {
        match service {
            ServiceName::Sonarr => Some(&self.tv),
            ServiceName::Radarr => Some(&self.movies),
            ServiceName::Lidarr => Some(&self.music),
            _ => None,
        }
    }
}

/// Per-service overrides.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub enabled: bool,
    pub external_url: Option<Url>,
    pub internal_url: Option<Url>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            external_url: None,
            internal_url: None,
        }
    }
}

/// A Jellyfin library to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySpec {
    pub name: String,
    /// Jellyfin collection type: `tvshows`, `movies`, `music`, ...
    pub collection_type: String,
    pub path: String,
}

/// A usenet provider for SABnzbd.
#[derive(Debug, Clone)]
pub struct UsenetProvider {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub connections: u16,
    pub ssl: bool,
}

/// A Prowlarr indexer, selected from the schema by definition name.
#[derive(Debug, Clone)]
pub struct IndexerSpec {
    pub definition: String,
    /// Display name; defaults to the schema's name.
    pub name: Option<String>,
    /// Field values set on top of the schema defaults.
    pub fields: BTreeMap<String, Value>,
}

/// Full runtime settings for one run.
#[derive(Debug, Clone)]
pub struct StackSettings {
    /// Root of the per-service config directories (`<root>/<service>/`).
    pub config_root: PathBuf,
    /// Directory holding the compose file; `.env` is rendered here.
    pub stack_dir: PathBuf,
    /// Optional directory of template overrides.
    pub templates_dir: Option<PathBuf>,

    pub admin: AdminAccount,
    pub paths: MediaPaths,

    pub timezone: String,
    pub puid: u32,
    pub pgid: u32,
    /// Public domain used for proxy rules; empty when unset.
    pub domain: String,
    /// Host part of every default external URL.
    pub external_host: String,
    /// UI culture used to complete the Jellyfin wizard.
    pub culture: String,
    pub country: String,

    pub services: HashMap<ServiceName, ServiceSettings>,
    pub libraries: Vec<LibrarySpec>,
    pub quality_profile: String,
    pub usenet: Option<UsenetProvider>,
    pub indexers: Vec<IndexerSpec>,

    pub readiness: WaitPolicy,
    /// Delay before the single reachability retry during verification.
    pub verify_backoff: Duration,
    /// Per-request timeout for API calls.
    pub http_timeout: Duration,
}

impl StackSettings {
    /// Settings with defaults for everything but the two required inputs.
    pub fn new(config_root: impl Into<PathBuf>, admin: AdminAccount) -> Self {
        let config_root = config_root.into();
        let stack_dir = config_root
            .parent()
            .map_or_else(|| config_root.clone(), std::path::Path::to_path_buf);
        let paths = MediaPaths {
            downloads: "/downloads".into(),
            tv: "/media/tv".into(),
            movies: "/media/movies".into(),
            music: "/media/music".into(),
        };
        let libraries = default_libraries(&paths);

        Self {
            config_root,
            stack_dir,
            templates_dir: None,
            admin,
            paths,
            timezone: "Etc/UTC".into(),
            puid: 1000,
            pgid: 1000,
            domain: String::new(),
            external_host: "localhost".into(),
            culture: "en-US".into(),
            country: "US".into(),
            services: HashMap::new(),
            libraries,
            quality_profile: "Any".into(),
            usenet: None,
            indexers: Vec::new(),
            readiness: WaitPolicy::default(),
            verify_backoff: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
        }
    }

    pub fn service(&self, name: ServiceName) -> ServiceSettings {
        self.services.get(&name).cloned().unwrap_or_default()
    }

    pub fn is_enabled(&self, name: ServiceName) -> bool {
        self.services.get(&name).is_none_or(|s| s.enabled)
    }

    /// Directory holding one service's own configuration files.
    pub fn service_dir(&self, name: ServiceName) -> PathBuf {
        self.config_root.join(name.as_ref())
    }
}

/// One library per media kind.
pub fn default_libraries(paths: &MediaPaths) -> Vec<LibrarySpec> {
    vec![
        LibrarySpec {
            name: "TV Shows".into(),
            collection_type: "tvshows".into(),
            path: paths.tv.clone(),
        },
        LibrarySpec {
            name: "Movies".into(),
            collection_type: "movies".into(),
            path: paths.movies.clone(),
        },
        LibrarySpec {
            name: "Music".into(),
            collection_type: "music".into(),
            path: paths.music.clone(),
        },
    ]
}
