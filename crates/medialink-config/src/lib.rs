//! Declared configuration for medialink.
//!
//! One TOML file layered under `MEDIALINK_`-prefixed environment variables
//! (nested keys split on `__`, e.g. `MEDIALINK_ADMIN__PASSWORD`), validated
//! as a whole so every problem is reported at once, then translated into
//! `medialink_core::StackSettings`. Core never reads this file itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use medialink_core::readiness::WaitPolicy;
use medialink_core::settings::default_libraries;
use medialink_core::{
    AdminAccount, IndexerSpec, LibrarySpec, MediaPaths, ServiceName, ServiceSettings,
    StackSettings, UsenetProvider,
};

/// Jellyfin collection types a library may declare.
const COLLECTION_TYPES: [&str; 8] = [
    "tvshows",
    "movies",
    "music",
    "mixed",
    "books",
    "homevideos",
    "musicvideos",
    "boxsets",
];

const REDACTED: &str = "****";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration is invalid ({} problem(s))", .problems.len())]
    Invalid { problems: Vec<String> },

    #[error("configuration file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level declared configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root of the per-service config directories.
    pub config_root: Option<PathBuf>,
    /// Directory holding the compose file (defaults to the parent of
    /// `config_root`).
    pub stack_dir: Option<PathBuf>,
    /// Directory with template overrides.
    pub templates_dir: Option<PathBuf>,

    pub timezone: String,
    pub puid: u32,
    pub pgid: u32,
    pub domain: String,
    pub external_host: String,
    pub culture: String,
    pub country: String,
    pub quality_profile: String,

    pub admin: Admin,
    pub paths: Paths,
    /// Per-service overrides keyed by lowercase service name.
    pub services: BTreeMap<String, ServiceEntry>,
    /// Media server libraries; one per media kind when omitted.
    pub libraries: Option<Vec<Library>>,
    pub usenet: Option<Usenet>,
    pub indexers: Vec<Indexer>,
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_root: None,
            stack_dir: None,
            templates_dir: None,
            timezone: "Etc/UTC".into(),
            puid: 1000,
            pgid: 1000,
            domain: String::new(),
            external_host: "localhost".into(),
            culture: "en-US".into(),
            country: "US".into(),
            quality_profile: "Any".into(),
            admin: Admin::default(),
            paths: Paths::default(),
            services: BTreeMap::new(),
            libraries: None,
            usenet: None,
            indexers: Vec::new(),
            timeouts: Timeouts::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Admin {
    pub username: String,
    /// Plaintext; prefer `MEDIALINK_ADMIN__PASSWORD`.
    pub password: Option<String>,
    pub email: String,
}

impl Default for Admin {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: None,
            email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Paths {
    pub downloads: String,
    pub tv: String,
    pub movies: String,
    pub music: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            downloads: "/downloads".into(),
            tv: "/media/tv".into(),
            movies: "/media/movies".into(),
            music: "/media/music".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceEntry {
    pub enabled: bool,
    pub external_url: Option<String>,
    pub internal_url: Option<String>,
}

impl Default for ServiceEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            external_url: None,
            internal_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Library {
    pub name: String,
    pub collection_type: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Usenet {
    pub host: String,
    #[serde(default = "default_usenet_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    #[serde(default = "default_connections")]
    pub connections: u16,
    #[serde(default = "default_true")]
    pub ssl: bool,
}

fn default_usenet_port() -> u16 {
    563
}
fn default_connections() -> u16 {
    8
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Indexer {
    /// Indexer definition name as listed in Prowlarr's schema.
    pub definition: String,
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    pub readiness_attempts: u32,
    pub readiness_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub verify_backoff_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            readiness_attempts: 90,
            readiness_interval_secs: 1,
            connect_timeout_secs: 2,
            verify_backoff_secs: 5,
            http_timeout_secs: 30,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "medialink", "medialink").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("medialink");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load the declared configuration: defaults, then `path`, then env.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MEDIALINK_").split("__").ignore(&["config"]));

    Ok(figment.extract()?)
}

/// Load, validate and translate in one step.
pub fn load_settings(path: &Path) -> Result<StackSettings, ConfigError> {
    load(path)?.to_settings()
}

// ── Validation & translation ────────────────────────────────────────

/// Collects every problem instead of stopping at the first.
#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn push(&mut self, problem: impl Into<String>) {
        self.0.push(problem.into());
    }

    fn absolute(&mut self, field: &str, value: &str) {
        if !value.starts_with('/') {
            self.push(format!("{field}: '{value}' must be an absolute path"));
        }
    }

    /// `Area/City`, `Etc/...` or bare `UTC`/`GMT`; the zone itself is not
    /// looked up.
    fn timezone(&mut self, value: &str) {
        let charset = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '+'));
        let shaped = (value.contains('/') && !value.starts_with('/') && !value.ends_with('/'))
            || matches!(value, "UTC" | "GMT");
        if value.trim().is_empty() {
            self.push("timezone: must not be empty");
        } else if !(charset && shaped) {
            self.push(format!(
                "timezone: '{value}' is not a zone name like Europe/Berlin or Etc/UTC"
            ));
        }
    }

    fn url(&mut self, field: &str, value: Option<&String>) -> Option<Url> {
        let value = value?;
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url),
            Ok(url) => {
                self.push(format!("{field}: unsupported scheme '{}'", url.scheme()));
                None
            }
            Err(e) => {
                self.push(format!("{field}: invalid URL '{value}': {e}"));
                None
            }
        }
    }
}

impl Config {
    /// Every problem with this configuration; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        match self.to_settings() {
            Ok(_) => Vec::new(),
            Err(ConfigError::Invalid { problems }) => problems,
            Err(e) => vec![e.to_string()],
        }
    }

    /// Translate into core settings, or `Invalid` listing every problem.
    pub fn to_settings(&self) -> Result<StackSettings, ConfigError> {
        let mut problems = Problems::default();

        let config_root = match &self.config_root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => {
                problems.push(format!(
                    "config_root: '{}' must be an absolute path",
                    root.display()
                ));
                root.clone()
            }
            None => {
                problems.push("config_root: required");
                PathBuf::new()
            }
        };

        if self.admin.username.trim().is_empty() {
            problems.push("admin.username: must not be empty");
        }
        let password = match self.admin.password.as_deref() {
            Some(pw) if !pw.is_empty() => SecretString::from(pw),
            _ => {
                problems.push("admin.password: required (or set MEDIALINK_ADMIN__PASSWORD)");
                SecretString::from("")
            }
        };

        problems.absolute("paths.downloads", &self.paths.downloads);
        problems.absolute("paths.tv", &self.paths.tv);
        problems.absolute("paths.movies", &self.paths.movies);
        problems.absolute("paths.music", &self.paths.music);

        if self.quality_profile.trim().is_empty() {
            problems.push("quality_profile: must not be empty");
        }
        problems.timezone(&self.timezone);

        let services = self.services(&mut problems);
        let libraries = self.libraries(&mut problems);
        let usenet = self.usenet(&mut problems);
        let indexers = self.indexers(&mut problems);
        self.check_timeouts(&mut problems);

        if !problems.0.is_empty() {
            return Err(ConfigError::Invalid {
                problems: problems.0,
            });
        }

        let mut settings = StackSettings::new(
            config_root,
            AdminAccount {
                username: self.admin.username.clone(),
                password,
                email: self.admin.email.clone(),
            },
        );
        if let Some(dir) = &self.stack_dir {
            settings.stack_dir.clone_from(dir);
        }
        settings.templates_dir.clone_from(&self.templates_dir);
        settings.paths = MediaPaths {
            downloads: self.paths.downloads.clone(),
            tv: self.paths.tv.clone(),
            movies: self.paths.movies.clone(),
            music: self.paths.music.clone(),
        };
        settings.libraries = libraries.unwrap_or_else(|| default_libraries(&settings.paths));
        settings.timezone.clone_from(&self.timezone);
        settings.puid = self.puid;
        settings.pgid = self.pgid;
        settings.domain.clone_from(&self.domain);
        settings.external_host.clone_from(&self.external_host);
        settings.culture.clone_from(&self.culture);
        settings.country.clone_from(&self.country);
        settings.quality_profile.clone_from(&self.quality_profile);
        settings.services = services;
        settings.usenet = usenet;
        settings.indexers = indexers;

        let t = &self.timeouts;
        settings.readiness = WaitPolicy {
            max_attempts: t.readiness_attempts,
            interval: Duration::from_secs(t.readiness_interval_secs),
            connect_timeout: Duration::from_secs(t.connect_timeout_secs),
        };
        settings.verify_backoff = Duration::from_secs(t.verify_backoff_secs);
        settings.http_timeout = Duration::from_secs(t.http_timeout_secs);

        Ok(settings)
    }

    fn services(
        &self,
        problems: &mut Problems,
    ) -> std::collections::HashMap<ServiceName, ServiceSettings> {
        let mut services = std::collections::HashMap::new();
        for (name, entry) in &self.services {
            let service = match ServiceName::parse(name) {
                Ok(service) => service,
                Err(e) => {
                    problems.push(format!("services.{name}: {e}"));
                    continue;
                }
            };
            let external_url = problems.url(
                &format!("services.{name}.external_url"),
                entry.external_url.as_ref(),
            );
            let internal_url = problems.url(
                &format!("services.{name}.internal_url"),
                entry.internal_url.as_ref(),
            );
            services.insert(
                service,
                ServiceSettings {
                    enabled: entry.enabled,
                    external_url,
                    internal_url,
                },
            );
        }
        services
    }

    fn libraries(&self, problems: &mut Problems) -> Option<Vec<LibrarySpec>> {
        let libraries = self.libraries.as_ref()?;
        let mut seen = Vec::new();
        for (i, lib) in libraries.iter().enumerate() {
            let field = format!("libraries[{i}]");
            if lib.name.trim().is_empty() {
                problems.push(format!("{field}.name: must not be empty"));
            } else if seen.contains(&lib.name.to_lowercase()) {
                problems.push(format!("{field}.name: duplicate library '{}'", lib.name));
            } else {
                seen.push(lib.name.to_lowercase());
            }
            if !COLLECTION_TYPES.contains(&lib.collection_type.as_str()) {
                problems.push(format!(
                    "{field}.collection_type: '{}' is not one of {}",
                    lib.collection_type,
                    COLLECTION_TYPES.join(", ")
                ));
            }
            problems.absolute(&format!("{field}.path"), &lib.path);
        }
        Some(
            libraries
                .iter()
                .map(|lib| LibrarySpec {
                    name: lib.name.clone(),
                    collection_type: lib.collection_type.clone(),
                    path: lib.path.clone(),
                })
                .collect(),
        )
    }

    fn usenet(&self, problems: &mut Problems) -> Option<UsenetProvider> {
        let usenet = self.usenet.as_ref()?;
        if usenet.host.trim().is_empty() {
            problems.push("usenet.host: must not be empty");
        }
        if usenet.port == 0 {
            problems.push("usenet.port: must not be 0");
        }
        if usenet.connections == 0 {
            problems.push("usenet.connections: must be at least 1");
        }
        Some(UsenetProvider {
            host: usenet.host.clone(),
            port: usenet.port,
            username: usenet.username.clone(),
            password: SecretString::from(usenet.password.clone().unwrap_or_default()),
            connections: usenet.connections,
            ssl: usenet.ssl,
        })
    }

    fn indexers(&self, problems: &mut Problems) -> Vec<IndexerSpec> {
        let mut specs = Vec::new();
        for (i, indexer) in self.indexers.iter().enumerate() {
            if indexer.definition.trim().is_empty() {
                problems.push(format!("indexers[{i}].definition: must not be empty"));
            }
            let mut fields = BTreeMap::new();
            for (name, value) in &indexer.fields {
                match serde_json::to_value(value) {
                    Ok(json) => {
                        fields.insert(name.clone(), json);
                    }
                    Err(e) => problems.push(format!("indexers[{i}].fields.{name}: {e}")),
                }
            }
            specs.push(IndexerSpec {
                definition: indexer.definition.clone(),
                name: indexer.name.clone(),
                fields,
            });
        }
        specs
    }

    fn check_timeouts(&self, problems: &mut Problems) {
        let t = &self.timeouts;
        if t.readiness_attempts == 0 {
            problems.push("timeouts.readiness_attempts: must be at least 1");
        }
        if t.connect_timeout_secs == 0 {
            problems.push("timeouts.connect_timeout_secs: must be at least 1");
        }
        if t.http_timeout_secs == 0 {
            problems.push("timeouts.http_timeout_secs: must be at least 1");
        }
    }

    /// The effective configuration as TOML with every secret masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut cfg = self.clone();
        if cfg.admin.password.is_some() {
            cfg.admin.password = Some(REDACTED.into());
        }
        if let Some(usenet) = cfg.usenet.as_mut() {
            if usenet.password.is_some() {
                usenet.password = Some(REDACTED.into());
            }
        }
        Ok(toml::to_string_pretty(&cfg)?)
    }
}
