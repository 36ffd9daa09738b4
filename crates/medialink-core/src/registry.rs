// ── Service registry ──
//
// The closed set of services the engine knows how to wire together, in
// dependency order, plus one immutable descriptor per service for the run.

use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

use crate::error::CoreError;
use crate::settings::StackSettings;

/// Every service in the stack. Declaration order is dependency order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    Qbittorrent,
    Sabnzbd,
    Jellyfin,
    Sonarr,
    Radarr,
    Lidarr,
    Prowlarr,
    Bazarr,
    Jellyseerr,
}

impl ServiceName {
    /// All services in dependency order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    /// Parse user input (CLI `--service`).
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        name.trim()
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| CoreError::UnknownService {
                name: name.to_owned(),
                expected: Self::all()
                    .map(|s| s.as_ref().to_owned())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Product name as the services spell it.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Qbittorrent => "qBittorrent",
            Self::Sabnzbd => "SABnzbd",
            Self::Jellyfin => "Jellyfin",
            Self::Sonarr => "Sonarr",
            Self::Radarr => "Radarr",
            Self::Lidarr => "Lidarr",
            Self::Prowlarr => "Prowlarr",
            Self::Bazarr => "Bazarr",
            Self::Jellyseerr => "Jellyseerr",
        }
    }

    /// Port published on the host.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Qbittorrent => 8080,
            Self::Sabnzbd => 8085,
            Self::Jellyfin => 8096,
            Self::Sonarr => 8989,
            Self::Radarr => 7878,
            Self::Lidarr => 8686,
            Self::Prowlarr => 9696,
            Self::Bazarr => 6767,
            Self::Jellyseerr => 5055,
        }
    }

    /// Port on the container network.
    pub fn internal_port(self) -> u16 {
        match self {
            Self::Sabnzbd => 8080,
            other => other.default_port(),
        }
    }

    pub fn health_path(self) -> &'static str {
        match self {
            Self::Qbittorrent => "api/v2/app/version",
            Self::Sabnzbd => "api?mode=version",
            Self::Jellyfin => "health",
            Self::Sonarr | Self::Radarr | Self::Lidarr | Self::Prowlarr => "ping",
            Self::Bazarr => "",
            Self::Jellyseerr => "api/v1/status",
        }
    }

    pub fn key_source(self) -> KeySource {
        match self {
            Self::Qbittorrent => KeySource::Declared,
            Self::Sabnzbd => KeySource::IniKey {
                file: "sabnzbd.ini",
                key: "api_key",
            },
            Self::Jellyfin => KeySource::Provisioned,
            Self::Sonarr | Self::Radarr | Self::Lidarr | Self::Prowlarr => KeySource::XmlTag {
                file: "config.xml",
                tag: "ApiKey",
            },
            Self::Bazarr => KeySource::YamlPath {
                file: "config/config.yaml",
                path: "auth.apikey",
            },
            Self::Jellyseerr => KeySource::JsonPointer {
                file: "settings.json",
                pointer: "/main/apiKey",
            },
        }
    }

    /// Sonarr, Radarr and Lidarr: the apps that own a library.
    pub fn is_arr(self) -> bool {
        matches!(self, Self::Sonarr | Self::Radarr | Self::Lidarr)
    }

    /// Downloader category used for this app's grabs.
    pub fn download_category(self) -> Option<&'static str> {
        match self {
            Self::Sonarr => Some("tv"),
            Self::Radarr => Some("movies"),
            Self::Lidarr => Some("music"),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Qbittorrent => 0,
            Self::Sabnzbd => 1,
            Self::Jellyfin => 2,
            Self::Sonarr => 3,
            Self::Radarr => 4,
            Self::Lidarr => 5,
            Self::Prowlarr => 6,
            Self::Bazarr => 7,
            Self::Jellyseerr => 8,
        }
    }
}

/// Where a service's credential comes from. File paths are relative to
/// the service's config directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// `<Tag>value</Tag>` in an XML file.
    XmlTag {
        file: &'static str,
        tag: &'static str,
    },
    /// `key = value` in an INI file.
    IniKey {
        file: &'static str,
        key: &'static str,
    },
    /// A JSON pointer into a JSON file.
    JsonPointer {
        file: &'static str,
        pointer: &'static str,
    },
    /// A dotted path into a YAML file.
    YamlPath {
        file: &'static str,
        path: &'static str,
    },
    /// The declared admin password.
    Declared,
    /// Created by the configurator during the run.
    Provisioned,
}

/// Static facts about one service for the duration of a run.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: ServiceName,
    /// Base URL reachable from the host running the engine.
    pub external_url: Url,
    /// Base URL reachable from the other containers.
    pub internal_url: Url,
    pub health_path: &'static str,
    pub key_source: KeySource,
}

impl ServiceDescriptor {
    pub fn health_url(&self) -> Result<Url, CoreError> {
        self.external_url
            .join(self.health_path)
            .map_err(|source| CoreError::InvalidServiceUrl {
                service: self.name,
                source,
            })
    }

    /// Hostname other containers use for this service.
    pub fn internal_host(&self) -> &str {
        self.internal_url.host_str().unwrap_or(self.name.as_ref())
    }

    pub fn internal_port(&self) -> u16 {
        self.internal_url
            .port_or_known_default()
            .unwrap_or_else(|| self.name.internal_port())
    }

    /// Internal URL without the trailing slash, as apps expect in settings.
    pub fn internal_base(&self) -> String {
        self.internal_url.as_str().trim_end_matches('/').to_owned()
    }
}

/// One descriptor per service, in dependency order.
#[derive(Debug, Clone)]
pub struct Registry {
    descriptors: Vec<ServiceDescriptor>,
}

impl Registry {
    /// Build every descriptor from built-in defaults plus declared
    /// overrides.
    pub fn from_settings(settings: &StackSettings) -> Result<Self, CoreError> {
        let descriptors = ServiceName::all()
            .map(|name| {
                let overrides = settings.service(name);
                let external_url = match overrides.external_url {
                    Some(url) => with_trailing_slash(url),
                    None => parse_base(
                        name,
                        &format!("http://{}:{}/", settings.external_host, name.default_port()),
                    )?,
                };
                let internal_url = match overrides.internal_url {
                    Some(url) => with_trailing_slash(url),
                    None => parse_base(name, &format!("http://{name}:{}/", name.internal_port()))?,
                };
                Ok(ServiceDescriptor {
                    name,
                    external_url,
                    internal_url,
                    health_path: name.health_path(),
                    key_source: name.key_source(),
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(Self { descriptors })
    }

    /// Infallible: every service has a descriptor by construction.
    pub fn get(&self, name: ServiceName) -> &ServiceDescriptor {
        &self.descriptors[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }
}

fn parse_base(service: ServiceName, raw: &str) -> Result<Url, CoreError> {
    Url::parse(raw).map_err(|source| CoreError::InvalidServiceUrl { service, source })
}

// `Url::join` drops the last path segment unless it ends in '/'.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
