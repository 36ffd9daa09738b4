// ── Desired links ──
//
// The cross-service references the stack should end up with, compiled
// once from settings. Configuration actions are built from these and
// report which link they maintain.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::Display;

use crate::registry::ServiceName;
use crate::settings::StackSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// An *arr sends grabs to a downloader.
    #[strum(to_string = "download client")]
    DownloadClient,
    /// An *arr tells the media server to rescan.
    #[strum(to_string = "notification")]
    Notification,
    /// Prowlarr pushes indexers into an *arr.
    #[strum(to_string = "application")]
    Application,
    /// The request portal authenticates against the media server.
    #[strum(to_string = "media server")]
    MediaServer,
    /// The request portal forwards requests to an *arr.
    #[strum(to_string = "arr server")]
    ArrServer,
    /// Bazarr fetches subtitles for an *arr's library.
    #[strum(to_string = "subtitles")]
    Subtitles,
}

/// `from` must end up configured to reference `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DesiredLink {
    pub from: ServiceName,
    pub to: ServiceName,
    pub kind: LinkKind,
    /// Link-specific values (e.g. the downloader `category`).
    pub fields: BTreeMap<String, String>,
}

impl DesiredLink {
    fn new(from: ServiceName, to: ServiceName, kind: LinkKind) -> Self {
        Self {
            from,
            to,
            kind,
            fields: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl fmt::Display for DesiredLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {} ({})", self.from, self.to, self.kind)
    }
}

/// Compile every link whose two ends are enabled.
pub fn desired_links(settings: &StackSettings) -> Vec<DesiredLink> {
    use ServiceName::{Bazarr, Jellyfin, Jellyseerr, Prowlarr, Qbittorrent, Sabnzbd};

    let enabled = |s: ServiceName| settings.is_enabled(s);
    let arrs: Vec<ServiceName> = ServiceName::all().filter(|s| s.is_arr() && enabled(*s)).collect();
    let mut links = Vec::new();

    for &arr in &arrs {
        let category = arr.download_category().unwrap_or_default();
        for downloader in [Qbittorrent, Sabnzbd] {
            if enabled(downloader) {
                links.push(
                    DesiredLink::new(arr, downloader, LinkKind::DownloadClient)
                        .with("category", category),
                );
            }
        }
        if enabled(Jellyfin) {
            links.push(DesiredLink::new(arr, Jellyfin, LinkKind::Notification));
        }
    }

    if enabled(Prowlarr) {
        for &arr in &arrs {
            links.push(DesiredLink::new(Prowlarr, arr, LinkKind::Application));
        }
    }

    if enabled(Bazarr) {
        for arr in [ServiceName::Sonarr, ServiceName::Radarr] {
            if enabled(arr) {
                links.push(DesiredLink::new(Bazarr, arr, LinkKind::Subtitles));
            }
        }
    }

    if enabled(Jellyseerr) {
        if enabled(Jellyfin) {
            links.push(DesiredLink::new(Jellyseerr, Jellyfin, LinkKind::MediaServer));
        }
        for arr in [ServiceName::Sonarr, ServiceName::Radarr] {
            if enabled(arr) {
                links.push(DesiredLink::new(Jellyseerr, arr, LinkKind::ArrServer));
            }
        }
    }

    links
}
