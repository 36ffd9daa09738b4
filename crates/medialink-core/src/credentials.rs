// ── Credential discovery ──
//
// Services generate their own API keys on first start and write them into
// their config files. Resolution is a pure filesystem read: a missing
// file or field yields `None`, never an error, and the integration that
// needed it is skipped rather than failed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::registry::{KeySource, Registry, ServiceDescriptor, ServiceName};
use crate::settings::StackSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    #[strum(to_string = "API key")]
    ApiKey,
    #[strum(to_string = "password")]
    Password,
    #[strum(to_string = "access token")]
    AccessToken,
}

/// A secret discovered or provisioned for one service.
#[derive(Debug, Clone)]
pub struct ServiceCredential {
    pub service: ServiceName,
    pub kind: CredentialKind,
    pub secret: SecretString,
    pub discovered_at: DateTime<Utc>,
}

impl ServiceCredential {
    pub fn new(service: ServiceName, kind: CredentialKind, secret: SecretString) -> Self {
        Self {
            service,
            kind,
            secret,
            discovered_at: Utc::now(),
        }
    }
}

/// In-memory credential cache for one run. Never persisted.
#[derive(Debug, Default)]
pub struct CredentialStore {
    inner: RwLock<HashMap<(ServiceName, CredentialKind), ServiceCredential>>,
}

impl CredentialStore {
    pub fn insert(&self, credential: ServiceCredential) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert((credential.service, credential.kind), credential);
    }

    pub fn get(&self, service: ServiceName, kind: CredentialKind) -> Option<SecretString> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&(service, kind)).map(|c| c.secret.clone())
    }

    pub fn api_key(&self, service: ServiceName) -> Option<SecretString> {
        self.get(service, CredentialKind::ApiKey)
    }

    pub fn contains(&self, service: ServiceName, kind: CredentialKind) -> bool {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.contains_key(&(service, kind))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which services had a credential after a resolution pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CredentialSummary {
    pub found: Vec<ServiceName>,
    pub missing: Vec<ServiceName>,
}

/// Read one service's credential from disk (or from the declared settings).
pub fn resolve(descriptor: &ServiceDescriptor, settings: &StackSettings) -> Option<ServiceCredential> {
    let service = descriptor.name;
    let dir = settings.service_dir(service);

    let (kind, value) = match descriptor.key_source {
        KeySource::XmlTag { file, tag } => {
            let pattern = format!(r"<{tag}>\s*([^<\s]+)\s*</{tag}>");
            (CredentialKind::ApiKey, read_with(&dir.join(file), |s| capture(&pattern, s))?)
        }
        KeySource::IniKey { file, key } => {
            let pattern = format!(r"(?m)^\s*{key}\s*=\s*(\S+)\s*$");
            (CredentialKind::ApiKey, read_with(&dir.join(file), |s| capture(&pattern, s))?)
        }
        KeySource::JsonPointer { file, pointer } => {
            let value = read_with(&dir.join(file), |s| {
                let doc: serde_json::Value = serde_json::from_str(s).ok()?;
                doc.pointer(pointer)?.as_str().map(str::to_owned)
            })?;
            (CredentialKind::ApiKey, value)
        }
        KeySource::YamlPath { file, path } => {
            let value = read_with(&dir.join(file), |s| yaml_path(s, path))?;
            (CredentialKind::ApiKey, value)
        }
        KeySource::Declared => {
            let password = settings.admin.password.expose_secret().to_owned();
            (CredentialKind::Password, password)
        }
        KeySource::Provisioned => return None,
    };

    if value.trim().is_empty() {
        debug!(%service, "credential field present but empty");
        return None;
    }

    Some(ServiceCredential::new(service, kind, SecretString::from(value)))
}

/// Resolve every enabled service into `store`. Runs fresh on every call so
/// keys generated since the last pass are picked up.
pub fn resolve_all(
    registry: &Registry,
    settings: &StackSettings,
    store: &CredentialStore,
) -> CredentialSummary {
    let mut summary = CredentialSummary::default();

    for descriptor in registry.iter() {
        let service = descriptor.name;
        if !settings.is_enabled(service) {
            continue;
        }
        match resolve(descriptor, settings) {
            Some(credential) => {
                debug!(%service, kind = %credential.kind, "credential resolved");
                store.insert(credential);
                summary.found.push(service);
            }
            None if descriptor.key_source == KeySource::Provisioned => {
                if store.contains(service, CredentialKind::ApiKey) {
                    summary.found.push(service);
                }
            }
            None => summary.missing.push(service),
        }
    }

    summary
}

/// The most recent temporary WebUI password qBittorrent printed to its log.
///
/// Newer qBittorrent releases generate a random password on first start
/// and only log it. This is best effort: the log may rotate, or the
/// password may already have been changed.
pub fn ephemeral_password(log_path: &Path) -> Option<SecretString> {
    let content = std::fs::read_to_string(log_path)
        .inspect_err(|e| debug!(path = %log_path.display(), error = %e, "qBittorrent log unreadable"))
        .ok()?;
    let re = Regex::new(r"temporary password is provided for this session: (\S+)").ok()?;
    re.captures_iter(&content)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| SecretString::from(m.as_str().to_owned()))
}

/// Where qBittorrent writes its log inside its config directory.
pub fn qbittorrent_log(settings: &StackSettings) -> std::path::PathBuf {
    settings
        .service_dir(ServiceName::Qbittorrent)
        .join("qBittorrent")
        .join("logs")
        .join("qbittorrent.log")
}

fn read_with(path: &Path, extract: impl FnOnce(&str) -> Option<String>) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let value = extract(&content);
            if value.is_none() {
                debug!(path = %path.display(), "credential field not found");
            }
            value
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "credential file unreadable");
            None
        }
    }
}

fn capture(pattern: &str, haystack: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

fn yaml_path(content: &str, path: &str) -> Option<String> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content).ok()?;
    let mut node = &doc;
    for segment in path.split('.') {
        node = node.get(segment)?;
    }
    match node {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;
    use crate::settings::AdminAccount;

    fn settings(root: &Path) -> StackSettings {
        StackSettings::new(
            root,
            AdminAccount {
                username: "admin".into(),
                password: SecretString::from("hunter2"),
                email: String::new(),
            },
        )
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn resolved(settings: &StackSettings, name: ServiceName) -> Option<String> {
        let registry = Registry::from_settings(settings).unwrap();
        resolve(registry.get(name), settings).map(|c| c.secret.expose_secret().to_owned())
    }

    #[test]
    fn reads_every_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "sonarr/config.xml",
            "<Config>\n  <Port>8989</Port>\n  <ApiKey>abc123</ApiKey>\n</Config>",
        );
        write(
            root,
            "sabnzbd/sabnzbd.ini",
            "[misc]\nnzb_key = other\napi_key = sab456\n",
        );
        write(root, "jellyseerr/settings.json", r#"{"main":{"apiKey":"seerr789"}}"#);
        write(root, "bazarr/config/config.yaml", "auth:\n  apikey: baz000\n  type: null\n");

        let settings = settings(root);
        assert_eq!(resolved(&settings, ServiceName::Sonarr).as_deref(), Some("abc123"));
        assert_eq!(resolved(&settings, ServiceName::Sabnzbd).as_deref(), Some("sab456"));
        assert_eq!(resolved(&settings, ServiceName::Jellyseerr).as_deref(), Some("seerr789"));
        assert_eq!(resolved(&settings, ServiceName::Bazarr).as_deref(), Some("baz000"));
    }

    #[test]
    fn missing_file_or_field_is_none() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "radarr/config.xml", "<Config><Port>7878</Port></Config>");
        write(dir.path(), "lidarr/config.xml", "<Config><ApiKey></ApiKey></Config>");

        let settings = settings(dir.path());
        assert_eq!(resolved(&settings, ServiceName::Sonarr), None);
        assert_eq!(resolved(&settings, ServiceName::Radarr), None);
        assert_eq!(resolved(&settings, ServiceName::Lidarr), None);
    }

    #[test]
    fn declared_and_provisioned_sources() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        assert_eq!(resolved(&settings, ServiceName::Qbittorrent).as_deref(), Some("hunter2"));
        assert_eq!(resolved(&settings, ServiceName::Jellyfin), None);
    }

    #[test]
    fn resolve_all_splits_found_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "sonarr/config.xml", "<ApiKey>k</ApiKey>");
        let settings = settings(dir.path());
        let registry = Registry::from_settings(&settings).unwrap();
        let store = CredentialStore::default();

        let summary = resolve_all(&registry, &settings, &store);
        assert!(summary.found.contains(&ServiceName::Sonarr));
        assert!(summary.found.contains(&ServiceName::Qbittorrent));
        assert!(summary.missing.contains(&ServiceName::Radarr));
        assert!(!summary.missing.contains(&ServiceName::Jellyfin));
        assert_eq!(store.api_key(ServiceName::Sonarr).unwrap().expose_secret(), "k");
    }

    #[test]
    fn ephemeral_password_takes_latest() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("qbittorrent.log");
        fs::write(
            &log,
            "(I) The WebUI administrator username is: admin\n\
             (I) A temporary password is provided for this session: first1\n\
             (I) A temporary password is provided for this session: second2\n",
        )
        .unwrap();
        assert_eq!(ephemeral_password(&log).unwrap().expose_secret(), "second2");
        assert!(ephemeral_password(&dir.path().join("missing.log")).is_none());
    }
}
