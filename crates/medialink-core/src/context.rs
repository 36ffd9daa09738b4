// ── Run context ──
//
// The single value threaded through every stage of a run: settings,
// registry, credential cache, HTTP transport and the set of services that
// answered their readiness probe. Client factories live here so that
// integrations never build URLs or pick auth schemes themselves.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use medialink_api::{
    ApiVersion, ArrClient, BazarrClient, JellyfinClient, JellyseerrClient, QbitClient,
    SabnzbdClient, TransportConfig,
};
use secrecy::SecretString;

use crate::credentials::{CredentialKind, CredentialStore};
use crate::error::CoreError;
use crate::links::{DesiredLink, LinkKind, desired_links};
use crate::registry::{Registry, ServiceDescriptor, ServiceName};
use crate::settings::StackSettings;

pub struct RunContext {
    settings: StackSettings,
    registry: Registry,
    links: Vec<DesiredLink>,
    credentials: CredentialStore,
    transport: TransportConfig,
    http: reqwest::Client,
    ready: RwLock<BTreeSet<ServiceName>>,
}

impl RunContext {
    pub fn new(settings: StackSettings) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(settings.http_timeout);
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(
        settings: StackSettings,
        transport: TransportConfig,
    ) -> Result<Self, CoreError> {
        let registry = Registry::from_settings(&settings)?;
        let links = desired_links(&settings);
        let http = transport
            .clone()
            .with_connect_timeout(settings.readiness.connect_timeout)
            .build_client()?;

        Ok(Self {
            settings,
            registry,
            links,
            credentials: CredentialStore::default(),
            transport,
            http,
            ready: RwLock::new(BTreeSet::new()),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn descriptor(&self, name: ServiceName) -> &ServiceDescriptor {
        self.registry.get(name)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn links(&self) -> &[DesiredLink] {
        &self.links
    }

    /// Links originating at `from` of the given kind.
    pub fn links_from(&self, from: ServiceName, kind: LinkKind) -> impl Iterator<Item = &DesiredLink> {
        self.links
            .iter()
            .filter(move |l| l.from == from && l.kind == kind)
    }

    /// Plain client for health probes, connecting within the readiness
    /// connect timeout.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    // ── Ready set ────────────────────────────────────────────────────

    pub fn is_enabled(&self, name: ServiceName) -> bool {
        self.settings.is_enabled(name)
    }

    pub fn mark_ready(&self, name: ServiceName) {
        self.ready
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name);
    }

    pub fn is_ready(&self, name: ServiceName) -> bool {
        self.ready
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&name)
    }

    // ── Credentials ──────────────────────────────────────────────────

    pub fn api_key(&self, name: ServiceName) -> Option<SecretString> {
        self.credentials.api_key(name)
    }

    pub fn require_api_key(&self, name: ServiceName) -> Result<SecretString, CoreError> {
        self.api_key(name).ok_or(CoreError::MissingCredential {
            service: name,
            kind: CredentialKind::ApiKey,
        })
    }

    // ── Client factories ─────────────────────────────────────────────

    pub fn arr_client(&self, name: ServiceName) -> Result<ArrClient, CoreError> {
        let version = match name {
            ServiceName::Sonarr | ServiceName::Radarr => ApiVersion::V3,
            _ => ApiVersion::V1,
        };
        let key = self.require_api_key(name)?;
        let url = self.descriptor(name).external_url.clone();
        Ok(ArrClient::new(url, key, version, &self.transport)?)
    }

    pub fn qbit_client(&self) -> Result<QbitClient, CoreError> {
        let url = self.descriptor(ServiceName::Qbittorrent).external_url.clone();
        Ok(QbitClient::new(url, &self.transport)?)
    }

    pub fn sabnzbd_client(&self) -> Result<SabnzbdClient, CoreError> {
        let key = self.require_api_key(ServiceName::Sabnzbd)?;
        let url = self.descriptor(ServiceName::Sabnzbd).external_url.clone();
        Ok(SabnzbdClient::new(url, key, &self.transport)?)
    }

    /// Jellyfin client without a token (wizard and login endpoints).
    pub fn jellyfin_client(&self) -> Result<JellyfinClient, CoreError> {
        let url = self.descriptor(ServiceName::Jellyfin).external_url.clone();
        Ok(JellyfinClient::new(url, &self.transport)?)
    }

    /// Jellyfin client using the API key provisioned during this run.
    pub fn jellyfin_keyed_client(&self) -> Result<JellyfinClient, CoreError> {
        let key = self.require_api_key(ServiceName::Jellyfin)?;
        let url = self.descriptor(ServiceName::Jellyfin).external_url.clone();
        Ok(JellyfinClient::with_token(url, key, &self.transport)?)
    }

    /// Cookie-session Jellyseerr client; call `login_jellyfin` first.
    pub fn jellyseerr_session(&self) -> Result<JellyseerrClient, CoreError> {
        let url = self.descriptor(ServiceName::Jellyseerr).external_url.clone();
        Ok(JellyseerrClient::new(url, &self.transport)?)
    }

    pub fn jellyseerr_client(&self) -> Result<JellyseerrClient, CoreError> {
        let key = self.require_api_key(ServiceName::Jellyseerr)?;
        let url = self.descriptor(ServiceName::Jellyseerr).external_url.clone();
        Ok(JellyseerrClient::with_api_key(url, key, &self.transport)?)
    }

    pub fn bazarr_client(&self) -> Result<BazarrClient, CoreError> {
        let key = self.require_api_key(ServiceName::Bazarr)?;
        let url = self.descriptor(ServiceName::Bazarr).external_url.clone();
        Ok(BazarrClient::new(url, key, &self.transport)?)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("config_root", &self.settings.config_root)
            .field("links", &self.links.len())
            .field("credentials", &self.credentials.len())
            .finish_non_exhaustive()
    }
}
