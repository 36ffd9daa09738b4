// ── Service integrations ──
//
// One implementation per service: which credential it needs, which
// actions configure it, and which checks verify it.

use crate::action::ConfigurationAction;
use crate::context::RunContext;
use crate::credentials::CredentialKind;
use crate::error::CoreError;
use crate::integrations::{
    ArrIntegration, BazarrIntegration, JellyfinIntegration, JellyseerrIntegration,
    ProwlarrIntegration, QbittorrentIntegration, SabnzbdIntegration,
};
use crate::registry::ServiceName;
use crate::verify::VerificationCheck;

pub trait ServiceIntegration: Send + Sync {
    fn service(&self) -> ServiceName;

    /// Credential that must be resolved before any action runs, if any.
    fn required_credential(&self) -> Option<CredentialKind>;

    /// Actions in the order they must run. Built fresh for every run.
    fn configuration_actions(
        &self,
        ctx: &RunContext,
    ) -> Result<Vec<Box<dyn ConfigurationAction>>, CoreError>;

    /// Checks for the verification pass. Probes skip themselves when a
    /// credential they need is unknown.
    fn verification_checks(&self, ctx: &RunContext) -> Vec<Box<dyn VerificationCheck>>;
}

/// Every integration, in dependency order.
pub fn integrations() -> Vec<Box<dyn ServiceIntegration>> {
    ServiceName::all().map(integration_for).collect()
}

pub fn integration_for(service: ServiceName) -> Box<dyn ServiceIntegration> {
    match service {
        ServiceName::Qbittorrent => Box::new(QbittorrentIntegration),
        ServiceName::Sabnzbd => Box::new(SabnzbdIntegration),
        ServiceName::Jellyfin => Box::new(JellyfinIntegration),
        ServiceName::Sonarr | ServiceName::Radarr | ServiceName::Lidarr => {
            Box::new(ArrIntegration::new(service))
        }
        ServiceName::Prowlarr => Box::new(ProwlarrIntegration),
        ServiceName::Bazarr => Box::new(BazarrIntegration),
        ServiceName::Jellyseerr => Box::new(JellyseerrIntegration),
    }
}
