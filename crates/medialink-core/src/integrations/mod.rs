// ── Per-service integrations ──

mod arr;
mod bazarr;
mod jellyfin;
mod jellyseerr;
mod prowlarr;
mod qbittorrent;
mod sabnzbd;

pub use arr::ArrIntegration;
pub use bazarr::BazarrIntegration;
pub use jellyfin::JellyfinIntegration;
pub use jellyseerr::JellyseerrIntegration;
pub use prowlarr::ProwlarrIntegration;
pub use qbittorrent::QbittorrentIntegration;
pub use sabnzbd::SabnzbdIntegration;

use serde_json::Value;

use crate::context::RunContext;
use crate::registry::ServiceName;

/// Compare two filesystem paths ignoring a trailing slash.
pub(crate) fn same_path(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Read a JSON value as a string, accepting numbers too.
pub(crate) fn value_str(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Skip reason for an action whose peer is disabled, not ready, or has no
/// API key.
pub(crate) fn peer_unavailable(ctx: &RunContext, service: ServiceName) -> Option<String> {
    if ctx.is_enabled(service) && !ctx.is_ready(service) {
        Some(format!("{service} is not ready"))
    } else {
        peer_unknown(ctx, service)
    }
}

/// Skip reason for a check whose peer is disabled or has no API key.
///
/// Readiness is not consulted; a `test` run without a readiness wait still
/// fails an unlinked peer.
pub(crate) fn peer_unknown(ctx: &RunContext, service: ServiceName) -> Option<String> {
    if !ctx.is_enabled(service) {
        Some(format!("{service} is disabled"))
    } else if ctx.api_key(service).is_none() {
        Some(format!("{service} API key unknown"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn path_comparison_ignores_trailing_slash() {
        assert!(same_path("/media/tv/", "/media/tv"));
        assert!(!same_path("/downloads", "/media/tv"));
    }

    #[test]
    fn value_str_accepts_numbers() {
        assert_eq!(value_str(Some(&json!(8989))).as_deref(), Some("8989"));
        assert_eq!(value_str(Some(&json!("sonarr"))).as_deref(), Some("sonarr"));
        assert_eq!(value_str(None), None);
    }
}
