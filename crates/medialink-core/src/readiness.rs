// ── Readiness waiter ──
//
// A service is "ready" as soon as its health endpoint produces any HTTP
// response at all: a 401 from an *arr that wants an API key still proves
// the web server is up. Timeouts are reported, never raised.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::context::RunContext;
use crate::registry::ServiceName;

/// How long to keep polling a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub connect_timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 90,
            interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Readiness {
    Ready { attempts: u32 },
    TimedOut { attempts: u32 },
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Poll `url` until it answers or the attempt budget runs out.
///
/// `policy.connect_timeout` bounds only the connect, so `http` must be built
/// with it; a slow answer on an open connection still counts.
pub async fn wait_for(
    http: &reqwest::Client,
    service: ServiceName,
    url: &Url,
    policy: &WaitPolicy,
) -> Readiness {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match http.get(url.clone()).send().await {
            Ok(response) => {
                debug!(%service, status = %response.status(), attempt, "service answered");
                return Readiness::Ready { attempts: attempt };
            }
            Err(e) => {
                debug!(%service, attempt, error = %e, "service not reachable yet");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Readiness::TimedOut {
        attempts: max_attempts,
    }
}

/// Wait for every enabled service in dependency order, recording ready
/// ones into the context.
pub async fn wait_all(
    ctx: &RunContext,
    mut on_result: impl FnMut(ServiceName, Readiness),
) -> Vec<(ServiceName, Readiness)> {
    let policy = ctx.settings().readiness;
    let mut results = Vec::new();

    for descriptor in ctx.registry().iter() {
        let service = descriptor.name;
        if !ctx.is_enabled(service) {
            continue;
        }

        let readiness = match descriptor.health_url() {
            Ok(url) => wait_for(ctx.http(), service, &url, &policy).await,
            Err(e) => {
                warn!(%service, error = %e, "cannot build health URL");
                Readiness::TimedOut { attempts: 0 }
            }
        };

        match readiness {
            Readiness::Ready { attempts } => {
                info!(%service, attempts, "service ready");
                ctx.mark_ready(service);
            }
            Readiness::TimedOut { attempts } => {
                warn!(%service, attempts, "service did not become reachable");
            }
        }
        on_result(service, readiness);
        results.push((service, readiness));
    }

    results
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use medialink_api::TransportConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn quick() -> WaitPolicy {
        WaitPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn unauthorized_counts_as_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/ping", server.uri())).unwrap();
        let readiness = wait_for(&reqwest::Client::new(), ServiceName::Sonarr, &url, &quick()).await;
        assert_eq!(readiness, Readiness::Ready { attempts: 1 });
    }

    #[tokio::test]
    async fn server_error_counts_as_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let readiness = wait_for(&reqwest::Client::new(), ServiceName::Bazarr, &url, &quick()).await;
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn slow_answer_after_connect_counts_as_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(600)))
            .mount(&server)
            .await;

        let policy = quick();
        let http = TransportConfig::default()
            .with_connect_timeout(policy.connect_timeout)
            .build_client()
            .unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let readiness = wait_for(&http, ServiceName::Jellyfin, &url, &policy).await;
        assert_eq!(readiness, Readiness::Ready { attempts: 1 });
    }

    #[tokio::test]
    async fn unreachable_times_out_after_budget() {
        // Bind then drop a listener to get a port nothing answers on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse(&format!("http://127.0.0.1:{port}/ping")).unwrap();
        let readiness = wait_for(&reqwest::Client::new(), ServiceName::Radarr, &url, &quick()).await;
        assert_eq!(readiness, Readiness::TimedOut { attempts: 3 });
    }
}
