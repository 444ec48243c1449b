//! Single-URL validation with single-flight deduplication.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheStatus, ValidationOutcome};
use crate::domain::ports::ImageProbePort;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::image::{Claim, FlightTicket, ImageRegistry};

/// Tuning for [`ImageValidator`].
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Maximum probes running at once.
    pub max_concurrent_probes: usize,
    /// How long a caller waits for a flight to settle.
    pub wait_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 6,
            wait_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&AppConfig> for ValidatorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrent_probes: config.probe.max_concurrent_probes,
            wait_timeout: config.cache.wait_timeout(),
        }
    }
}

/// Resolves image URLs to loaded/failed exactly once per loading episode.
///
/// Concurrent requests for the same URL share one probe. The probe runs in
/// its own task: a caller that stops observing (cancellation, timeout) does
/// not stop the probe, and its outcome is still recorded in the registry.
pub struct ImageValidator {
    registry: Arc<ImageRegistry>,
    probe: Arc<dyn ImageProbePort>,
    permits: Arc<Semaphore>,
    wait_timeout: Duration,
}

impl std::fmt::Debug for ImageValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageValidator")
            .field("registry", &self.registry)
            .field("permits_available", &self.permits.available_permits())
            .field("wait_timeout", &self.wait_timeout)
            .finish_non_exhaustive()
    }
}

impl ImageValidator {
    /// Creates a validator over a shared registry and probe.
    #[must_use]
    pub fn new(
        registry: Arc<ImageRegistry>,
        probe: Arc<dyn ImageProbePort>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            registry,
            probe,
            permits: Arc::new(Semaphore::new(config.max_concurrent_probes.max(1))),
            wait_timeout: config.wait_timeout,
        }
    }

    /// Returns the shared registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ImageRegistry> {
        &self.registry
    }

    /// Validates `url`, waiting for the outcome.
    pub async fn validate(&self, url: &str) -> ValidationOutcome {
        self.validate_with_cancel(url, &CancellationToken::new())
            .await
    }

    /// Validates `url` until the outcome is known or `cancel` fires.
    ///
    /// Cancellation only stops this caller from observing; a probe already
    /// dispatched runs to completion and records its outcome.
    pub async fn validate_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> ValidationOutcome {
        if cancel.is_cancelled() {
            return ValidationOutcome::Cancelled;
        }

        let (waiter, joined) = match self.registry.claim(url) {
            Claim::Cached(entry) => {
                trace!(url = %url, status = %entry.status, "Resolved from registry");
                return ValidationOutcome::from_status(entry.status, true);
            }
            Claim::InFlight(waiter) => {
                debug!(url = %url, "Waiting on in-flight probe");
                (waiter, true)
            }
            Claim::Leader(ticket) => {
                let waiter = ticket.watch();
                self.spawn_probe(ticket);
                (waiter, false)
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(url = %url, "Stopped observing image load");
                ValidationOutcome::Cancelled
            }
            settled = tokio::time::timeout(self.wait_timeout, waiter.settled()) => match settled {
                Ok(Some(status)) => ValidationOutcome::from_status(status, joined),
                Ok(None) => ValidationOutcome::Failed { from_cache: false },
                Err(_) => {
                    warn!(
                        url = %url,
                        timeout_secs = self.wait_timeout.as_secs(),
                        "Gave up waiting on image probe"
                    );
                    ValidationOutcome::Failed { from_cache: false }
                }
            },
        }
    }

    /// Drops the terminal entry and any stale in-flight mark for `url`.
    pub fn invalidate(&self, url: &str) -> bool {
        self.registry.delete(url)
    }

    fn spawn_probe(&self, ticket: FlightTicket) {
        let probe = Arc::clone(&self.probe);
        let permits = Arc::clone(&self.permits);

        tokio::spawn(async move {
            let status = match permits.acquire_owned().await {
                Ok(_permit) => match probe.probe(ticket.url()).await {
                    Ok(()) => {
                        debug!(url = %ticket.url(), "Image loaded");
                        CacheStatus::Loaded
                    }
                    Err(e) => {
                        warn!(
                            url = %ticket.url(),
                            error = %e,
                            network = e.is_network_error(),
                            transient = e.is_transient(),
                            "Image failed to load"
                        );
                        CacheStatus::Error
                    }
                },
                Err(e) => {
                    warn!(url = %ticket.url(), error = %e, "Probe permits closed");
                    CacheStatus::Error
                }
            };
            ticket.settle(status);
        });
    }
}
