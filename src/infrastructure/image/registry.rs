//! Process-wide image registry: terminal statuses plus in-flight probes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::domain::entities::{CacheEntry, CacheStatus};

/// Shared registry of image URL statuses.
///
/// Holds two maps keyed by URL: terminal entries (`loaded` / `error`) and
/// probes currently in flight. A URL is never in both while a probe is
/// outstanding. Entries live until [`ImageRegistry::delete`] or
/// [`ImageRegistry::clear`]; there is no TTL and no eviction.
///
/// Construct one at startup and share it behind an `Arc`.
#[derive(Default)]
pub struct ImageRegistry {
    state: Mutex<RegistryState>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, Flight>,
    next_episode: u64,
}

struct Flight {
    episode: u64,
    rx: watch::Receiver<Option<CacheStatus>>,
}

/// Result of [`ImageRegistry::claim`].
pub enum Claim {
    /// The URL already has a terminal entry.
    Cached(CacheEntry),
    /// Another caller is probing the URL; wait on the receiver.
    InFlight(FlightWatch),
    /// The caller now owns the probe for this URL.
    Leader(FlightTicket),
}

impl std::fmt::Debug for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached(entry) => f.debug_tuple("Cached").field(entry).finish(),
            Self::InFlight(_) => f.write_str("InFlight"),
            Self::Leader(ticket) => f.debug_tuple("Leader").field(&ticket.url).finish(),
        }
    }
}

/// Subscription to the settlement of an in-flight probe.
pub struct FlightWatch {
    rx: watch::Receiver<Option<CacheStatus>>,
}

impl FlightWatch {
    /// Waits until the flight settles.
    ///
    /// Returns `None` if the flight was abandoned without an outcome.
    pub async fn settled(mut self) -> Option<CacheStatus> {
        match self.rx.wait_for(Option::is_some).await {
            Ok(status) => *status,
            Err(_) => None,
        }
    }
}

/// Ownership of one loading episode for a URL.
///
/// Settling the ticket records the terminal status, clears the in-flight mark
/// and wakes every waiter. Dropping an unsettled ticket settles it as
/// [`CacheStatus::Error`] so waiters are never stranded.
pub struct FlightTicket {
    registry: Arc<ImageRegistry>,
    url: String,
    episode: u64,
    tx: Option<watch::Sender<Option<CacheStatus>>>,
}

impl FlightTicket {
    /// Returns the URL this ticket owns.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribes to this ticket's settlement.
    #[must_use]
    pub fn watch(&self) -> FlightWatch {
        let rx = self.tx.as_ref().map_or_else(
            || watch::channel(Some(CacheStatus::Error)).1,
            watch::Sender::subscribe,
        );
        FlightWatch { rx }
    }

    /// Records the outcome of the probe.
    pub fn settle(mut self, status: CacheStatus) {
        self.finish(status);
    }

    fn finish(&mut self, status: CacheStatus) {
        if let Some(tx) = self.tx.take() {
            self.registry.mark_settled(&self.url, self.episode, status);
            tx.send_replace(Some(status));
        }
    }
}

impl Drop for FlightTicket {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(url = %self.url, "Flight abandoned without outcome");
            self.finish(CacheStatus::Error);
        }
    }
}

impl ImageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the terminal entry for `url`, if any.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let entry = self.state.lock().entries.get(url).copied();
        if entry.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Registry hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Registry miss");
        }
        entry
    }

    /// Records a terminal status for `url`, overwriting any prior entry.
    pub fn set(&self, url: &str, status: CacheStatus) {
        self.state
            .lock()
            .entries
            .insert(url.to_string(), CacheEntry::now(status));
        debug!(url = %url, status = %status, "Recorded image status");
    }

    /// Removes the terminal entry and any in-flight mark for `url`.
    ///
    /// A probe still running for the removed flight settles into the void:
    /// its waiters are woken but the registry is left untouched.
    pub fn delete(&self, url: &str) -> bool {
        let mut state = self.state.lock();
        let had_entry = state.entries.remove(url).is_some();
        let had_flight = state.in_flight.remove(url).is_some();
        if had_entry || had_flight {
            debug!(url = %url, had_entry, had_flight, "Invalidated image");
        }
        had_entry || had_flight
    }

    /// Atomically resolves how the caller should obtain a status for `url`.
    ///
    /// Exactly one concurrent caller per loading episode receives
    /// [`Claim::Leader`]; the rest either read the terminal entry or wait on
    /// the leader's flight.
    pub fn claim(self: &Arc<Self>, url: &str) -> Claim {
        let mut state = self.state.lock();

        if let Some(entry) = state.entries.get(url).copied() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, status = %entry.status, "Registry hit");
            return Claim::Cached(entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        if let Some(flight) = state.in_flight.get(url) {
            trace!(url = %url, episode = flight.episode, "Joining in-flight probe");
            return Claim::InFlight(FlightWatch {
                rx: flight.rx.clone(),
            });
        }

        state.next_episode += 1;
        let episode = state.next_episode;
        let (tx, rx) = watch::channel(None);
        state
            .in_flight
            .insert(url.to_string(), Flight { episode, rx });
        trace!(url = %url, episode, "Marked image loading");

        Claim::Leader(FlightTicket {
            registry: Arc::clone(self),
            url: url.to_string(),
            episode,
            tx: Some(tx),
        })
    }

    /// Marks `url` as loading if it is neither cached nor already in flight.
    ///
    /// Returns the ticket to settle, or `None` when someone else owns the URL.
    pub fn mark_loading(self: &Arc<Self>, url: &str) -> Option<FlightTicket> {
        match self.claim(url) {
            Claim::Leader(ticket) => Some(ticket),
            Claim::Cached(_) | Claim::InFlight(_) => None,
        }
    }

    fn mark_settled(&self, url: &str, episode: u64, status: CacheStatus) {
        let mut state = self.state.lock();
        let current = state
            .in_flight
            .get(url)
            .is_some_and(|flight| flight.episode == episode);

        if current {
            state.in_flight.remove(url);
            state
                .entries
                .insert(url.to_string(), CacheEntry::now(status));
            debug!(url = %url, status = %status, "Image settled");
        } else {
            debug!(url = %url, episode, "Discarding outcome of invalidated flight");
        }
    }

    /// Returns true if a probe for `url` is in flight.
    pub fn is_loading(&self, url: &str) -> bool {
        self.state.lock().in_flight.contains_key(url)
    }

    /// Returns the number of terminal entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if there are no terminal entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of probes in flight.
    pub fn loading_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Wipes every terminal entry and in-flight mark.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let entries = state.entries.len();
        let in_flight = state.in_flight.len();
        state.entries.clear();
        state.in_flight.clear();
        debug!(entries, in_flight, "Cleared image registry");
    }

    /// Returns registry statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> RegistryStats {
        let (cache_size, loading_images, loaded, failed) = {
            let state = self.state.lock();
            let count = |wanted: fn(CacheStatus) -> bool| {
                state
                    .entries
                    .values()
                    .filter(|entry| wanted(entry.status))
                    .count()
            };
            let (loaded, failed) = (count(CacheStatus::is_loaded), count(CacheStatus::is_error));
            (state.entries.len(), state.in_flight.len(), loaded, failed)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        RegistryStats {
            cache_size,
            loading_images,
            loaded,
            failed,
            hits,
            misses,
            hit_rate,
        }
    }
}

impl std::fmt::Debug for ImageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ImageRegistry")
            .field("cache_size", &stats.cache_size)
            .field("loading_images", &stats.loading_images)
            .finish_non_exhaustive()
    }
}

/// Statistics about the registry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegistryStats {
    /// Number of terminal entries.
    pub cache_size: usize,
    /// Number of probes in flight.
    pub loading_images: usize,
    /// Terminal entries with status `loaded`.
    pub loaded: usize,
    /// Terminal entries with status `error`.
    pub failed: usize,
    /// Number of lookups answered from a terminal entry.
    pub hits: u64,
    /// Number of lookups without a terminal entry.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Registry: {} urls ({} loaded, {} failed), {} loading, {:.1}% hit rate",
            self.cache_size, self.loaded, self.failed, self.loading_images, self.hit_rate
        )
    }
}
