//! Per-client sliding-window admission control.
//!
//! Every inbound action passes through [`AdmissionController::check`]
//! before any business logic runs. Each [`ClientKey`] owns an ordered
//! list of admission instants; on every call the instants at or before
//! `now - window` are dropped, and the action is admitted only if fewer
//! than `limit` remain. Denials are not recorded.
//!
//! # Locking
//!
//! The table sits behind an `RwLock` and each client's window behind its
//! own `Mutex`. A call takes the table read lock only long enough to
//! clone the window handle, then locks that window alone, so different
//! clients never contend. The write lock is taken only to insert a new
//! client or to evict.
//!
//! # Eviction
//!
//! Only *expired* clients are ever evicted: clients with no admission
//! left inside the longest window they were checked against. Dropping a
//! live window would reset its budget.
//!
//! - Expired clients idle for `idle_ttl` are swept lazily, at most once
//!   per `sweep_interval`, by whichever call notices the interval elapsed.
//! - `max_clients` is a soft cap. Inserting at the cap prunes every
//!   expired client in one pass. If the table is still full, it grows
//!   past the cap, and the next prune waits until it has doubled, so
//!   the scan stays amortized O(1) per insert. Memory is then bounded by
//!   the number of clients active within one window.
//!
//! Evicted windows are flagged `retired`; a caller that raced with the
//! eviction and still holds the old handle looks the key up again.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use socialnet_types::config::AppConfig;
use socialnet_types::{ClientKey, Result, SocialnetError};

// ---------------------------------------------------------------------------
// AdmissionConfig
// ---------------------------------------------------------------------------

/// Admission limits and table eviction policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Admissions allowed per window.
    pub limit: u32,
    /// Sliding window length.
    pub window: Duration,
    /// Inactivity after which a client is dropped from the table.
    pub idle_ttl: Duration,
    /// Minimum time between idle sweeps.
    pub sweep_interval: Duration,
    /// Table size at which expired clients are pruned on insert.
    pub max_clients: usize,
}

impl From<&AppConfig> for AdmissionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            limit: config.rate_limit_count,
            window: config.rate_limit_window,
            idle_ttl: config.rate_limit_idle_ttl,
            sweep_interval: config.rate_limit_window,
            max_clients: config.rate_limit_max_clients,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of one admission attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// The action was admitted and recorded.
    Allowed,
    /// The client is over its limit. Nothing was recorded.
    RateLimited {
        /// Time until the oldest recorded admission leaves the window.
        retry_after: Duration,
    },
}

impl Decision {
    /// Returns `true` for [`Decision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// ---------------------------------------------------------------------------
// ClientWindow
// ---------------------------------------------------------------------------

struct ClientWindow {
    /// Admission instants, oldest first.
    stamps: VecDeque<Instant>,
    /// Last call for this client, admitted or not.
    last_seen: Instant,
    /// Longest window this client has been checked against.
    window: Duration,
    /// Set once the window has been evicted from the table.
    retired: bool,
}

impl ClientWindow {
    fn new(now: Instant) -> Self {
        Self {
            stamps: VecDeque::new(),
            last_seen: now,
            window: Duration::ZERO,
            retired: false,
        }
    }

    /// No recorded admission can still count against the client.
    fn is_expired(&self, now: Instant) -> bool {
        match self.stamps.back() {
            None => true,
            Some(newest) => newest
                .checked_add(self.window)
                .is_some_and(|expiry| expiry <= now),
        }
    }

    fn admit(&mut self, limit: u32, window: Duration, now: Instant) -> Decision {
        self.last_seen = now;
        self.window = self.window.max(window);

        // A window reaching back before the clock origin expires nothing.
        if let Some(window_start) = now.checked_sub(window) {
            while self.stamps.front().is_some_and(|t| *t <= window_start) {
                self.stamps.pop_front();
            }
        }

        if self.stamps.len() >= limit as usize {
            let retry_after = self
                .stamps
                .front()
                .and_then(|oldest| oldest.checked_add(window))
                .map(|expiry| expiry.saturating_duration_since(now))
                .unwrap_or(window);
            return Decision::RateLimited { retry_after };
        }

        self.stamps.push_back(now);
        Decision::Allowed
    }
}

type Slot = Arc<Mutex<ClientWindow>>;

// ---------------------------------------------------------------------------
// AdmissionController
// ---------------------------------------------------------------------------

/// Thread-safe sliding-window rate limiter keyed by [`ClientKey`].
///
/// Purely in memory; all state is lost on restart.
pub struct AdmissionController {
    config: AdmissionConfig,
    table: RwLock<HashMap<ClientKey, Slot>>,
    last_sweep: Mutex<Instant>,
    /// Table size that triggers the next prune on insert. Written under
    /// the table write lock.
    prune_at: AtomicUsize,
}

impl AdmissionController {
    /// Creates a controller with an empty table.
    pub fn new(config: AdmissionConfig) -> Self {
        let prune_at = config.max_clients.max(1);
        Self {
            config,
            table: RwLock::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
            prune_at: AtomicUsize::new(prune_at),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Admits one action for `key` under the configured limit.
    ///
    /// # Errors
    ///
    /// [`SocialnetError::RateLimited`] when the client is over its limit.
    pub fn check(&self, key: &ClientKey) -> Result<()> {
        match self.admit(key, self.config.limit, self.config.window)? {
            Decision::Allowed => Ok(()),
            Decision::RateLimited { retry_after } => {
                tracing::debug!(client = %key, ?retry_after, "admission denied");
                Err(SocialnetError::RateLimited { retry_after })
            }
        }
    }

    /// Admits one action for `key` with an explicit limit and window.
    pub fn admit(&self, key: &ClientKey, limit: u32, window: Duration) -> Result<Decision> {
        self.admit_at(key, limit, window, Instant::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit clock reading.
    ///
    /// Calls for one key must use non-decreasing `now` values.
    pub fn admit_at(
        &self,
        key: &ClientKey,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> Result<Decision> {
        self.maybe_sweep(now)?;

        loop {
            let slot = self.slot_for(key, now)?;
            let mut client = slot.lock().map_err(|_| poisoned("client window"))?;
            if client.retired {
                continue;
            }
            return Ok(client.admit(limit, window, now));
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.table.read().map(|table| table.len()).unwrap_or(0)
    }

    /// Returns the window handle for `key`, inserting one if needed.
    fn slot_for(&self, key: &ClientKey, now: Instant) -> Result<Slot> {
        {
            let table = self.table.read().map_err(|_| poisoned("admission table"))?;
            if let Some(slot) = table.get(key) {
                return Ok(Arc::clone(slot));
            }
        }

        let mut table = self.table.write().map_err(|_| poisoned("admission table"))?;
        if let Some(slot) = table.get(key) {
            return Ok(Arc::clone(slot));
        }

        if table.len() >= self.prune_at.load(Ordering::Relaxed) {
            let pruned = prune_expired(&mut table, |_| true, now);
            let next = if table.len() < self.config.max_clients {
                self.config.max_clients
            } else {
                table.len().saturating_mul(2)
            };
            self.prune_at.store(next.max(1), Ordering::Relaxed);
            if table.len() >= self.config.max_clients {
                tracing::warn!(
                    pruned,
                    tracked = table.len(),
                    cap = self.config.max_clients,
                    "admission table over capacity, all clients live"
                );
            } else {
                tracing::debug!(pruned, remaining = table.len(), "admission table pruned");
            }
        }

        let slot = Arc::new(Mutex::new(ClientWindow::new(now)));
        table.insert(key.clone(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Drops idle clients if a sweep is due.
    fn maybe_sweep(&self, now: Instant) -> Result<()> {
        {
            let mut last = self
                .last_sweep
                .lock()
                .map_err(|_| poisoned("admission sweep clock"))?;
            if now.saturating_duration_since(*last) < self.config.sweep_interval {
                return Ok(());
            }
            *last = now;
        }

        let idle_ttl = self.config.idle_ttl;
        let mut table = self.table.write().map_err(|_| poisoned("admission table"))?;
        let swept = prune_expired(
            &mut table,
            |client| now.saturating_duration_since(client.last_seen) >= idle_ttl,
            now,
        );
        if table.len() < self.config.max_clients {
            self.prune_at
                .store(self.config.max_clients.max(1), Ordering::Relaxed);
        }

        if swept > 0 {
            tracing::debug!(swept, remaining = table.len(), "idle admission clients swept");
        }
        Ok(())
    }
}

/// Removes every expired client matching `also`. Returns how many went.
///
/// A poisoned window is dropped too; nothing can admit through it.
fn prune_expired<F>(table: &mut HashMap<ClientKey, Slot>, also: F, now: Instant) -> usize
where
    F: Fn(&ClientWindow) -> bool,
{
    let before = table.len();
    table.retain(|_, slot| match slot.lock() {
        Ok(mut client) => {
            let evict = client.is_expired(now) && also(&*client);
            if evict {
                client.retired = true;
            }
            !evict
        }
        Err(_) => false,
    });
    before - table.len()
}

fn poisoned(what: &str) -> SocialnetError {
    SocialnetError::Internal {
        reason: format!("{what} lock poisoned"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
