/// Multi-Cause Circuit Breaker
///
/// Decides, per outgoing RPC, whether and where to dispatch given observed
/// failure history, and performs load-spreading endpoint selection among
/// comparable candidates. See SPEC_FULL.md §4.1 for the full algorithm and
/// rationale; this module implements it verbatim, including the documented
/// quirks (success on `(e, m)` resets the global tally; cleanup leaves the
/// global tally untouched; the post-selection endpoint check can trip after
/// a healthy-looking shortlist was already built).
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::BreakerConfig;
use crate::error::BreakerError;
use crate::rng::{RngSource, ThreadRngSource};

/// A single `(count, last_failure_time)` pair. `last_time` is `None` iff
/// `count == 0` — see the tally invariant in SPEC_FULL.md §3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Tally {
    count: u32,
    last_time_millis: Option<u64>,
}

impl Tally {
    fn record_failure(&mut self, now: u64) {
        self.count += 1;
        self.last_time_millis = Some(now);
    }

    fn reset(&mut self) {
        self.count = 0;
        self.last_time_millis = None;
    }

    /// `0` if the tally is absent or has aged out of the cooldown window,
    /// else the raw failure count.
    fn effective(&self, now: u64, cooldown_millis: u64) -> u32 {
        match self.last_time_millis {
            Some(t) if now.saturating_sub(t) < cooldown_millis => self.count,
            _ => 0,
        }
    }

    /// Whether this tally should be swept away by cleanup: no failure ever
    /// recorded, or the last one aged out past the (longer) cleanup window.
    fn expired(&self, now: u64, cleanup_interval_millis: u64) -> bool {
        match self.last_time_millis {
            Some(t) => now.saturating_sub(t) > cleanup_interval_millis,
            None => true,
        }
    }
}

fn effective_or_absent(tally: Option<&Tally>, now: u64, cooldown_millis: u64) -> u32 {
    tally.map(|t| t.effective(now, cooldown_millis)).unwrap_or(0)
}

/// Hook that biases endpoint ratings before the load-spread shortlist is
/// built. The seam where external signals (service-discovery weights,
/// region preference, ...) enter the selection path. Default is identity.
pub trait RatingAdjuster: Send + Sync {
    fn adjust(&self, ratings: HashMap<String, i64>) -> HashMap<String, i64>;
}

struct IdentityAdjuster;

impl RatingAdjuster for IdentityAdjuster {
    fn adjust(&self, ratings: HashMap<String, i64>) -> HashMap<String, i64> {
        ratings
    }
}

#[derive(Default)]
struct BreakerState {
    /// method -> registered endpoints. Unlike the tally maps below, this
    /// ledger is never pruned by cleanup: it is the durable record of what
    /// was registered, not evidence of failure that should age out.
    registered: HashMap<String, BTreeSet<String>>,
    global_fail: Tally,
    endpoint_fail: HashMap<String, Tally>,
    method_fail: HashMap<String, Tally>,
    method_instance_fail: HashMap<String, HashMap<String, Tally>>,
    last_cleanup_millis: u64,
}

impl BreakerState {
    fn cleanup(&mut self, now: u64, cleanup_interval_millis: u64) {
        let stale_endpoints: Vec<String> = self
            .endpoint_fail
            .iter()
            .filter(|(_, t)| t.expired(now, cleanup_interval_millis))
            .map(|(k, _)| k.clone())
            .collect();
        for e in stale_endpoints {
            self.endpoint_fail.remove(&e);
        }

        let stale_methods: Vec<String> = self
            .method_fail
            .iter()
            .filter(|(_, t)| t.expired(now, cleanup_interval_millis))
            .map(|(k, _)| k.clone())
            .collect();
        for m in stale_methods {
            self.method_fail.remove(&m);
        }

        let methods: Vec<String> = self.method_instance_fail.keys().cloned().collect();
        for m in methods {
            let stale_instances: Vec<String> = {
                let inner = self.method_instance_fail.get(&m).unwrap();
                inner
                    .iter()
                    .filter(|(_, t)| t.expired(now, cleanup_interval_millis))
                    .map(|(k, _)| k.clone())
                    .collect()
            };
            let inner = self.method_instance_fail.get_mut(&m).unwrap();
            for e in stale_instances {
                inner.remove(&e);
            }
            if self.method_instance_fail.get(&m).map_or(false, |i| i.is_empty()) {
                self.method_instance_fail.remove(&m);
            }
        }

        // Known quirk, preserved intentionally: global_fail is never swept.
        self.last_cleanup_millis = now;
    }
}

/// A multi-cause circuit breaker shared across request tasks.
///
/// State mutation is serialized behind a single blocking mutex (never held
/// across an `.await`, since `select_endpoint` is pure computation plus one
/// RNG draw — it never blocks, never performs I/O).
pub struct Breaker {
    state: Mutex<BreakerState>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RngSource>,
    rating_adjuster: Arc<dyn RatingAdjuster>,
}

impl Breaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
            clock: Arc::new(SystemClock::new()),
            rng: Arc::new(ThreadRngSource),
            rating_adjuster: Arc::new(IdentityAdjuster),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn RngSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_rating_adjuster(mut self, adjuster: Arc<dyn RatingAdjuster>) -> Self {
        self.rating_adjuster = adjuster;
        self
    }

    fn cooldown_millis(&self) -> u64 {
        self.config.cooldown().as_millis() as u64
    }

    fn cleanup_interval_millis(&self) -> u64 {
        self.config.cleanup_interval().as_millis() as u64
    }

    /// Ensure all four tallies exist for `(endpoint, method)`, at zero.
    /// Idempotent.
    pub fn register(&self, endpoint: &str, method: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .registered
            .entry(method.to_string())
            .or_default()
            .insert(endpoint.to_string());
        state
            .endpoint_fail
            .entry(endpoint.to_string())
            .or_default();
        state.method_fail.entry(method.to_string()).or_default();
        state
            .method_instance_fail
            .entry(method.to_string())
            .or_default()
            .entry(endpoint.to_string())
            .or_default();
    }

    /// Record a failure, incrementing every tally that covers this
    /// observation and refreshing its `last_time` to now.
    pub fn observe_failure(&self, endpoint: &str, method: &str) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap();
        state.global_fail.record_failure(now);
        state
            .endpoint_fail
            .entry(endpoint.to_string())
            .or_default()
            .record_failure(now);
        state
            .method_fail
            .entry(method.to_string())
            .or_default()
            .record_failure(now);
        state
            .method_instance_fail
            .entry(method.to_string())
            .or_default()
            .entry(endpoint.to_string())
            .or_default()
            .record_failure(now);
    }

    /// Record a success, resetting every tally that covers this observation
    /// to `(0, unset)` — including the global tally. See SPEC_FULL.md's
    /// preserved Open Question: a success anywhere is treated as evidence
    /// that "everything is broken" (cause 1) is false.
    pub fn observe_success(&self, endpoint: &str, method: &str) {
        let mut state = self.state.lock().unwrap();
        state.global_fail.reset();
        if let Some(t) = state.endpoint_fail.get_mut(endpoint) {
            t.reset();
        }
        if let Some(t) = state.method_fail.get_mut(method) {
            t.reset();
        }
        if let Some(inner) = state.method_instance_fail.get_mut(method) {
            if let Some(t) = inner.get_mut(endpoint) {
                t.reset();
            }
        }
    }

    /// Produce an endpoint to dispatch `method` to, or fail with
    /// `BreakerError::CircuitBreakerOpen` / `BreakerError::NotConnected`.
    /// See SPEC_FULL.md §4.1 for the precise, order-sensitive algorithm.
    pub fn select_endpoint(
        &self,
        method: &str,
        candidates: Option<&HashSet<String>>,
    ) -> Result<String, BreakerError> {
        let cooldown_millis = self.cooldown_millis();
        let cleanup_interval_millis = self.cleanup_interval_millis();
        let mut state = self.state.lock().unwrap();
        let now = self.clock.now_millis();

        if now.saturating_sub(state.last_cleanup_millis) > cleanup_interval_millis {
            debug!(target: "meshguard::breaker", "running cleanup sweep");
            state.cleanup(now, cleanup_interval_millis);
        }

        if state.global_fail.effective(now, cooldown_millis) > self.config.max_errors_before_open {
            warn!(target: "meshguard::breaker", tier = "global", "circuit breaker open");
            return Err(BreakerError::global());
        }

        if !state
            .registered
            .get(method)
            .map_or(false, |endpoints| !endpoints.is_empty())
        {
            return Err(BreakerError::not_connected(method));
        }

        if effective_or_absent(state.method_fail.get(method), now, cooldown_millis)
            > self.config.max_errors_before_open
        {
            warn!(target: "meshguard::breaker", tier = "method", method, "circuit breaker open");
            return Err(BreakerError::method(method));
        }

        let candidate_set: BTreeSet<String> = match candidates {
            Some(c) if !c.is_empty() => c.iter().cloned().collect(),
            _ => state
                .registered
                .get(method)
                .cloned()
                .unwrap_or_default(),
        };

        let empty_instances: HashMap<String, Tally> = HashMap::new();
        let instance_map = state
            .method_instance_fail
            .get(method)
            .unwrap_or(&empty_instances);

        let mut ratings: HashMap<String, i64> = HashMap::new();
        for endpoint in &candidate_set {
            let endpoint_rating = effective_or_absent(state.endpoint_fail.get(endpoint), now, cooldown_millis);
            let instance_rating = effective_or_absent(instance_map.get(endpoint), now, cooldown_millis);
            ratings.insert(endpoint.clone(), endpoint_rating.max(instance_rating) as i64);
        }

        let ratings = self.rating_adjuster.adjust(ratings);
        if ratings.is_empty() {
            return Err(BreakerError::not_connected(method));
        }

        let mut sorted: Vec<(String, i64)> = ratings.into_iter().collect();
        sorted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let n = sorted.len();
        let keep = 1 + (n - 1) / self.config.overprovisioning_factor;
        let shortlist = &sorted[..keep.min(n)];

        let idx = self.rng.pick_index(shortlist.len());
        let chosen = shortlist[idx].0.clone();
        trace!(target: "meshguard::breaker", method, chosen = %chosen, shortlist = shortlist.len(), "selected endpoint");

        if effective_or_absent(state.endpoint_fail.get(&chosen), now, cooldown_millis)
            > self.config.max_errors_before_open
        {
            warn!(target: "meshguard::breaker", tier = "endpoint", endpoint = %chosen, "circuit breaker open");
            return Err(BreakerError::endpoint(&chosen));
        }
        if effective_or_absent(instance_map.get(&chosen), now, cooldown_millis)
            > self.config.max_errors_before_open
        {
            warn!(target: "meshguard::breaker", tier = "method-instance", endpoint = %chosen, method, "circuit breaker open");
            return Err(BreakerError::method_instance(&chosen, method));
        }

        Ok(chosen)
    }
}
