/// Connection Liveness Monitor
///
/// Maintains a per-peer state machine driven by heartbeat round-trip
/// measurements, producing a Phi-style suspicion score and autonomously
/// closing unresponsive or idle peers. See SPEC_FULL.md §4.2 for the exact
/// transition table this module implements.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::LivenessThresholds;
use crate::error::TransportError;
use crate::window::SampleWindow;

/// Liveness classification of a peer connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown,
    Responsive,
    Unresponsive,
    Idle,
    Closed,
}

/// Transport-layer keepalive/control frames implement this to exclude
/// themselves from "application activity" bookkeeping.
pub trait LivenessMessage {
    fn is_idle_chatter(&self) -> bool;
}

/// What the liveness monitor needs from the surrounding transport. Neither
/// method performs retries; both are expected to have their own timeouts
/// where applicable.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn ping(&self, endpoint: &str) -> Result<(), TransportError>;
    async fn disconnect(&self, endpoint: &str) -> Result<(), TransportError>;
}

/// Snapshot returned by `LivenessMonitor::stats`.
#[derive(Debug, Clone)]
pub struct LivenessStats {
    pub endpoint: String,
    pub rtt_mean_ms: f64,
    pub rtt_stddev_ms: f64,
    pub phi: f64,
    pub status: Status,
    pub sent: u64,
    pub received: u64,
}

struct LivenessState {
    status: Status,
    last_seen_millis: Option<u64>,
    last_message_millis: Option<u64>,
    last_status_change_millis: u64,
    received_message_count: u64,
    sent_message_count: u64,
    explicit_heartbeat_count: u64,
}

/// Per-connection liveness state machine. Construct via `spawn`, which
/// starts the ping loop and the status loop immediately; both run until
/// `close()` is called (directly, or autonomously by the status loop).
pub struct LivenessMonitor {
    endpoint: String,
    thresholds: LivenessThresholds,
    created_at_millis: u64,
    state: Mutex<LivenessState>,
    window: Mutex<SampleWindow>,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
    handles: Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl LivenessMonitor {
    pub fn spawn(
        transport: Arc<dyn Transport>,
        endpoint: String,
        thresholds: LivenessThresholds,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let now = clock.now_millis();
        let monitor = Arc::new(Self {
            endpoint,
            thresholds,
            created_at_millis: now,
            state: Mutex::new(LivenessState {
                status: Status::Unknown,
                last_seen_millis: None,
                last_message_millis: None,
                last_status_change_millis: now,
                received_message_count: 0,
                sent_message_count: 0,
                explicit_heartbeat_count: 0,
            }),
            window: Mutex::new(SampleWindow::new()),
            clock,
            transport,
            handles: Mutex::new(None),
        });

        let heartbeat_handle = tokio::spawn(Self::heartbeat_loop(monitor.clone()));
        let status_handle = tokio::spawn(Self::status_loop(monitor.clone()));
        *monitor.handles.lock().unwrap() = Some((heartbeat_handle, status_handle));
        monitor
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_closed(&self) -> bool {
        self.state.lock().unwrap().status == Status::Closed
    }

    /// Wait for both the ping loop and the status loop to exit. Intended
    /// for tests and graceful-shutdown paths; a second call is a no-op.
    pub async fn join(&self) {
        let handles = self.handles.lock().unwrap().take();
        if let Some((heartbeat, status)) = handles {
            let _ = heartbeat.await;
            let _ = status.await;
        }
    }

    async fn heartbeat_loop(self_: Arc<Self>) {
        let interval = self_.thresholds.heartbeat_interval();
        loop {
            if self_.is_closed() {
                break;
            }

            let start = self_.clock.now_millis();
            let ping_outcome =
                tokio::time::timeout(interval, self_.transport.ping(&self_.endpoint)).await;

            if self_.is_closed() {
                break;
            }

            match ping_outcome {
                Ok(Ok(())) => {
                    let elapsed = self_.clock.now_millis().saturating_sub(start);
                    self_.window.lock().unwrap().record(Duration::from_millis(elapsed));
                    self_.state.lock().unwrap().explicit_heartbeat_count += 1;
                }
                Ok(Err(e)) => {
                    debug!(target: "meshguard::liveness", endpoint = %self_.endpoint, error = %e, "heartbeat ping failed, swallowing");
                }
                Err(_) => {
                    debug!(target: "meshguard::liveness", endpoint = %self_.endpoint, "heartbeat ping timed out, swallowing");
                }
            }

            tokio::time::sleep(interval).await;
        }
    }

    async fn status_loop(self_: Arc<Self>) {
        loop {
            if self_.is_closed() {
                break;
            }

            self_.tick_status().await;

            tokio::time::sleep(self_.thresholds.timeout()).await;
        }
    }

    async fn tick_status(&self) {
        enum Action {
            None,
            Close,
        }

        let action = {
            let mut state = self.state.lock().unwrap();
            let Some(last_seen) = state.last_seen_millis else {
                return;
            };
            let now = self.clock.now_millis();
            let last_message = state.last_message_millis.unwrap_or(self.created_at_millis);

            {
                let window = self.window.lock().unwrap();
                let phi = window.phi(now.saturating_sub(last_seen) as f64);
                trace!(
                    target: "meshguard::liveness",
                    endpoint = %self.endpoint,
                    mean_ms = window.mean(),
                    stddev_ms = window.stddev(),
                    total_mean_ms = window.total_mean(),
                    phi,
                    "liveness tick stats",
                );
            }

            if state.status == Status::Unresponsive
                && now.saturating_sub(state.last_status_change_millis)
                    >= self.thresholds.unresponsive_disconnect().as_millis() as u64
            {
                Action::Close
            } else if now.saturating_sub(last_seen) >= self.thresholds.timeout().as_millis() as u64
            {
                self.set_status_locked(&mut state, Status::Unresponsive, now);
                Action::None
            } else if state.status == Status::Idle
                && now.saturating_sub(state.last_status_change_millis)
                    >= self.thresholds.idle_disconnect().as_millis() as u64
            {
                Action::Close
            } else if now.saturating_sub(last_message)
                >= self.thresholds.idle_timeout().as_millis() as u64
            {
                self.set_status_locked(&mut state, Status::Idle, now);
                Action::None
            } else {
                self.set_status_locked(&mut state, Status::Responsive, now);
                Action::None
            }
        };

        if matches!(action, Action::Close) {
            self.close().await;
        }
    }

    fn set_status_locked(&self, state: &mut LivenessState, new_status: Status, now: u64) {
        if state.status != new_status {
            info!(
                target: "meshguard::liveness",
                endpoint = %self.endpoint,
                from = ?state.status,
                to = ?new_status,
                "liveness status changed"
            );
            state.status = new_status;
            state.last_status_change_millis = now;
        }
    }

    /// Called by the transport when any frame arrives.
    pub fn on_recv(&self, msg: &dyn LivenessMessage) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap();
        state.last_seen_millis = Some(now);
        if !msg.is_idle_chatter() {
            state.last_message_millis = Some(now);
        }
        state.received_message_count += 1;
    }

    /// Called before a frame is transmitted.
    pub fn on_send(&self, msg: &dyn LivenessMessage) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock().unwrap();
        if !msg.is_idle_chatter() {
            state.last_message_millis = Some(now);
        }
        state.sent_message_count += 1;
    }

    /// Idempotent. Transitions to `Closed` and requests transport
    /// disconnect; never fails, even if the transport does.
    pub async fn close(&self) {
        let already_closed = {
            let mut state = self.state.lock().unwrap();
            if state.status == Status::Closed {
                true
            } else {
                let now = self.clock.now_millis();
                state.status = Status::Closed;
                state.last_status_change_millis = now;
                info!(target: "meshguard::liveness", endpoint = %self.endpoint, "closing connection");
                false
            }
        };
        if already_closed {
            return;
        }

        if let Err(e) = self.transport.disconnect(&self.endpoint).await {
            warn!(target: "meshguard::liveness", endpoint = %self.endpoint, error = %e, "transport disconnect failed during close");
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(
            self.state.lock().unwrap().status,
            Status::Responsive | Status::Idle
        )
    }

    pub fn status(&self) -> Status {
        self.state.lock().unwrap().status
    }

    pub fn stats(&self) -> LivenessStats {
        let state = self.state.lock().unwrap();
        let window = self.window.lock().unwrap();
        let now = self.clock.now_millis();
        let phi = match state.last_seen_millis {
            Some(last_seen) => window.phi(now.saturating_sub(last_seen) as f64),
            None => 0.0,
        };
        LivenessStats {
            endpoint: self.endpoint.clone(),
            rtt_mean_ms: window.mean(),
            rtt_stddev_ms: window.stddev(),
            phi,
            status: state.status,
            sent: state.sent_message_count,
            received: state.received_message_count,
        }
    }

    pub fn explicit_heartbeat_count(&self) -> u64 {
        self.state.lock().unwrap().explicit_heartbeat_count
    }
}
