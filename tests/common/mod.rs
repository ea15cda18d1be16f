/// Shared test doubles for the liveness integration scenarios.
use async_trait::async_trait;
use meshguard::{LivenessMessage, Transport, TransportError};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

pub struct AppMessage;
impl LivenessMessage for AppMessage {
    fn is_idle_chatter(&self) -> bool {
        false
    }
}

pub struct IdleChatterMessage;
impl LivenessMessage for IdleChatterMessage {
    fn is_idle_chatter(&self) -> bool {
        true
    }
}

/// Transport double whose ping either always succeeds or always fails,
/// and which records how many times disconnect was invoked.
pub struct MockTransport {
    pub ping_succeeds: bool,
    pub disconnect_calls: AtomicU32,
    pub ping_calls: AtomicU64,
}

impl MockTransport {
    pub fn responsive() -> Arc<Self> {
        Arc::new(Self {
            ping_succeeds: true,
            disconnect_calls: AtomicU32::new(0),
            ping_calls: AtomicU64::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            ping_succeeds: false,
            disconnect_calls: AtomicU32::new(0),
            ping_calls: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn ping(&self, _endpoint: &str) -> Result<(), TransportError> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        if self.ping_succeeds {
            Ok(())
        } else {
            Err(TransportError::Other("peer unreachable".to_string()))
        }
    }

    async fn disconnect(&self, _endpoint: &str) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
