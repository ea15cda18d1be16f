// ===================================================================================================
// MeshGuard - Circuit Breaker and Connection Liveness for a Microservice RPC Runtime
// ===================================================================================================
//
// This crate implements the two hardest pieces of an RPC client's resilience layer:
//
// - `breaker`: a multi-cause circuit breaker that decides, per outgoing request, whether and
//   where to dispatch given observed failure history, with load-spreading endpoint selection.
// - `liveness`: a per-peer connection liveness monitor driven by heartbeat round-trip
//   measurements, producing a Phi-style suspicion score and autonomously closing dead peers.
//
// Both assume a cooperative/async scheduling model and never perform their own network I/O;
// the liveness monitor consumes a `Transport` supplied by the host, and the breaker is pure
// computation over in-memory failure tallies guarded by a single mutex.
//
// Everything else a production RPC container needs — the broker integration, service discovery,
// wire serialization, and outer CLI — lives outside this crate; see SPEC_FULL.md §1/§6.
// ===================================================================================================

pub mod breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod liveness;
pub mod logging;
pub mod rng;
pub mod window;

pub use breaker::{Breaker, RatingAdjuster};
pub use config::{BreakerConfig, LivenessThresholds, RuntimeConfig};
pub use error::{BreakerError, ConfigError, MeshguardError, MeshguardResult, TransportError};
pub use liveness::{LivenessMessage, LivenessMonitor, LivenessStats, Status, Transport};
