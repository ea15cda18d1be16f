// ===================================================================================================
// Error Handling - Breaker, Configuration, and Crate-Wide Error Types
// ===================================================================================================
//
// Mirrors the layered-error convention used throughout this codebase: each
// component that can fail gets its own focused error enum, and a single
// umbrella `MeshguardError` lets host code convert any of them with `?`
// without losing the original variant via `From` impls.
// ===================================================================================================

/// Errors raised by `breaker::Breaker::select_endpoint`.
///
/// `CircuitBreakerOpen` is non-retryable at this layer: the caller decides
/// whether to fall back, queue, or fail upward. `NotConnected` means "no
/// configuration" (unregistered method, or candidates filtered to empty),
/// which is semantically distinct from "too many failures".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BreakerError {
    /// Reason is one of `"global"`, `"method:<m>"`, `"endpoint:<e>"`,
    /// `"method-instance:(<e>,<m>)"`.
    #[error("circuit breaker open: {0}")]
    CircuitBreakerOpen(String),

    #[error("not connected: {0}")]
    NotConnected(String),
}

impl BreakerError {
    pub fn global() -> Self {
        BreakerError::CircuitBreakerOpen("global".to_string())
    }

    pub fn method(method: &str) -> Self {
        BreakerError::CircuitBreakerOpen(format!("method:{}", method))
    }

    pub fn endpoint(endpoint: &str) -> Self {
        BreakerError::CircuitBreakerOpen(format!("endpoint:{}", endpoint))
    }

    pub fn method_instance(endpoint: &str, method: &str) -> Self {
        BreakerError::CircuitBreakerOpen(format!("method-instance:({},{})", endpoint, method))
    }

    pub fn not_connected(method: &str) -> Self {
        BreakerError::NotConnected(format!("no registered endpoints for method '{}'", method))
    }
}

/// Errors raised by `config::RuntimeConfig::load` and friends.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration value: {0}")]
    Validation(String),
}

/// Errors surfaced by the liveness monitor's transport seam. These never
/// escape `LivenessMonitor` itself (ping failures are swallowed, disconnect
/// errors are logged), but the transport trait needs a concrete error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("ping to {0} timed out")]
    Timeout(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Crate-wide umbrella error for host code that wants a single `Result`
/// type across both subsystems.
#[derive(Debug, thiserror::Error)]
pub enum MeshguardError {
    #[error(transparent)]
    Breaker(#[from] BreakerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type MeshguardResult<T> = Result<T, MeshguardError>;
