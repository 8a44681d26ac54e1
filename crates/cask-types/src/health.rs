use serde::{Deserialize, Serialize};

/// Point-in-time health snapshot of a backend connection.
///
/// The snapshot is written by whatever external checker polls the backend
/// and read by callers; before the first check it is the zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Whether the last check succeeded.
    pub healthy: bool,
    /// Backend-defined load indicator (in-flight requests, queue depth, ...).
    pub workload: u64,
    /// Unix time of the last check in milliseconds, if any check has run.
    pub checked_at_ms: Option<u64>,
    /// Free-form detail from the last check.
    pub message: Option<String>,
}

impl Health {
    /// A passing snapshot stamped at `checked_at_ms`.
    pub fn healthy(workload: u64, checked_at_ms: u64) -> Self {
        Self {
            healthy: true,
            workload,
            checked_at_ms: Some(checked_at_ms),
            message: None,
        }
    }

    /// A failing snapshot stamped at `checked_at_ms`.
    pub fn unhealthy(message: impl Into<String>, checked_at_ms: u64) -> Self {
        Self {
            healthy: false,
            workload: 0,
            checked_at_ms: Some(checked_at_ms),
            message: Some(message.into()),
        }
    }

    /// Returns `true` if no check has been recorded yet.
    pub fn is_unchecked(&self) -> bool {
        self.checked_at_ms.is_none()
    }
}
