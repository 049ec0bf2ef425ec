//! Observability hook for failed dispatches.

use std::sync::{Mutex, PoisonError};

use crate::error::BusError;

/// A message whose dispatch failed. The message is not redelivered.
#[derive(Debug)]
pub struct DispatchFailure {
    pub event_type: String,
    pub error: BusError,
}

/// Receives dispatch failures from consumer loops.
///
/// Called on the consumer's task; keep it quick.
pub trait DispatchObserver: Send + Sync + 'static {
    fn on_failure(&self, failure: &DispatchFailure);
}

/// Logs failures through `tracing`. The bus default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn on_failure(&self, failure: &DispatchFailure) {
        tracing::warn!(
            event_type = %failure.event_type,
            error = %failure.error,
            "dispatch failed, message dropped"
        );
    }
}

/// Keeps failures in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    failures: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    /// Event types of the recorded failures, in order.
    pub fn failures(&self) -> Vec<String> {
        self.lock().iter().map(|(ty, _)| ty.clone()).collect()
    }

    /// Rendered errors of the recorded failures, in order.
    pub fn errors(&self) -> Vec<String> {
        self.lock().iter().map(|(_, err)| err.clone()).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, String)>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DispatchObserver for RecordingObserver {
    fn on_failure(&self, failure: &DispatchFailure) {
        self.lock()
            .push((failure.event_type.clone(), failure.error.to_string()));
    }
}
