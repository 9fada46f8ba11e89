use std::fmt;
use std::sync::Arc;

use super::SweepMetrics;

/// Session-scoped logging handle passed to every component of a sweep.
///
/// Records go to the `log` facade with the component as target and the session id as prefix.
/// Warnings and errors are also counted in the shared [`SweepMetrics`].
#[derive(Clone)]
pub struct Reporter {
    session: Arc<str>,
    component: &'static str,
    metrics: Arc<SweepMetrics>,
}

impl Reporter {
    pub fn new(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            metrics: Arc::new(SweepMetrics::new(session_id.clone())),
            session: session_id.into(),
            component: "fieldsweep",
        }
    }

    /// Same session and counters, different log target
    pub fn scoped(&self, component: &'static str) -> Self {
        Self {
            session: self.session.clone(),
            component,
            metrics: self.metrics.clone(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn metrics(&self) -> &Arc<SweepMetrics> {
        &self.metrics
    }

    pub fn debug(&self, message: impl fmt::Display) {
        log::debug!(target: self.component, "[{}] {}", self.session, message);
    }

    pub fn info(&self, message: impl fmt::Display) {
        log::info!(target: self.component, "[{}] {}", self.session, message);
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.metrics.record_warning();
        log::warn!(target: self.component, "[{}] {}", self.session, message);
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.metrics.record_error();
        log::error!(target: self.component, "[{}] {}", self.session, message);
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("session", &self.session)
            .field("component", &self.component)
            .finish()
    }
}
