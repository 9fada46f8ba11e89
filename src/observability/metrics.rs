use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one sweep session
pub struct SweepMetrics {
    session_id: String,
    steps_completed: AtomicU64,
    acquisitions: AtomicU64,
    series_writes: AtomicU64,
    warnings: AtomicU64,
    errors: AtomicU64,
    limit_violations: AtomicU64,
    total_acquisition_ms: AtomicU64,
}

impl SweepMetrics {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            steps_completed: AtomicU64::new(0),
            acquisitions: AtomicU64::new(0),
            series_writes: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            limit_violations: AtomicU64::new(0),
            total_acquisition_ms: AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn steps_completed(&self) -> u64 {
        self.steps_completed.load(Ordering::Relaxed)
    }

    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    pub fn series_writes(&self) -> u64 {
        self.series_writes.load(Ordering::Relaxed)
    }

    pub fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn limit_violations(&self) -> u64 {
        self.limit_violations.load(Ordering::Relaxed)
    }

    pub fn record_step_completed(&self) {
        self.steps_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_series_write(&self) {
        self.series_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_limit_violation(&self) {
        self.limit_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_acquisition(&self) -> Instant {
        Instant::now()
    }

    pub fn finish_acquisition(&self, start: Instant) {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.total_acquisition_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_acquisition_ms(&self) -> u64 {
        let samples = self.acquisitions.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_acquisition_ms.load(Ordering::Relaxed) / samples
    }
}
