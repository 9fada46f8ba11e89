use std::sync::Arc;

use super::SweepMetrics;

/// Human-readable summary of a sweep session
pub struct SweepMonitor {
    metrics: Arc<SweepMetrics>,
}

impl SweepMonitor {
    pub fn new(metrics: Arc<SweepMetrics>) -> Self {
        Self { metrics }
    }

    pub fn generate_report(&self) -> String {
        let m = &self.metrics;

        let mut report = format!("=== Sweep {} ===\n", m.session_id());
        report.push_str(&format!(
            "  Steps: {} completed\n  Acquisitions: {} (avg {} ms)\n  Series writes: {}\n",
            m.steps_completed(),
            m.acquisitions(),
            m.avg_acquisition_ms(),
            m.series_writes()
        ));
        report.push_str(&format!(
            "  Warnings: {}\n  Errors: {}\n",
            plural(m.warnings(), "warning"),
            plural(m.errors(), "error")
        ));

        if m.limit_violations() > 0 {
            report.push_str(&format!(
                "  Current limit: {} skipped\n",
                plural(m.limit_violations(), "request")
            ));
        }

        report
    }

    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }
}

fn plural(count: u64, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_counters() {
        let metrics = Arc::new(SweepMetrics::new("run-1"));
        metrics.record_step_completed();
        metrics.record_warning();
        metrics.record_limit_violation();

        let report = SweepMonitor::new(metrics).generate_report();

        assert!(report.contains("Sweep run-1"));
        assert!(report.contains("Steps: 1 completed"));
        assert!(report.contains("1 warning\n"));
        assert!(report.contains("0 errors"));
        assert!(report.contains("1 request skipped"));
    }
}
