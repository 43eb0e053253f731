use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::agent::TerminationReason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub duration: Duration,
    pub steps: usize,
    pub tool_calls: usize,
    pub tool_failures: usize,
    pub parse_failures: usize,
    pub reason: TerminationReason,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.reason == TerminationReason::FinalAnswer
    }

    pub fn success_rate(reports: &[Self]) -> f32 {
        if reports.is_empty() {
            return 0.0;
        }
        let successes = reports.iter().filter(|r| r.success()).count();
        successes as f32 / reports.len() as f32
    }
}

/// Collects one [`RunReport`] per finished run. Cheap to clone and share.
#[derive(Default, Clone)]
pub struct MetricsTracker {
    reports: Arc<Mutex<Vec<RunReport>>>,
}

impl MetricsTracker {
    pub fn start_run(&self) -> RunGuard {
        RunGuard {
            start: Instant::now(),
            steps: 0,
            tool_calls: 0,
            tool_failures: 0,
            parse_failures: 0,
            metrics: self.clone(),
        }
    }

    pub fn reports(&self) -> Vec<RunReport> {
        self.reports
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub struct RunGuard {
    start: Instant,
    steps: usize,
    tool_calls: usize,
    tool_failures: usize,
    parse_failures: usize,
    metrics: MetricsTracker,
}

impl RunGuard {
    pub fn record_tool_call(&mut self, failed: bool) {
        self.steps += 1;
        self.tool_calls += 1;
        if failed {
            self.tool_failures += 1;
        }
    }

    pub fn record_parse_failure(&mut self) {
        self.steps += 1;
        self.parse_failures += 1;
    }

    pub fn finish(self, reason: TerminationReason) -> RunReport {
        let report = RunReport {
            duration: self.start.elapsed(),
            steps: self.steps,
            tool_calls: self.tool_calls,
            tool_failures: self.tool_failures,
            parse_failures: self.parse_failures,
            reason,
        };
        if let Ok(mut reports) = self.metrics.reports.lock() {
            reports.push(report.clone());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_success_rate() {
        let tracker = MetricsTracker::default();

        let mut guard = tracker.start_run();
        guard.record_tool_call(false);
        guard.record_tool_call(true);
        let report = guard.finish(TerminationReason::FinalAnswer);
        assert_eq!(report.steps, 2);
        assert_eq!(report.tool_failures, 1);

        let mut guard = tracker.start_run();
        guard.record_parse_failure();
        guard.finish(TerminationReason::FatalError);

        let reports = tracker.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(RunReport::success_rate(&reports), 0.5);
    }
}
