//! Run reporting: wall-clock timing and the ordered stage-application log.
//!
//! The scheduler records one [`StageRecord`] per transform application, in
//! application order. The record log is how callers (and the property tests)
//! observe which stages ran, at which granularity, and whether anything
//! changed. Reporting is best-effort: nothing here can fail a run.

use std::time::{Duration, Instant};

use crate::passes::PassKind;

/// Granularity a stage was applied at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageScope {
    Module,
    Function,
}

/// One transform application as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub kind: PassKind,
    pub scope: StageScope,
    /// Function name for per-function applications.
    pub function: Option<String>,
    pub enabled: bool,
    pub changed: bool,
}

/// Ordered application log for one run.
#[derive(Debug, Default)]
pub struct RunStats {
    records: Vec<StageRecord>,
}

impl RunStats {
    pub fn record(&mut self, record: StageRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    /// Applications of one transform kind, in order.
    pub fn records_for(&self, kind: PassKind) -> impl Iterator<Item = &StageRecord> {
        self.records.iter().filter(move |r| r.kind == kind)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Wall-clock timer scoped around one run.
#[derive(Debug)]
pub struct RunTimer {
    started: Instant,
}

impl RunTimer {
    pub fn start() -> Self {
        Self { started: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Elapsed wall time in seconds, for the 7-decimal report line.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_keep_application_order() {
        let mut stats = RunStats::default();
        for kind in [PassKind::AntiHooking, PassKind::StringEncryption] {
            stats.record(StageRecord {
                kind,
                scope: StageScope::Module,
                function: None,
                enabled: false,
                changed: false,
            });
        }
        let kinds: Vec<PassKind> = stats.records().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![PassKind::AntiHooking, PassKind::StringEncryption]);
    }

    #[test]
    fn timer_reports_nonnegative_elapsed() {
        let timer = RunTimer::start();
        assert!(timer.elapsed_secs() >= 0.0);
    }
}
