//! Observability/timers (C12): named checkpoints through one call to
//! `sort_into`, retained across the life of the process so a caller can
//! inspect where the last run spent its time without wiring up a
//! dedicated profiler.
//!
//! Checkpoints during the splitter search are named `bisectNNNN`; keeping
//! every one of those across a run with hundreds of bisection rounds would
//! dominate memory, so only the most recent ones beyond the tenth are kept.

use std::time::{Duration, Instant};
use tracing::debug;

const MAX_BISECT_CHECKPOINTS: usize = 10;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub name: String,
    pub elapsed: Duration,
}

/// Records checkpoints for a single `sort_into` call, in order.
pub struct TimerLog {
    start: Instant,
    last: Instant,
    checkpoints: Vec<Checkpoint>,
    bisect_count: usize,
}

impl TimerLog {
    pub fn new() -> Self {
        let now = Instant::now();
        TimerLog {
            start: now,
            last: now,
            checkpoints: vec![Checkpoint {
                name: "START".to_string(),
                elapsed: Duration::ZERO,
            }],
            bisect_count: 0,
        }
    }

    /// Records a named checkpoint with the time elapsed since the previous
    /// one. `tracing::debug!`-logs it immediately so a live run's progress
    /// is visible even if the process never returns to inspect `report`.
    pub fn mark(&mut self, name: &str) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        debug!(checkpoint = name, elapsed_us = elapsed.as_micros() as u64, "mpsort checkpoint");
        self.checkpoints.push(Checkpoint {
            name: name.to_string(),
            elapsed,
        });
    }

    /// Records one round of the splitter search. Only the most recent
    /// `bisectNNNN` checkpoints beyond the tenth round are retained; older
    /// ones are dropped to bound memory on runs with many bisection
    /// rounds.
    pub fn mark_bisect_round(&mut self) {
        self.bisect_count += 1;
        let name = format!("bisect{:04}", self.bisect_count);
        self.mark(&name);

        if self.bisect_count > MAX_BISECT_CHECKPOINTS {
            if let Some(idx) = self
                .checkpoints
                .iter()
                .position(|c| c.name.starts_with("bisect") && c.name != name)
            {
                self.checkpoints.remove(idx);
            }
        }
    }

    pub fn mark_end(&mut self) {
        self.mark("END");
    }

    pub fn total_elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }
}

impl Default for TimerLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats the checkpoint log of the last run as a human-readable table,
/// one line per checkpoint, for diagnostics or log output.
pub fn report_last_run(log: &TimerLog) -> String {
    let mut out = String::new();
    for cp in log.checkpoints() {
        out.push_str(&format!("{:<16} {:>10.3} ms\n", cp.name, cp.elapsed.as_secs_f64() * 1000.0));
    }
    out.push_str(&format!("{:<16} {:>10.3} ms\n", "TOTAL", log.total_elapsed().as_secs_f64() * 1000.0));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_log_starts_with_start_checkpoint() {
        let log = TimerLog::new();
        assert_eq!(log.checkpoints().len(), 1);
        assert_eq!(log.checkpoints()[0].name, "START");
    }

    #[test]
    fn marking_appends_checkpoints_in_order() {
        let mut log = TimerLog::new();
        log.mark("FirstSort");
        log.mark("PmaxPmin");
        log.mark_end();
        let names: Vec<&str> = log.checkpoints().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["START", "FirstSort", "PmaxPmin", "END"]);
    }

    #[test]
    fn bisect_checkpoints_beyond_the_tenth_are_pruned() {
        let mut log = TimerLog::new();
        for _ in 0..25 {
            log.mark_bisect_round();
        }
        let bisect_names: Vec<&str> = log
            .checkpoints()
            .iter()
            .map(|c| c.name.as_str())
            .filter(|n| n.starts_with("bisect"))
            .collect();
        assert!(bisect_names.len() <= MAX_BISECT_CHECKPOINTS + 1);
        // the most recent round must always survive the pruning.
        assert!(bisect_names.contains(&"bisect0025"));
    }

    #[test]
    fn report_contains_every_checkpoint_name() {
        let mut log = TimerLog::new();
        log.mark("FirstSort");
        log.mark_end();
        let report = report_last_run(&log);
        assert!(report.contains("START"));
        assert!(report.contains("FirstSort"));
        assert!(report.contains("END"));
        assert!(report.contains("TOTAL"));
    }
}
