use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Wall time spent in one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed: Duration,
}

impl StageTiming {
    pub fn new(stage: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            stage: stage.into(),
            elapsed,
        }
    }
}

/// Run `f` and record how long it took under `stage`
pub(crate) fn timed<T>(timings: &mut Vec<StageTiming>, stage: &str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    timings.push(StageTiming::new(stage, start.elapsed()));
    out
}

/// Per-stage breakdown with each stage's share of the total
pub fn format_timing_report(timings: &[StageTiming]) -> String {
    let total: Duration = timings.iter().map(|t| t.elapsed).sum();
    let mut report = String::from("=== PIPELINE TIMING REPORT ===\n");

    for timing in timings {
        let share = if total.as_nanos() > 0 {
            timing.elapsed.as_nanos() as f64 / total.as_nanos() as f64 * 100.0
        } else {
            0.0
        };
        report.push_str(&format!(
            "  {:<16} | {:>10.3}ms | Share: {:>5.1}%\n",
            timing.stage,
            timing.elapsed.as_secs_f64() * 1000.0,
            share
        ));
    }

    report.push_str(&format!(
        "  TOTAL            | {:>10.3}ms\n",
        total.as_secs_f64() * 1000.0
    ));
    report
}

/// Cooperative cancellation flag, checked between pipeline stages.
///
/// Clones share the flag, so a caller can keep one and hand another to the
/// pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
