use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LockResult, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static POISON_REPORTED: AtomicBool = AtomicBool::new(false);

/// Takes the guard out of a poisoned lock. A panic elsewhere must not take the
/// loop's metrics down with it, so the first recovery is logged and the rest
/// are silent.
fn recover<G>(result: LockResult<G>, operation: &'static str) -> G {
    result.unwrap_or_else(|poisoned| {
        if !POISON_REPORTED.swap(true, Ordering::Relaxed) {
            warn!(operation, "metrics lock poisoned; recovered inner value");
        }
        poisoned.into_inner()
    })
}

/// Loop health over the last metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Most blocking interpreters alive after any tick of the interval.
    pub blocking_interpreters: usize,
    /// Most parallel interpreters alive after any tick of the interval.
    pub parallel_interpreters: usize,
    /// Command failures reported during the interval.
    pub diagnostics: usize,
}

/// Shared read side of the loop metrics. Clones see the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *recover(self.latest.read(), "read")
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        *recover(self.latest.write(), "write") = snapshot;
    }
}

/// What one scheduler tick left behind.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TickSample {
    pub(crate) blocking: usize,
    pub(crate) parallel: usize,
    pub(crate) diagnostics: usize,
}

#[derive(Debug, Default)]
struct IntervalTotals {
    frames: u32,
    ticks: u32,
    frame_time: Duration,
    peak_blocking: usize,
    peak_parallel: usize,
    diagnostics: usize,
}

/// Collects frame and tick samples and turns them into one snapshot per
/// interval.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    started: Instant,
    interval: Duration,
    totals: IntervalTotals,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            interval,
            totals: IntervalTotals::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration) {
        let totals = &mut self.totals;
        totals.frames = totals.frames.saturating_add(1);
        totals.frame_time = totals.frame_time.saturating_add(frame_dt);
    }

    pub(crate) fn record_tick(&mut self, sample: TickSample) {
        let totals = &mut self.totals;
        totals.ticks = totals.ticks.saturating_add(1);
        totals.peak_blocking = totals.peak_blocking.max(sample.blocking);
        totals.peak_parallel = totals.peak_parallel.max(sample.parallel);
        totals.diagnostics = totals.diagnostics.saturating_add(sample.diagnostics);
    }

    /// Closes the interval once it has run its length and starts the next one.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.interval {
            return None;
        }

        let totals = std::mem::take(&mut self.totals);
        self.started = now;
        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match totals.frames {
            0 => 0.0,
            frames => totals.frame_time.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            tps: totals.ticks as f32 / seconds,
            frame_time_ms,
            blocking_interpreters: totals.peak_blocking,
            parallel_interpreters: totals.peak_parallel,
            diagnostics: totals.diagnostics,
        })
    }
}
