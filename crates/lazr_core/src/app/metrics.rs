use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

static METRICS_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_metrics_lock_poison_once(operation: &'static str) {
    if METRICS_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "metrics lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    /// Ticks per wall-clock second over the last interval.
    pub tps: f32,
    /// Simulated seconds advanced per wall-clock second.
    pub sim_speed: f32,
    /// Mean simulated frame delta.
    pub frame_time_ms: f32,
    pub total_ticks: u64,
}

#[derive(Clone, Debug)]
pub struct MetricsHandle {
    snapshot: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(LoopMetricsSnapshot::default())),
        }
    }
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                warn_metrics_lock_poison_once("write");
                let mut guard = poisoned.into_inner();
                *guard = snapshot;
            }
        }
    }
}

/// Interval bookkeeping. Intervals are measured in simulated time so a headless run logs at
/// the same points no matter how fast the host is.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    interval_start_sim: Duration,
    interval_start_wall: Instant,
    ticks: u32,
    frame_time_sum: Duration,
    total_ticks: u64,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, wall_now: Instant) -> Self {
        Self {
            interval,
            interval_start_sim: Duration::ZERO,
            interval_start_wall: wall_now,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, frame_dt: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    pub(crate) fn maybe_snapshot(
        &mut self,
        sim_now: Duration,
        wall_now: Instant,
    ) -> Option<LoopMetricsSnapshot> {
        if sim_now.saturating_sub(self.interval_start_sim) < self.interval {
            return None;
        }
        Some(self.take_snapshot(sim_now, wall_now))
    }

    /// Closes the current interval regardless of its length.
    pub(crate) fn take_snapshot(
        &mut self,
        sim_now: Duration,
        wall_now: Instant,
    ) -> LoopMetricsSnapshot {
        let sim_elapsed = sim_now.saturating_sub(self.interval_start_sim);
        let wall_seconds = wall_now
            .saturating_duration_since(self.interval_start_wall)
            .as_secs_f32()
            .max(f32::EPSILON);
        let frame_time_ms = if self.ticks == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.ticks as f32) * 1000.0
        };

        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / wall_seconds,
            sim_speed: sim_elapsed.as_secs_f32() / wall_seconds,
            frame_time_ms,
            total_ticks: self.total_ticks,
        };

        self.interval_start_sim = sim_now;
        self.interval_start_wall = wall_now;
        self.ticks = 0;
        self.frame_time_sum = Duration::ZERO;

        snapshot
    }
}
