// src/motion_loop.rs
use crate::error::SimError;
use crate::simulation::{JointState, JointStateSimulator};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

const METRICS_WINDOW: usize = 30;

#[derive(Debug, Clone)]
pub struct TickMetrics {
    pub ticks: u64,
    pub overruns: u64,
    /// Mean wall-clock interval between ticks over the last 30 ticks (seconds).
    pub avg_interval: f64,
    pub avg_rate_hz: f64,
    /// Mean time spent inside `advance` (seconds).
    pub avg_update_time: f64,
    intervals: VecDeque<f64>,
    update_times: VecDeque<f64>,
}

impl TickMetrics {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            overruns: 0,
            avg_interval: 0.0,
            avg_rate_hz: 0.0,
            avg_update_time: 0.0,
            intervals: VecDeque::with_capacity(METRICS_WINDOW),
            update_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    fn record(&mut self, interval: f64, update_time: f64) {
        self.ticks += 1;

        self.intervals.push_front(interval);
        if self.intervals.len() > METRICS_WINDOW {
            self.intervals.pop_back();
        }
        self.update_times.push_front(update_time);
        if self.update_times.len() > METRICS_WINDOW {
            self.update_times.pop_back();
        }

        self.avg_interval = self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
        self.avg_rate_hz = if self.avg_interval > 0.0 {
            1.0 / self.avg_interval
        } else {
            0.0
        };
        self.avg_update_time = self.update_times.iter().sum::<f64>() / self.update_times.len() as f64;
    }
}

impl Default for TickMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives `advance` at a fixed rate and publishes every post-tick snapshot.
pub struct MotionLoop {
    sim: Arc<JointStateSimulator>,
    period: Duration,
    /// Upper bound on the dt handed to `advance` after a stall.
    max_dt: f64,
    state_tx: watch::Sender<JointState>,
}

impl MotionLoop {
    pub fn new(sim: Arc<JointStateSimulator>) -> Result<Self, SimError> {
        let period = sim.config().tick_period()?;
        let (state_tx, _) = watch::channel(sim.snapshot());
        Ok(Self {
            sim,
            period,
            max_dt: 0.1,
            state_tx,
        })
    }

    /// Overrides the configured tick period. A zero period is refused.
    pub fn with_period(mut self, period: Duration) -> Result<Self, SimError> {
        if period.is_zero() {
            return Err(SimError::Config("motion loop period must be non-zero".to_string()));
        }
        self.period = period;
        Ok(self)
    }

    pub fn subscribe(&self) -> watch::Receiver<JointState> {
        self.state_tx.subscribe()
    }

    /// Runs until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> TickMetrics {
        let mut metrics = TickMetrics::new();
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // First tick completes immediately.
        interval.tick().await;
        let mut last = Instant::now();

        tracing::info!(period_ms = self.period.as_secs_f64() * 1000.0, "motion loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last).as_secs_f64();
                    last = now;

                    if elapsed > self.period.as_secs_f64() * 2.0 {
                        metrics.overruns += 1;
                        tracing::warn!(elapsed_ms = elapsed * 1000.0, "motion tick overran");
                    }

                    let start = Instant::now();
                    self.sim.advance(elapsed.min(self.max_dt));
                    let update_time = start.elapsed().as_secs_f64();

                    metrics.record(elapsed, update_time);
                    // No subscribers is fine.
                    let _ = self.state_tx.send(self.sim.snapshot());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks = metrics.ticks, avg_rate_hz = metrics.avg_rate_hz, "motion loop stopped");
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::DOF;

    #[test]
    fn metrics_average_over_window() {
        let mut metrics = TickMetrics::new();
        for _ in 0..100 {
            metrics.record(0.02, 0.001);
        }
        assert_eq!(metrics.ticks, 100);
        assert!((metrics.avg_interval - 0.02).abs() < 1e-12);
        assert!((metrics.avg_rate_hz - 50.0).abs() < 1e-6);
        assert!((metrics.avg_update_time - 0.001).abs() < 1e-12);
    }

    #[test]
    fn zero_period_is_refused() {
        let sim = Arc::new(JointStateSimulator::from_config(SimulatorConfig::default()).unwrap());
        let motion = MotionLoop::new(sim).unwrap();
        assert!(matches!(
            motion.with_period(Duration::ZERO),
            Err(SimError::Config(_))
        ));
    }

    #[tokio::test]
    async fn loop_drives_simulator_and_stops() {
        let sim = Arc::new(JointStateSimulator::from_config(SimulatorConfig::default()).unwrap());
        sim.set_targets(&[1.0; DOF], true).unwrap();

        let motion = MotionLoop::new(Arc::clone(&sim))
            .unwrap()
            .with_period(Duration::from_millis(5))
            .unwrap();
        let mut states = motion.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(motion.run(shutdown_rx));

        states.changed().await.unwrap();
        assert!(states.borrow().tick >= 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap();

        assert!(metrics.ticks >= 2, "ticks = {}", metrics.ticks);
        let state = sim.snapshot();
        assert!(state.positions[0] > 0.0 && state.positions[0] <= 1.0);
        assert_eq!(state.tick, metrics.ticks);
    }

    #[tokio::test]
    async fn dropping_shutdown_sender_stops_loop() {
        let sim = Arc::new(JointStateSimulator::from_config(SimulatorConfig::default()).unwrap());
        let motion = MotionLoop::new(sim)
            .unwrap()
            .with_period(Duration::from_millis(5))
            .unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(motion.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(shutdown_tx);
        let metrics = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(metrics.ticks >= 1);
    }
}
