use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::{InputSource, MetricsHandle, Scene, SceneCommand};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks. `None` runs until stopped or the scene quits.
    pub max_ticks: Option<u64>,
    /// Sleep to hold `target_tps` in real time. Unpaced runs one tick per frame
    /// as fast as possible.
    pub paced: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
            paced: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("loop is already running on this control handle")]
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TickLimit,
    SceneQuit,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub stop_reason: StopReason,
}

/// Shared run flag. `start` and `stop` are idempotent; a stop request takes effect
/// between ticks, never inside one.
#[derive(Debug, Clone, Default)]
pub struct LoopControl {
    running: Arc<AtomicBool>,
}

impl LoopControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call changed the state.
    pub fn start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `true` if this call changed the state.
    pub fn stop(&self) -> bool {
        self.running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub fn run_headless(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
    control: &LoopControl,
    metrics_handle: &MetricsHandle,
) -> Result<LoopSummary, AppError> {
    if !control.start() {
        return Err(AppError::AlreadyRunning);
    }

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        max_ticks = ?config.max_ticks,
        paced = config.paced,
        "loop_config"
    );

    scene.load();
    if let Some(title) = scene.debug_title() {
        info!(title = %title, "scene_loaded");
    }

    let mut ticks_run = 0u64;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, last_frame_instant);

    let stop_reason = 'frames: loop {
        if !control.is_running() {
            break 'frames StopReason::Stopped;
        }

        let frame_start = Instant::now();
        if config.paced {
            let raw_frame_dt = frame_start.saturating_duration_since(last_frame_instant);
            accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
        } else {
            accumulator = fixed_dt;
        }
        last_frame_instant = frame_start;

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config.max_ticks.is_some_and(|limit| ticks_run >= limit) {
                break 'frames StopReason::TickLimit;
            }
            let snapshot = input.snapshot_for_tick(ticks_run);
            let tick_start = Instant::now();
            let command = scene.update(fixed_dt_seconds, &snapshot);
            metrics_accumulator.record_tick(tick_start.elapsed());
            ticks_run = ticks_run.saturating_add(1);
            if command == SceneCommand::Quit || snapshot.quit_requested() {
                info!(tick = ticks_run, "shutdown_requested");
                break 'frames StopReason::SceneQuit;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            metrics_accumulator.record_dropped_backlog(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                ticks_run,
                "loop_metrics"
            );
        }

        if config.max_ticks.is_some_and(|limit| ticks_run >= limit) {
            break 'frames StopReason::TickLimit;
        }

        if config.paced {
            let pace_sleep =
                compute_pace_sleep(Instant::now().saturating_duration_since(frame_start), fixed_dt);
            if pace_sleep > Duration::ZERO {
                thread::sleep(pace_sleep);
            }
        }
    };

    scene.unload();
    control.stop();
    info!(ticks_run, reason = ?stop_reason, "loop_finished");

    Ok(LoopSummary {
        ticks_run,
        stop_reason,
    })
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_pace_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{InputAction, InputSnapshot};

    #[derive(Default)]
    struct CountingScene {
        loads: u32,
        unloads: u32,
        updates: u32,
        quit_after: Option<u32>,
    }

    impl Scene for CountingScene {
        fn load(&mut self) {
            self.loads += 1;
        }

        fn update(&mut self, _fixed_dt_seconds: f32, _input: &InputSnapshot) -> SceneCommand {
            self.updates += 1;
            match self.quit_after {
                Some(limit) if self.updates >= limit => SceneCommand::Quit,
                _ => SceneCommand::None,
            }
        }

        fn unload(&mut self) {
            self.unloads += 1;
        }
    }

    struct IdleInput;

    impl InputSource for IdleInput {
        fn snapshot_for_tick(&mut self, _tick: u64) -> InputSnapshot {
            InputSnapshot::empty()
        }
    }

    struct QuitAt(u64);

    impl InputSource for QuitAt {
        fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot {
            if tick == self.0 {
                InputSnapshot::empty().with_action_pressed(InputAction::Quit)
            } else {
                InputSnapshot::empty()
            }
        }
    }

    fn unpaced(max_ticks: Option<u64>) -> LoopConfig {
        LoopConfig {
            max_ticks,
            paced: false,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(48), Duration::from_millis(16), 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn pace_sleep_is_zero_when_over_budget() {
        assert_eq!(
            compute_pace_sleep(Duration::from_millis(20), Duration::from_millis(16)),
            Duration::ZERO
        );
        assert_eq!(
            compute_pace_sleep(Duration::from_millis(6), Duration::from_millis(16)),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn headless_run_stops_at_tick_limit() {
        let mut scene = CountingScene::default();
        let control = LoopControl::new();
        let summary = run_headless(
            &unpaced(Some(25)),
            &mut scene,
            &mut IdleInput,
            &control,
            &MetricsHandle::default(),
        )
        .expect("run");

        assert_eq!(summary.ticks_run, 25);
        assert_eq!(summary.stop_reason, StopReason::TickLimit);
        assert_eq!(scene.updates, 25);
        assert_eq!((scene.loads, scene.unloads), (1, 1));
        assert!(!control.is_running());
    }

    #[test]
    fn headless_run_stops_when_scene_quits() {
        let mut scene = CountingScene {
            quit_after: Some(4),
            ..CountingScene::default()
        };
        let summary = run_headless(
            &unpaced(Some(100)),
            &mut scene,
            &mut IdleInput,
            &LoopControl::new(),
            &MetricsHandle::default(),
        )
        .expect("run");

        assert_eq!(summary.ticks_run, 4);
        assert_eq!(summary.stop_reason, StopReason::SceneQuit);
    }

    #[test]
    fn quit_action_stops_loop() {
        let mut scene = CountingScene::default();
        let summary = run_headless(
            &unpaced(Some(100)),
            &mut scene,
            &mut QuitAt(2),
            &LoopControl::new(),
            &MetricsHandle::default(),
        )
        .expect("run");

        assert_eq!(summary.ticks_run, 3);
        assert_eq!(summary.stop_reason, StopReason::SceneQuit);
    }

    #[test]
    fn run_refuses_control_that_is_already_running() {
        let control = LoopControl::new();
        assert!(control.start());
        let result = run_headless(
            &unpaced(Some(1)),
            &mut CountingScene::default(),
            &mut IdleInput,
            &control,
            &MetricsHandle::default(),
        );
        assert!(matches!(result, Err(AppError::AlreadyRunning)));
    }

    #[test]
    fn control_start_and_stop_are_idempotent() {
        let control = LoopControl::new();
        assert!(control.start());
        assert!(!control.start());
        assert!(control.is_running());
        assert!(control.stop());
        assert!(!control.stop());
        assert!(!control.is_running());
    }
}
