use engine::{InputAction, InputSnapshot, Scene, SceneCommand};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::persistence::{PersistenceOutcome, PersistenceWorker, RequestTimeouts, DEFAULT_SLOT};
use crate::sim::{ControlledEntity, FeedbackEvent, Simulation, TickIntents};

/// Drives one [`Simulation`] from engine input and routes save/load
/// requests to the persistence worker.
pub struct FarmScene {
    sim: Simulation,
    clock: Box<dyn Clock>,
    persistence: Option<PersistenceWorker>,
    slot: String,
    frames: u64,
    last_toast: Option<String>,
}

impl FarmScene {
    pub fn new(sim: Simulation, clock: Box<dyn Clock>) -> Self {
        Self {
            sim,
            clock,
            persistence: None,
            slot: DEFAULT_SLOT.to_string(),
            frames: 0,
            last_toast: None,
        }
    }

    pub fn with_persistence(mut self, worker: PersistenceWorker, slot: &str) -> Self {
        self.persistence = Some(worker);
        self.slot = slot.to_string();
        self
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Scene updates so far. Unlike the simulation tick this never rewinds on load.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_toast(&self) -> Option<&str> {
        self.last_toast.as_deref()
    }

    pub fn load_pending(&self) -> bool {
        self.persistence
            .as_ref()
            .is_some_and(PersistenceWorker::load_pending)
    }

    fn request_save(&mut self) {
        let Some(worker) = self.persistence.as_mut() else {
            self.sim.status_mut().toast("Saving is unavailable");
            return;
        };
        let queued = self
            .sim
            .snapshot_json()
            .map_err(|error| error.to_string())
            .and_then(|json| {
                worker
                    .request_save(&self.slot, json, self.frames)
                    .map_err(|error| error.to_string())
            });
        if let Err(error) = queued {
            warn!(slot = %self.slot, error = %error, "save_request_failed");
            self.sim.status_mut().toast(format!("Save failed: {error}"));
        }
    }

    fn request_load(&mut self) {
        let Some(worker) = self.persistence.as_mut() else {
            self.sim.status_mut().toast("Loading is unavailable");
            return;
        };
        if let Err(error) = worker.request_load(&self.slot, self.frames) {
            warn!(slot = %self.slot, error = %error, "load_request_failed");
            self.sim.status_mut().toast(format!("Load failed: {error}"));
        }
    }

    fn poll_persistence(&mut self) {
        let config = self.sim.config();
        let timeouts = RequestTimeouts {
            save_ticks: config.save_timeout_ticks,
            load_ticks: config.load_timeout_ticks,
        };
        let outcomes = match self.persistence.as_mut() {
            Some(worker) => worker.poll(self.frames, timeouts),
            None => return,
        };
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: PersistenceOutcome) {
        let message = match outcome {
            PersistenceOutcome::Saved { slot } => {
                info!(slot = %slot, tick = self.sim.tick_count(), "game_saved");
                "Game saved".to_string()
            }
            PersistenceOutcome::SaveFailed { slot, error } => {
                warn!(slot = %slot, error = %error, "save_failed");
                format!("Save failed: {error}")
            }
            PersistenceOutcome::Loaded { slot, payload } => {
                match self.sim.load_snapshot_json(&payload) {
                    Ok(()) => {
                        info!(slot = %slot, tick = self.sim.tick_count(), "game_loaded");
                        "Game loaded".to_string()
                    }
                    Err(error) => {
                        warn!(slot = %slot, error = %error, "load_rejected");
                        format!("Load failed: {error}")
                    }
                }
            }
            PersistenceOutcome::NothingSaved { slot } => {
                info!(slot = %slot, "no_save_found");
                "No save found".to_string()
            }
            PersistenceOutcome::LoadFailed { slot, error } => {
                warn!(slot = %slot, error = %error, "load_failed");
                format!("Load failed: {error}")
            }
            PersistenceOutcome::SaveTimedOut { .. } => "Save timed out".to_string(),
            PersistenceOutcome::LoadTimedOut { .. } => "Load timed out".to_string(),
        };
        self.sim.status_mut().toast(message);
    }

    fn drain_status(&mut self) {
        for event in self.sim.drain_status() {
            match event {
                FeedbackEvent::Toast { message, .. } => self.last_toast = Some(message),
                FeedbackEvent::MoneyDelta { amount, .. } => {
                    debug!(amount, money = self.sim.player().money, "money_feedback");
                }
            }
        }
    }
}

impl Scene for FarmScene {
    fn load(&mut self) {
        let world = self.sim.world();
        info!(
            width = world.width(),
            height = world.height(),
            vehicles = self.sim.vehicles().len(),
            persistence = self.persistence.is_some(),
            "farm_scene_loaded"
        );
    }

    fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }

        let intents = TickIntents::from_input(input);
        let now = self.clock.now_ms();
        self.sim.tick(&intents, now, fixed_dt_seconds);

        if input.was_pressed(InputAction::Save) {
            self.request_save();
        }
        if input.was_pressed(InputAction::Load) {
            self.request_load();
        }
        self.poll_persistence();
        self.drain_status();
        self.frames = self.frames.saturating_add(1);

        SceneCommand::None
    }

    fn unload(&mut self) {
        info!(
            frames = self.frames,
            tick = self.sim.tick_count(),
            money = self.sim.player().money,
            "farm_scene_unloaded"
        );
    }

    fn debug_title(&self) -> Option<String> {
        let controlled = match self.sim.controlled() {
            ControlledEntity::Player => "on foot".to_string(),
            ControlledEntity::Vehicle(id) => self
                .sim
                .vehicles()
                .get(id.0)
                .map(|vehicle| vehicle.kind.name().to_lowercase())
                .unwrap_or_default(),
        };
        Some(format!(
            "Farmstead | {:05.2}h | ${} | {}",
            self.sim.time_of_day(),
            self.sim.player().money,
            controlled
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    use engine::{
        run_headless, write_envelope, LoopConfig, LoopControl, MetricsHandle, StopReason,
    };
    use tempfile::TempDir;

    use super::*;
    use crate::clock::{ManualClock, TimestampMs};
    use crate::host::DemoPilot;
    use crate::persistence::{FileSnapshotStore, PersistenceError, SnapshotStore};
    use crate::sim::{CropKind, SimConfig, TileKind};

    const DT: f32 = 1.0 / 60.0;

    fn scene() -> FarmScene {
        let sim = Simulation::new(SimConfig::default()).expect("sim");
        FarmScene::new(sim, Box::new(ManualClock::starting_at(TimestampMs(0))))
    }

    fn scene_with_saves(temp: &TempDir) -> FarmScene {
        let worker = PersistenceWorker::spawn(Box::new(FileSnapshotStore::new(
            temp.path().to_path_buf(),
        )))
        .expect("spawn worker");
        scene().with_persistence(worker, "test")
    }

    fn press(action: InputAction) -> InputSnapshot {
        InputSnapshot::empty().with_action_pressed(action)
    }

    fn update_until_toast(scene: &mut FarmScene, expected: impl Fn(&str) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            scene.update(DT, &InputSnapshot::empty());
            if scene.last_toast().is_some_and(&expected) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn quit_input_stops_without_ticking() {
        let mut scene = scene();
        assert_eq!(scene.update(DT, &press(InputAction::Quit)), SceneCommand::Quit);
        assert_eq!(scene.simulation().tick_count(), 0);
    }

    #[test]
    fn update_ticks_simulation_with_clock_time() {
        let clock = ManualClock::starting_at(TimestampMs(5_000));
        let sim = Simulation::new(SimConfig::default()).expect("sim");
        let mut scene = FarmScene::new(sim, Box::new(clock.clone()));

        scene.update(DT, &press(InputAction::Till));
        scene.update(DT, &press(InputAction::Plant));
        let (x, y) = scene.simulation().player().target_tile(scene.simulation().world());
        let planted_at = scene
            .simulation()
            .world()
            .get_tile(x, y)
            .and_then(|tile| tile.crop())
            .map(|crop| crop.planted_at);
        assert_eq!(planted_at, Some(TimestampMs(5_000)));

        clock.advance_ms(3 * scene.simulation().config().growth_time_per_stage_ms);
        scene.update(DT, &InputSnapshot::empty());
        assert_eq!(
            scene.simulation().world().get_tile(x, y).map(|tile| tile.kind()),
            Some(TileKind::CropGrown)
        );
        assert_eq!(scene.frames(), 3);
    }

    #[test]
    fn status_toasts_surface_on_the_scene() {
        let mut scene = scene();
        scene.update(DT, &press(InputAction::EnterExit));
        assert_eq!(scene.last_toast(), Some("No vehicle nearby"));
        assert!(scene.simulation().status().pending().is_empty());
    }

    #[test]
    fn save_and_load_without_worker_report_unavailable() {
        let mut scene = scene();
        scene.update(DT, &press(InputAction::Save));
        assert_eq!(scene.last_toast(), Some("Saving is unavailable"));
        scene.update(DT, &press(InputAction::Load));
        assert_eq!(scene.last_toast(), Some("Loading is unavailable"));
    }

    #[test]
    fn loading_empty_slot_reports_no_save() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = scene_with_saves(&temp);
        scene.update(DT, &press(InputAction::Load));
        assert!(update_until_toast(&mut scene, |toast| toast == "No save found"));
        assert!(!scene.load_pending());
    }

    #[test]
    fn saved_game_loads_back_over_later_changes() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = scene_with_saves(&temp);
        scene.update(DT, &press(InputAction::Till));
        scene.update(DT, &press(InputAction::Save));
        assert!(update_until_toast(&mut scene, |toast| toast == "Game saved"));
        let saved_world = scene.simulation().world().clone();

        let sim = scene.simulation_mut();
        sim.buy_seeds(CropKind::Corn, 2).expect("buy corn");
        sim.select_crop(CropKind::Corn);
        scene.update(DT, &press(InputAction::Load));
        assert!(update_until_toast(&mut scene, |toast| toast == "Game loaded"));

        assert_eq!(scene.simulation().player().money, 100);
        assert_eq!(scene.simulation().selected_crop(), CropKind::Wheat);
        assert_eq!(scene.simulation().world().tiles(), saved_world.tiles());
    }

    /// Saves never return until the gate is released or dropped.
    struct StuckSaves {
        gate: Mutex<Receiver<()>>,
    }

    impl SnapshotStore for StuckSaves {
        fn save(&self, _slot: &str, _payload: String) -> Result<(), PersistenceError> {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            Ok(())
        }

        fn load(&self, _slot: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }
    }

    #[test]
    fn hung_save_surfaces_timeout_and_scene_drops_promptly() {
        let (release, gate) = mpsc::channel::<()>();
        let config = SimConfig {
            save_timeout_ticks: 3,
            ..SimConfig::default()
        };
        let sim = Simulation::new(config).expect("sim");
        let worker = PersistenceWorker::spawn(Box::new(StuckSaves {
            gate: Mutex::new(gate),
        }))
        .expect("spawn worker");
        let mut scene = FarmScene::new(sim, Box::new(ManualClock::starting_at(TimestampMs(0))))
            .with_persistence(worker, "test");

        scene.update(DT, &press(InputAction::Save));
        scene.update(DT, &InputSnapshot::empty());
        scene.update(DT, &InputSnapshot::empty());
        assert_ne!(scene.last_toast(), Some("Save timed out"));
        scene.update(DT, &InputSnapshot::empty());
        assert_eq!(scene.last_toast(), Some("Save timed out"));

        let started = Instant::now();
        drop(scene);
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(release);
    }

    #[test]
    fn corrupt_snapshot_is_reported_and_state_kept() {
        let temp = TempDir::new().expect("tempdir");
        write_envelope(&temp.path().join("test.json"), "{\"tick\": \"soon\"}".to_string())
            .expect("write envelope");
        let mut scene = scene_with_saves(&temp);
        scene.update(DT, &InputSnapshot::empty());
        let tick_before = scene.simulation().tick_count();

        scene.update(DT, &press(InputAction::Load));
        assert!(update_until_toast(&mut scene, |toast| toast.starts_with("Load failed:")));
        assert!(scene.simulation().tick_count() > tick_before);
    }

    #[test]
    fn demo_tour_runs_headless_and_ploughs_the_field() {
        let temp = TempDir::new().expect("tempdir");
        let mut scene = scene_with_saves(&temp);
        let mut pilot = DemoPilot::farm_tour();
        let config = LoopConfig {
            max_ticks: Some(pilot.script_len()),
            paced: false,
            ..LoopConfig::default()
        };

        let summary = run_headless(
            &config,
            &mut scene,
            &mut pilot,
            &LoopControl::new(),
            &MetricsHandle::default(),
        )
        .expect("loop runs");
        assert_eq!(summary.stop_reason, StopReason::TickLimit);
        assert_eq!(summary.ticks_run, pilot.script_len());
        assert!(update_until_toast(&mut scene, |toast| toast == "Game loaded"));
        assert!(temp.path().join("test.json").is_file());
        assert!(scene
            .simulation()
            .world()
            .tiles()
            .iter()
            .any(|tile| tile.kind() != TileKind::Grass
                && tile.kind() != TileKind::Dirt
                && tile.kind() != TileKind::Sky));
        assert!(scene.debug_title().is_some_and(|title| title.starts_with("Farmstead")));
    }
}
