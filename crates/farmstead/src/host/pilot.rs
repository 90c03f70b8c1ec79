use engine::{InputAction, InputCollector, InputSnapshot, InputSource};

/// `action` held down over the half-open tick window `[from_tick, until_tick)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PilotStep {
    pub from_tick: u64,
    pub until_tick: u64,
    pub action: InputAction,
}

impl PilotStep {
    pub fn hold(action: InputAction, from_tick: u64, until_tick: u64) -> Self {
        Self {
            from_tick,
            until_tick,
            action,
        }
    }

    /// Down for a single tick, which reads as one press edge.
    pub fn press(action: InputAction, at_tick: u64) -> Self {
        Self::hold(action, at_tick, at_tick.saturating_add(1))
    }

    fn covers(&self, tick: u64) -> bool {
        (self.from_tick..self.until_tick).contains(&tick)
    }
}

/// Scripted input for headless runs. The script only says which keys are
/// down; press edges come out of an [`InputCollector`], so two steps for the
/// same action need a gap between them to register twice. Ticks past the
/// script get empty input.
#[derive(Debug, Clone, Default)]
pub struct DemoPilot {
    steps: Vec<PilotStep>,
    collector: InputCollector,
}

impl DemoPilot {
    pub fn new(steps: Vec<PilotStep>) -> Self {
        Self {
            steps,
            collector: InputCollector::new(),
        }
    }

    /// Walk to the tractor, hitch the plow and work a strip, quicksave, drive
    /// back, hand-plant a crop, then reload the quicksave.
    pub fn farm_tour() -> Self {
        use InputAction::*;
        Self::new(vec![
            PilotStep::hold(MoveRight, 0, 20),
            PilotStep::press(EnterExit, 21),
            PilotStep::press(Hitch, 23),
            PilotStep::hold(MoveRight, 25, 145),
            PilotStep::press(Hitch, 146),
            PilotStep::press(Save, 150),
            PilotStep::hold(MoveLeft, 152, 200),
            PilotStep::press(EnterExit, 202),
            PilotStep::press(Till, 204),
            PilotStep::press(Plant, 206),
            PilotStep::press(Load, 210),
            PilotStep::hold(MoveRight, 212, 240),
        ])
    }

    /// First tick after the last scripted step.
    pub fn script_len(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| step.until_tick)
            .max()
            .unwrap_or(0)
    }

    pub fn steps(&self) -> &[PilotStep] {
        &self.steps
    }
}

impl InputSource for DemoPilot {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot {
        for action in InputAction::ALL {
            let down = self
                .steps
                .iter()
                .any(|step| step.action == action && step.covers(tick));
            self.collector.set_action(action, down);
        }
        self.collector.snapshot_for_tick()
    }
}
