#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    Jump,
    EnterExit,
    Hitch,
    Till,
    Plant,
    Harvest,
    Save,
    Load,
    Quit,
}

const ACTION_COUNT: usize = 11;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::Jump,
        InputAction::EnterExit,
        InputAction::Hitch,
        InputAction::Till,
        InputAction::Plant,
        InputAction::Harvest,
        InputAction::Save,
        InputAction::Load,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveLeft => 0,
            InputAction::MoveRight => 1,
            InputAction::Jump => 2,
            InputAction::EnterExit => 3,
            InputAction::Hitch => 4,
            InputAction::Till => 5,
            InputAction::Plant => 6,
            InputAction::Harvest => 7,
            InputAction::Save => 8,
            InputAction::Load => 9,
            InputAction::Quit => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

/// Abstract per-tick input: which actions are held and which went down this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    held: ActionStates,
    pressed: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.held.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    pub fn quit_requested(&self) -> bool {
        self.held.is_down(InputAction::Quit) || self.pressed.is_down(InputAction::Quit)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.held.set(action, is_down);
        self
    }

    /// Marks a single-tick press edge. A pressed action is also held.
    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.pressed.set(action, true);
        self.held.set(action, true);
        self
    }
}

/// Supplies one input snapshot per simulation tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot;
}

/// Turns raw held states into held + edge-triggered snapshots.
#[derive(Debug, Clone, Default)]
pub struct InputCollector {
    held: ActionStates,
    pressed_edges: ActionStates,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_action(&mut self, action: InputAction, is_down: bool) {
        if is_down && !self.held.is_down(action) {
            self.pressed_edges.set(action, true);
        }
        self.held.set(action, is_down);
    }

    pub fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot {
            held: self.held,
            pressed: self.pressed_edges,
        };
        self.pressed_edges = ActionStates::default();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new();
        input.set_action(InputAction::EnterExit, true);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::EnterExit));
        assert!(!second.was_pressed(InputAction::EnterExit));
        assert!(second.is_down(InputAction::EnterExit));
    }

    #[test]
    fn held_key_does_not_spam_press_edges() {
        let mut input = InputCollector::new();

        input.set_action(InputAction::Hitch, true);
        let first = input.snapshot_for_tick();

        input.set_action(InputAction::Hitch, true);
        let second = input.snapshot_for_tick();

        input.set_action(InputAction::Hitch, false);
        input.set_action(InputAction::Hitch, true);
        let third = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::Hitch));
        assert!(!second.was_pressed(InputAction::Hitch));
        assert!(third.was_pressed(InputAction::Hitch));
    }

    #[test]
    fn release_clears_held_state() {
        let mut input = InputCollector::new();
        input.set_action(InputAction::MoveRight, true);
        input.set_action(InputAction::MoveRight, false);

        let snapshot = input.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::MoveRight));
        assert!(snapshot.was_pressed(InputAction::MoveRight));
    }

    #[test]
    fn pressed_builder_implies_held() {
        let snapshot = InputSnapshot::empty().with_action_pressed(InputAction::Till);
        assert!(snapshot.is_down(InputAction::Till));
        assert!(snapshot.was_pressed(InputAction::Till));
        assert!(!snapshot.is_down(InputAction::Plant));
    }

    #[test]
    fn all_actions_have_distinct_indices() {
        let mut seen = [false; ACTION_COUNT];
        for action in InputAction::ALL {
            assert!(!seen[action.index()], "{action:?} shares an index");
            seen[action.index()] = true;
        }
    }
}
