use engine::{InputAction, InputSnapshot};

use super::vehicles::Facing;

/// Abstract per-tick requests. Movement and jump are held states; the rest
/// are single-tick edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickIntents {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    pub enter_exit: bool,
    pub hitch: bool,
    pub till: bool,
    pub plant: bool,
    pub harvest: bool,
}

impl TickIntents {
    pub fn from_input(input: &InputSnapshot) -> Self {
        Self {
            move_left: input.is_down(InputAction::MoveLeft),
            move_right: input.is_down(InputAction::MoveRight),
            jump: input.is_down(InputAction::Jump),
            enter_exit: input.was_pressed(InputAction::EnterExit),
            hitch: input.was_pressed(InputAction::Hitch),
            till: input.was_pressed(InputAction::Till),
            plant: input.was_pressed(InputAction::Plant),
            harvest: input.was_pressed(InputAction::Harvest),
        }
    }

    /// Both directions held cancel out.
    pub fn direction(&self) -> Option<Facing> {
        match (self.move_left, self.move_right) {
            (true, false) => Some(Facing::Left),
            (false, true) => Some(Facing::Right),
            _ => None,
        }
    }

    pub fn horizontal(&self) -> f32 {
        self.direction().map_or(0.0, Facing::sign)
    }
}
