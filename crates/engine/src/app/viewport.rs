use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

pub fn world_to_screen(world: Vec2, camera: &Camera2D) -> Vec2 {
    Vec2 {
        x: world.x - camera.position.x,
        y: world.y - camera.position.y,
    }
}
