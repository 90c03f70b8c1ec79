use engine::{Aabb, Vec2};
use serde::{Deserialize, Serialize};

use super::world::WorldGrid;

/// Position, size and velocity shared by every collidable entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
}

impl Body {
    pub fn resting_on(x: f32, surface_y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y: surface_y - height,
            width,
            height,
            vx: 0.0,
            vy: 0.0,
            on_ground: true,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        self.aabb().center()
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.width, self.height, self.vx, self.vy]
            .iter()
            .all(|value| value.is_finite())
    }
}

/// Advances one body by one tick and pushes it out of solid tiles.
///
/// Every overlapped solid tile is resolved on its own, in row-major order,
/// along a single axis. There is no world floor: a body below the last row
/// keeps falling.
pub fn step_body(mut body: Body, world: &WorldGrid, gravity: f32) -> Body {
    body.vy += gravity;
    body.y += body.vy;
    body.x += body.vx;

    let max_x = (world.width_px() - body.width).max(0.0);
    body.x = body.x.clamp(0.0, max_x);
    body.on_ground = false;

    let left = world.pixel_to_tile(body.x);
    let right = world.pixel_to_tile(body.right());
    let top = world.pixel_to_tile(body.y);
    let bottom = world.pixel_to_tile(body.bottom());

    for tile_y in top..=bottom {
        for tile_x in left..=right {
            let Some(tile) = world.get_tile(tile_x, tile_y) else {
                continue;
            };
            if !tile.kind().is_solid() {
                continue;
            }
            let tile_rect = world.tile_rect(tile_x, tile_y);
            if !body.aabb().intersects(&tile_rect) {
                continue;
            }
            resolve_against(&mut body, &tile_rect);
        }
    }

    body
}

fn resolve_against(body: &mut Body, tile: &Aabb) {
    let bottom = body.bottom();
    if body.vy > 0.0 && bottom >= tile.y && bottom <= tile.bottom() {
        body.y = tile.y - body.height;
        body.vy = 0.0;
        body.on_ground = true;
    } else if body.vy < 0.0 {
        body.y = tile.bottom();
        body.vy = 0.0;
    } else if body.vx > 0.0 {
        body.x = tile.x - body.width;
        body.vx = 0.0;
    } else if body.vx < 0.0 {
        body.x = tile.right();
        body.vx = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::TimestampMs;
    use crate::sim::config::SimConfig;
    use crate::sim::world::{CropKind, Tile, TileKind};

    use super::*;

    const TS: f32 = 32.0;

    fn world() -> WorldGrid {
        // 10x10 tiles, ground row 7.
        WorldGrid::generate(&SimConfig {
            world_width_tiles: 10,
            world_height_tiles: 10,
            ..SimConfig::default()
        })
    }

    fn overlaps_solid(body: &Body, world: &WorldGrid) -> bool {
        (0..world.height() as i64).any(|y| {
            (0..world.width() as i64).any(|x| {
                world
                    .get_tile(x, y)
                    .is_some_and(|tile| tile.kind().is_solid())
                    && body.aabb().intersects(&world.tile_rect(x, y))
            })
        })
    }

    #[test]
    fn falling_body_lands_on_ground_row() {
        let world = world();
        let mut body = Body {
            x: 64.0,
            y: 7.0 * TS - 40.0 - 6.0,
            width: 24.0,
            height: 40.0,
            ..Body::default()
        };
        for _ in 0..20 {
            body = step_body(body, &world, 0.5);
        }
        assert!(body.on_ground);
        assert_eq!(body.bottom(), 7.0 * TS);
        assert_eq!(body.vy, 0.0);
        assert!(!overlaps_solid(&body, &world));
    }

    #[test]
    fn resting_body_stays_grounded() {
        let world = world();
        let body = Body::resting_on(100.0, world.ground_surface_y(), 24.0, 40.0);
        let next = step_body(body, &world, 0.5);
        assert!(next.on_ground);
        assert_eq!(next.y, body.y);
        assert!(!overlaps_solid(&next, &world));
    }

    #[test]
    fn x_is_clamped_to_world_walls() {
        let world = world();
        let mut body = Body::resting_on(2.0, world.ground_surface_y(), 24.0, 40.0);
        body.vx = -10.0;
        assert_eq!(step_body(body, &world, 0.5).x, 0.0);

        body.x = world.width_px() - 30.0;
        body.vx = 50.0;
        assert_eq!(step_body(body, &world, 0.5).x, world.width_px() - 24.0);
    }

    #[test]
    fn moving_into_wall_snaps_to_its_left_edge() {
        let mut world = world();
        // Two-high wall at column 5 standing on the ground.
        world.set_tile(5, 6, Tile::bare(TileKind::Dirt));
        world.set_tile(5, 5, Tile::bare(TileKind::Dirt));
        let mut body = Body::resting_on(5.0 * TS - 26.0, world.ground_surface_y(), 24.0, 40.0);
        body.vx = 4.0;

        let next = step_body(body, &world, 0.0);
        assert_eq!(next.x, 5.0 * TS - 24.0);
        assert_eq!(next.vx, 0.0);
        assert!(!overlaps_solid(&next, &world));
    }

    #[test]
    fn rising_body_snaps_below_ceiling() {
        let mut world = world();
        world.set_tile(2, 3, Tile::bare(TileKind::Dirt));
        let mut body = Body {
            x: 2.0 * TS + 4.0,
            y: 4.0 * TS + 2.0,
            width: 24.0,
            height: 40.0,
            vy: -8.0,
            ..Body::default()
        };
        body = step_body(body, &world, 0.5);
        assert_eq!(body.y, 4.0 * TS);
        assert_eq!(body.vy, 0.0);
        assert!(!body.on_ground);
    }

    #[test]
    fn body_below_every_row_keeps_falling() {
        let world = world();
        let mut body = Body {
            x: 32.0,
            y: world.height_px() + 10.0,
            width: 24.0,
            height: 40.0,
            ..Body::default()
        };
        let start_y = body.y;
        for _ in 0..5 {
            body = step_body(body, &world, 0.5);
        }
        assert!(body.y > start_y);
        assert!(!body.on_ground);
    }

    #[test]
    fn crops_are_solid_like_soil() {
        let mut world = world();
        world.set_tile(3, 7, Tile::planted(CropKind::Wheat, TimestampMs(0)));
        let body = Body {
            x: 3.0 * TS,
            y: 7.0 * TS - 40.0,
            width: 24.0,
            height: 40.0,
            ..Body::default()
        };
        let next = step_body(body, &world, 0.5);
        assert!(next.on_ground);
        assert_eq!(next.bottom(), 7.0 * TS);
    }
}
