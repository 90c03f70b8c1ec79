use std::ops::RangeInclusive;

use crate::clock::TimestampMs;

use super::crops;
use super::error::ActionError;
use super::physics::Body;
use super::player::Inventory;
use super::vehicles::Facing;
use super::world::{CropKind, WorldGrid};

/// Tile row a resting implement works on: the one its bottom edge sits on.
pub fn work_row(world: &WorldGrid, body: &Body) -> i64 {
    world.pixel_to_tile(body.bottom() + 0.5)
}

/// `width` columns centred under the body.
pub fn footprint_columns(world: &WorldGrid, body: &Body, width: u32) -> RangeInclusive<i64> {
    let width = i64::from(width.max(1));
    let centre = world.pixel_to_tile(body.center().x);
    let start = centre - (width - 1) / 2;
    start..=start + width - 1
}

/// `width` columns just in front of the body's leading edge.
pub fn header_columns(
    world: &WorldGrid,
    body: &Body,
    facing: Facing,
    width: u32,
) -> RangeInclusive<i64> {
    let width = i64::from(width.max(1));
    match facing {
        Facing::Right => {
            let start = world.pixel_to_tile(body.right());
            start..=start + width - 1
        }
        Facing::Left => {
            let end = (body.x / world.tile_size()).ceil() as i64 - 1;
            end - width + 1..=end
        }
    }
}

pub type WorkedTiles = Vec<(i64, i64)>;

pub fn run_plow(world: &mut WorldGrid, plow: &Body, footprint: u32) -> WorkedTiles {
    let row = work_row(world, plow);
    footprint_columns(world, plow, footprint)
        .filter(|&column| crops::till(world, column, row).is_ok())
        .map(|column| (column, row))
        .collect()
}

#[derive(Debug, Default, PartialEq)]
pub struct SeederOutcome {
    pub planted: WorkedTiles,
    pub out_of_seeds: bool,
}

pub fn run_seeder(
    world: &mut WorldGrid,
    seeder: &Body,
    footprint: u32,
    kind: CropKind,
    inventory: &mut Inventory,
    now: TimestampMs,
) -> SeederOutcome {
    let row = work_row(world, seeder);
    let mut outcome = SeederOutcome::default();
    for column in footprint_columns(world, seeder, footprint) {
        match crops::plant(world, column, row, kind, inventory, now) {
            Ok(()) => outcome.planted.push((column, row)),
            Err(ActionError::NoSeeds(_)) => {
                outcome.out_of_seeds = true;
                break;
            }
            Err(_) => {}
        }
    }
    outcome
}

#[derive(Debug, Default, PartialEq)]
pub struct CombineOutcome {
    pub harvested: Vec<(i64, i64, CropKind)>,
    pub storage_full: bool,
}

pub fn run_combine(
    world: &mut WorldGrid,
    combine: &Body,
    facing: Facing,
    header_width: u32,
    inventory: &mut Inventory,
    max_storage: u32,
) -> CombineOutcome {
    let row = work_row(world, combine);
    let mut outcome = CombineOutcome::default();
    for column in header_columns(world, combine, facing, header_width) {
        match crops::harvest(world, column, row, inventory, max_storage) {
            Ok(kind) => outcome.harvested.push((column, row, kind)),
            Err(ActionError::StorageFull) => outcome.storage_full = true,
            Err(_) => {}
        }
    }
    outcome
}
