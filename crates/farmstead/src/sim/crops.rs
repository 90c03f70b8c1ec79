use crate::clock::TimestampMs;

use super::error::ActionError;
use super::player::{Inventory, ResourceKind};
use super::world::{CropKind, CropStage, Tile, TileKind, WorldGrid};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrowthReport {
    pub advanced: u32,
    pub matured: u32,
}

/// One growth pass over every planted tile.
pub fn grow_crops(world: &mut WorldGrid, now: TimestampMs, stage_duration_ms: i64) -> GrowthReport {
    let mut report = GrowthReport::default();
    for (_, _, tile) in world.tiles_mut() {
        if tile.kind() != TileKind::CropPlanted {
            continue;
        }
        if tile.advance_growth(now, stage_duration_ms) {
            report.advanced += 1;
            if tile.kind() == TileKind::CropGrown {
                report.matured += 1;
            }
        }
    }
    report
}

pub fn till(world: &mut WorldGrid, x: i64, y: i64) -> Result<(), ActionError> {
    let tile = world.get_tile(x, y).ok_or(ActionError::OutOfBounds)?;
    if !matches!(tile.kind(), TileKind::Grass | TileKind::Dirt) {
        return Err(ActionError::NotTillable);
    }
    world.set_tile(x, y, Tile::tilled());
    Ok(())
}

/// Plants one seed of `kind` on empty tilled soil.
pub fn plant(
    world: &mut WorldGrid,
    x: i64,
    y: i64,
    kind: CropKind,
    inventory: &mut Inventory,
    now: TimestampMs,
) -> Result<(), ActionError> {
    let tile = world.get_tile(x, y).ok_or(ActionError::OutOfBounds)?;
    if tile.kind() != TileKind::Tilled || tile.crop().is_some() {
        return Err(ActionError::NotPlantable);
    }
    if !inventory.try_remove(ResourceKind::seeds(kind), 1) {
        return Err(ActionError::NoSeeds(kind));
    }
    world.set_tile(x, y, Tile::planted(kind, now));
    Ok(())
}

/// Clears a mature crop back to tilled soil and credits one unit, provided the
/// stack is below `max_storage`.
pub fn harvest(
    world: &mut WorldGrid,
    x: i64,
    y: i64,
    inventory: &mut Inventory,
    max_storage: u32,
) -> Result<CropKind, ActionError> {
    let tile = world.get_tile(x, y).ok_or(ActionError::OutOfBounds)?;
    let crop = match (tile.kind(), tile.crop()) {
        (TileKind::CropGrown, Some(crop)) if crop.stage == CropStage::Mature => *crop,
        _ => return Err(ActionError::NotHarvestable),
    };
    inventory.try_add(ResourceKind::harvested(crop.kind), 1, max_storage)?;
    world.set_tile(x, y, Tile::tilled());
    Ok(crop.kind)
}
