use serde::{Deserialize, Serialize};

use super::config::PlayerConfig;
use super::error::ActionError;
use super::physics::Body;
use super::vehicles::VehicleId;
use super::world::{CropKind, WorldGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    WheatSeeds,
    CornSeeds,
    CarrotSeeds,
    Wheat,
    Corn,
    Carrot,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        Self::WheatSeeds,
        Self::CornSeeds,
        Self::CarrotSeeds,
        Self::Wheat,
        Self::Corn,
        Self::Carrot,
    ];

    pub fn seeds(kind: CropKind) -> Self {
        match kind {
            CropKind::Wheat => Self::WheatSeeds,
            CropKind::Corn => Self::CornSeeds,
            CropKind::Carrot => Self::CarrotSeeds,
        }
    }

    pub fn harvested(kind: CropKind) -> Self {
        match kind {
            CropKind::Wheat => Self::Wheat,
            CropKind::Corn => Self::Corn,
            CropKind::Carrot => Self::Carrot,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Counts for the six fixed resource kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    counts: [u32; 6],
}

impl Inventory {
    pub fn count(&self, kind: ResourceKind) -> u32 {
        self.counts[kind.slot()]
    }

    pub(crate) fn set(&mut self, kind: ResourceKind, count: u32) {
        self.counts[kind.slot()] = count;
    }

    /// Adds `amount` unless that would push the stack past `cap`.
    pub fn try_add(&mut self, kind: ResourceKind, amount: u32, cap: u32) -> Result<(), ActionError> {
        let current = self.count(kind);
        match current.checked_add(amount) {
            Some(total) if total <= cap => {
                self.set(kind, total);
                Ok(())
            }
            _ => Err(ActionError::StorageFull),
        }
    }

    pub fn try_remove(&mut self, kind: ResourceKind, amount: u32) -> bool {
        let current = self.count(kind);
        if current < amount {
            return false;
        }
        self.set(kind, current - amount);
        true
    }

    pub fn take_all(&mut self, kind: ResourceKind) -> u32 {
        std::mem::take(&mut self.counts[kind.slot()])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub body: Body,
    pub inventory: Inventory,
    pub money: u64,
    pub max_storage: u32,
    pub silo_built: bool,
    pub riding: Option<VehicleId>,
}

impl Player {
    pub fn spawn(config: &PlayerConfig, x: f32, surface_y: f32) -> Self {
        let mut inventory = Inventory::default();
        inventory.set(ResourceKind::WheatSeeds, config.starting_seeds);
        Self {
            body: Body::resting_on(x, surface_y, config.width, config.height),
            inventory,
            money: config.start_money,
            max_storage: config.max_storage,
            silo_built: false,
            riding: None,
        }
    }

    /// Walk/jump velocity for a player on foot.
    pub fn apply_walk_input(&mut self, direction: f32, jump: bool, config: &PlayerConfig) {
        self.body.vx = direction * config.speed;
        if jump && self.body.on_ground {
            self.body.vy = -config.jump_velocity;
            self.body.on_ground = false;
        }
    }

    /// Tile under the player's horizontal centre, in the row the feet rest on.
    pub fn target_tile(&self, world: &WorldGrid) -> (i64, i64) {
        let center = self.body.center();
        (
            world.pixel_to_tile(center.x),
            world.pixel_to_tile(self.body.bottom() + 0.5),
        )
    }
}
