use std::collections::{BTreeMap, HashMap};

use engine::{Camera2D, Vec2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::clock::TimestampMs;

use super::ambient::AmbientState;
use super::celestial::{CelestialState, HOURS_PER_DAY};
use super::error::SnapshotError;
use super::physics::Body;
use super::player::{Inventory, Player, ResourceKind};
use super::vehicles::{
    Attachment, AttachmentKind, EquipmentRef, Facing, Vehicle, VehicleId, VehicleKind,
};
use super::world::{Crop, CropKind, CropStage, Tile, TileKind, WorldGrid};
use super::Simulation;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to resume a session. Crop planting times are epoch
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub snapshot_version: u32,
    pub tick: u64,
    pub world: SavedWorld,
    pub player: SavedPlayer,
    pub vehicles: Vec<SavedVehicle>,
    pub attachments: Vec<SavedAttachment>,
    pub ambient: AmbientState,
    pub game_time_of_day: f32,
    pub camera_position: SavedVec2,
    pub selected_crop: CropKind,
    pub celestial: CelestialState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedVec2 {
    pub x: f32,
    pub y: f32,
}

impl SavedVec2 {
    fn from_vec2(value: Vec2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }

    fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedWorld {
    pub width: u32,
    pub height: u32,
    pub tile_size: f32,
    pub ground_row: u32,
    pub tiles: Vec<SavedTile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedTile {
    pub kind: TileKind,
    pub crop: Option<SavedCrop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedCrop {
    pub kind: CropKind,
    pub stage: CropStage,
    pub planted_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedPlayer {
    pub body: Body,
    pub inventory: BTreeMap<ResourceKind, u32>,
    pub money: u64,
    pub max_storage: u32,
    pub silo_built: bool,
    pub riding: Option<VehicleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedVehicle {
    pub kind: VehicleKind,
    pub body: Body,
    pub base_speed: f32,
    pub fuel: f32,
    pub max_fuel: f32,
    pub fuel_per_tick: f32,
    pub facing: Facing,
    pub occupied: bool,
    pub upgrade_level: u32,
    pub equipment: Option<EquipmentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAttachment {
    pub kind: AttachmentKind,
    pub body: Body,
    pub hitched: bool,
}

impl SimSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, SimSnapshot>(&mut deserializer).map_err(|error| {
            let path = error.path().to_string();
            SnapshotError::Parse {
                path: if path.is_empty() { ".".to_string() } else { path },
                source: error.into_inner(),
            }
        })
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }
}

impl Simulation {
    pub fn export_snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            snapshot_version: SNAPSHOT_VERSION,
            tick: self.tick,
            world: SavedWorld {
                width: self.world.width(),
                height: self.world.height(),
                tile_size: self.world.tile_size(),
                ground_row: self.world.ground_row(),
                tiles: self.world.tiles().iter().map(saved_tile).collect(),
            },
            player: SavedPlayer {
                body: self.player.body,
                inventory: self.player.inventory.iter().collect(),
                money: self.player.money,
                max_storage: self.player.max_storage,
                silo_built: self.player.silo_built,
                riding: self.player.riding,
            },
            vehicles: self.vehicles.iter().map(saved_vehicle).collect(),
            attachments: self
                .attachments
                .iter()
                .map(|attachment| SavedAttachment {
                    kind: attachment.kind,
                    body: attachment.body,
                    hitched: attachment.hitched,
                })
                .collect(),
            ambient: self.ambient.clone(),
            game_time_of_day: self.time_of_day,
            camera_position: SavedVec2::from_vec2(self.camera.position),
            selected_crop: self.selected_crop,
            celestial: self.celestial,
        }
    }

    pub fn snapshot_json(&self) -> Result<String, SnapshotError> {
        self.export_snapshot().to_json()
    }

    /// Replaces the session state with `snapshot`. On error nothing changes.
    pub fn import_snapshot(&mut self, snapshot: SimSnapshot) -> Result<(), SnapshotError> {
        validate_snapshot(&snapshot, self.config.tile_size)?;

        let tiles = snapshot
            .world
            .tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| restored_tile(index, tile))
            .collect::<Result<Vec<_>, _>>()?;
        let world = WorldGrid::from_tiles(
            snapshot.world.width,
            snapshot.world.height,
            tiles,
            snapshot.world.tile_size,
            snapshot.world.ground_row,
        )
        .map_err(|error| SnapshotError::validation("world.tiles", error.to_string()))?;

        let mut inventory = Inventory::default();
        for (kind, count) in &snapshot.player.inventory {
            inventory.set(*kind, *count);
        }

        self.world = world;
        self.player = Player {
            body: snapshot.player.body,
            inventory,
            money: snapshot.player.money,
            max_storage: snapshot.player.max_storage,
            silo_built: snapshot.player.silo_built,
            riding: snapshot.player.riding,
        };
        self.vehicles = snapshot.vehicles.into_iter().map(restored_vehicle).collect();
        self.attachments = snapshot
            .attachments
            .into_iter()
            .map(|saved| Attachment {
                kind: saved.kind,
                body: saved.body,
                hitched: saved.hitched,
            })
            .collect();
        self.ambient = snapshot.ambient;
        self.time_of_day = snapshot.game_time_of_day;
        self.camera = Camera2D {
            position: snapshot.camera_position.to_vec2(),
        };
        self.selected_crop = snapshot.selected_crop;
        self.celestial = snapshot.celestial;
        self.tick = snapshot.tick;
        info!(
            tick = self.tick,
            vehicles = self.vehicles.len(),
            attachments = self.attachments.len(),
            "snapshot_imported"
        );
        Ok(())
    }

    pub fn load_snapshot_json(&mut self, raw: &str) -> Result<(), SnapshotError> {
        let snapshot = SimSnapshot::from_json(raw)?;
        self.import_snapshot(snapshot)
    }
}

fn saved_tile(tile: &Tile) -> SavedTile {
    SavedTile {
        kind: tile.kind(),
        crop: tile.crop().map(|crop| SavedCrop {
            kind: crop.kind,
            stage: crop.stage,
            planted_at_ms: crop.planted_at.0,
        }),
    }
}

fn restored_tile(index: usize, saved: &SavedTile) -> Result<Tile, SnapshotError> {
    let crop = saved.crop.map(|crop| Crop {
        kind: crop.kind,
        stage: crop.stage,
        planted_at: TimestampMs(crop.planted_at_ms),
    });
    Tile::from_parts(saved.kind, crop).map_err(|error| {
        SnapshotError::validation(format!("world.tiles[{index}]"), error.to_string())
    })
}

fn saved_vehicle(vehicle: &Vehicle) -> SavedVehicle {
    SavedVehicle {
        kind: vehicle.kind,
        body: vehicle.body,
        base_speed: vehicle.base_speed,
        fuel: vehicle.fuel,
        max_fuel: vehicle.max_fuel,
        fuel_per_tick: vehicle.fuel_per_tick,
        facing: vehicle.facing,
        occupied: vehicle.occupied,
        upgrade_level: vehicle.upgrade_level,
        equipment: vehicle.equipment,
    }
}

fn restored_vehicle(saved: SavedVehicle) -> Vehicle {
    Vehicle {
        kind: saved.kind,
        body: saved.body,
        base_speed: saved.base_speed,
        fuel: saved.fuel,
        max_fuel: saved.max_fuel,
        fuel_per_tick: saved.fuel_per_tick,
        facing: saved.facing,
        occupied: saved.occupied,
        upgrade_level: saved.upgrade_level,
        equipment: saved.equipment,
    }
}

fn require_finite(path: &str, value: f32) -> Result<(), SnapshotError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SnapshotError::expected_actual(path, "finite number", value))
    }
}

fn validate_body(path: &str, body: &Body) -> Result<(), SnapshotError> {
    if !body.is_finite() {
        return Err(SnapshotError::validation(path, "body has a non-finite field"));
    }
    if body.width <= 0.0 || body.height <= 0.0 {
        return Err(SnapshotError::expected_actual(
            path,
            "positive width and height",
            format!("{}x{}", body.width, body.height),
        ));
    }
    Ok(())
}

fn validate_snapshot(snapshot: &SimSnapshot, tile_size: f32) -> Result<(), SnapshotError> {
    if snapshot.snapshot_version != SNAPSHOT_VERSION {
        return Err(SnapshotError::expected_actual(
            "snapshot_version",
            SNAPSHOT_VERSION,
            snapshot.snapshot_version,
        ));
    }

    let world = &snapshot.world;
    if world.tile_size != tile_size {
        return Err(SnapshotError::expected_actual(
            "world.tile_size",
            tile_size,
            world.tile_size,
        ));
    }
    if world.width == 0 || world.height == 0 {
        return Err(SnapshotError::expected_actual(
            "world.width",
            "non-empty grid",
            format!("{}x{}", world.width, world.height),
        ));
    }
    if world.ground_row >= world.height {
        return Err(SnapshotError::expected_actual(
            "world.ground_row",
            format!("< {}", world.height),
            world.ground_row,
        ));
    }
    let expected_tiles = world.width as usize * world.height as usize;
    if world.tiles.len() != expected_tiles {
        return Err(SnapshotError::expected_actual(
            "world.tiles",
            format!("{expected_tiles} tiles"),
            world.tiles.len(),
        ));
    }

    let time = snapshot.game_time_of_day;
    if !(time.is_finite() && (0.0..HOURS_PER_DAY).contains(&time)) {
        return Err(SnapshotError::expected_actual(
            "game_time_of_day",
            "value in [0, 24)",
            time,
        ));
    }
    require_finite("camera_position.x", snapshot.camera_position.x)?;
    require_finite("camera_position.y", snapshot.camera_position.y)?;

    let player = &snapshot.player;
    validate_body("player.body", &player.body)?;
    for (kind, count) in &player.inventory {
        if *count > player.max_storage {
            return Err(SnapshotError::expected_actual(
                format!("player.inventory.{kind:?}"),
                format!("<= max_storage ({})", player.max_storage),
                count,
            ));
        }
    }

    let mut towed_by: HashMap<usize, usize> = HashMap::new();
    let mut occupied = Vec::new();
    for (index, vehicle) in snapshot.vehicles.iter().enumerate() {
        let path = format!("vehicles[{index}]");
        validate_body(&format!("{path}.body"), &vehicle.body)?;
        for (field, value) in [
            ("base_speed", vehicle.base_speed),
            ("fuel_per_tick", vehicle.fuel_per_tick),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SnapshotError::expected_actual(
                    format!("{path}.{field}"),
                    "finite value >= 0",
                    value,
                ));
            }
        }
        if !(vehicle.max_fuel.is_finite() && vehicle.max_fuel > 0.0) {
            return Err(SnapshotError::expected_actual(
                format!("{path}.max_fuel"),
                "finite value > 0",
                vehicle.max_fuel,
            ));
        }
        if !(vehicle.fuel.is_finite() && (0.0..=vehicle.max_fuel).contains(&vehicle.fuel)) {
            return Err(SnapshotError::expected_actual(
                format!("{path}.fuel"),
                format!("value in [0, {}]", vehicle.max_fuel),
                vehicle.fuel,
            ));
        }
        if vehicle.occupied {
            occupied.push(index);
        }
        if let Some(equipment) = vehicle.equipment {
            let equipment_path = format!("{path}.equipment");
            if vehicle.kind != VehicleKind::Tractor {
                return Err(SnapshotError::validation(
                    equipment_path,
                    format!("{:?} cannot tow equipment", vehicle.kind),
                ));
            }
            let Some(attachment) = snapshot.attachments.get(equipment.id.0) else {
                return Err(SnapshotError::expected_actual(
                    format!("{equipment_path}.id"),
                    format!("< {}", snapshot.attachments.len()),
                    equipment.id.0,
                ));
            };
            if attachment.kind != equipment.kind {
                return Err(SnapshotError::expected_actual(
                    format!("{equipment_path}.kind"),
                    format!("{:?}", attachment.kind),
                    format!("{:?}", equipment.kind),
                ));
            }
            if let Some(first) = towed_by.insert(equipment.id.0, index) {
                return Err(SnapshotError::validation(
                    format!("{equipment_path}.id"),
                    format!(
                        "attachment {} already towed by vehicles[{first}]",
                        equipment.id.0
                    ),
                ));
            }
        }
    }

    for (index, attachment) in snapshot.attachments.iter().enumerate() {
        let path = format!("attachments[{index}]");
        validate_body(&format!("{path}.body"), &attachment.body)?;
        if attachment.hitched != towed_by.contains_key(&index) {
            return Err(SnapshotError::expected_actual(
                format!("{path}.hitched"),
                towed_by.contains_key(&index),
                attachment.hitched,
            ));
        }
    }

    let riding_index = player.riding.map(|id| id.0);
    if let Some(index) = riding_index {
        if index >= snapshot.vehicles.len() {
            return Err(SnapshotError::expected_actual(
                "player.riding",
                format!("< {}", snapshot.vehicles.len()),
                index,
            ));
        }
    }
    let expected_occupied: Vec<usize> = riding_index.into_iter().collect();
    if occupied != expected_occupied {
        return Err(SnapshotError::expected_actual(
            "vehicles[*].occupied",
            format!("occupied vehicles {expected_occupied:?}"),
            format!("{occupied:?}"),
        ));
    }

    for (index, particle) in snapshot.ambient.particles.iter().enumerate() {
        if !(particle.lifetime_s.is_finite() && particle.lifetime_s > 0.0) {
            return Err(SnapshotError::expected_actual(
                format!("ambient.particles[{index}].lifetime_s"),
                "finite value > 0",
                particle.lifetime_s,
            ));
        }
    }
    let spawner = &snapshot.ambient.spawner;
    require_finite("ambient.spawner.since_last_s", spawner.since_last_s)?;
    require_finite("ambient.spawner.next_interval_s", spawner.next_interval_s)?;
    Ok(())
}
