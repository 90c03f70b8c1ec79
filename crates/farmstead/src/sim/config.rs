use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::world::CropKind;

/// Every tunable number the simulation reads. Partial JSON files are valid:
/// missing fields keep their shipped value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub tile_size: f32,
    pub world_width_tiles: u32,
    pub world_height_tiles: u32,
    /// Fraction of the world height where the grass surface row sits.
    pub ground_fraction: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Pixels per tick squared.
    pub gravity: f32,
    pub time_of_day_per_tick: f32,
    pub start_time_of_day: f32,
    pub growth_time_per_stage_ms: i64,
    pub player: PlayerConfig,
    pub tractor: VehicleConfig,
    pub combine: VehicleConfig,
    pub plow: AttachmentConfig,
    pub seeder: AttachmentConfig,
    pub combine_header_tiles: u32,
    pub enter_range: f32,
    pub hitch_range: f32,
    pub hitch_gap: f32,
    pub economy: EconomyConfig,
    pub ambient: AmbientConfig,
    pub celestial_radius: f32,
    pub status_duration_ms: u32,
    /// Undrained status events kept before the oldest are dropped.
    pub status_queue_limit: usize,
    pub save_timeout_ticks: u64,
    pub load_timeout_ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub jump_velocity: f32,
    pub start_money: u64,
    pub max_storage: u32,
    pub starting_seeds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub max_fuel: f32,
    pub fuel_per_tick: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub width: f32,
    pub height: f32,
    pub footprint_tiles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropPrices {
    pub wheat: u64,
    pub corn: u64,
    pub carrot: u64,
}

impl CropPrices {
    pub fn for_kind(&self, kind: CropKind) -> u64 {
        match kind {
            CropKind::Wheat => self.wheat,
            CropKind::Corn => self.corn,
            CropKind::Carrot => self.carrot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub seed_prices: CropPrices,
    pub crop_prices: CropPrices,
    pub fuel_price: u64,
    pub upgrade_base_cost: u64,
    pub upgrade_speed_bonus: f32,
    pub upgrade_fuel_bonus: f32,
    pub silo_cost: u64,
    pub silo_capacity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub cloud_count: u32,
    pub spawn_interval_min_s: f32,
    pub spawn_interval_max_s: f32,
    pub bird_weight: u32,
    pub plane_weight: u32,
    pub balloon_weight: u32,
    pub particle_lifetime_s: f32,
    pub particle_gravity_factor: f32,
    pub burst_size: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed_f4a3,
            tile_size: 32.0,
            world_width_tiles: 120,
            world_height_tiles: 30,
            ground_fraction: 0.75,
            viewport_width: 1280,
            viewport_height: 720,
            gravity: 0.5,
            // One in-game day every ten minutes at 60 ticks per second.
            time_of_day_per_tick: 24.0 / 36_000.0,
            start_time_of_day: 8.0,
            growth_time_per_stage_ms: 30_000,
            player: PlayerConfig::default(),
            tractor: VehicleConfig {
                width: 96.0,
                height: 56.0,
                speed: 3.0,
                max_fuel: 100.0,
                fuel_per_tick: 0.05,
            },
            combine: VehicleConfig {
                width: 128.0,
                height: 80.0,
                speed: 2.5,
                max_fuel: 150.0,
                fuel_per_tick: 0.08,
            },
            plow: AttachmentConfig {
                width: 48.0,
                height: 24.0,
                footprint_tiles: 2,
            },
            seeder: AttachmentConfig {
                width: 48.0,
                height: 32.0,
                footprint_tiles: 2,
            },
            combine_header_tiles: 2,
            enter_range: 120.0,
            hitch_range: 160.0,
            hitch_gap: 4.0,
            economy: EconomyConfig::default(),
            ambient: AmbientConfig::default(),
            celestial_radius: 30.0,
            status_duration_ms: 2_500,
            status_queue_limit: 64,
            save_timeout_ticks: 300,
            load_timeout_ticks: 300,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            width: 24.0,
            height: 40.0,
            speed: 4.0,
            jump_velocity: 10.0,
            start_money: 100,
            max_storage: 50,
            starting_seeds: 10,
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        SimConfig::default().tractor
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            width: 48.0,
            height: 24.0,
            footprint_tiles: 2,
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            seed_prices: CropPrices {
                wheat: 5,
                corn: 8,
                carrot: 6,
            },
            crop_prices: CropPrices {
                wheat: 12,
                corn: 20,
                carrot: 15,
            },
            fuel_price: 1,
            upgrade_base_cost: 200,
            upgrade_speed_bonus: 0.2,
            upgrade_fuel_bonus: 25.0,
            silo_cost: 500,
            silo_capacity: 100,
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            cloud_count: 8,
            spawn_interval_min_s: 4.0,
            spawn_interval_max_s: 12.0,
            bird_weight: 6,
            plane_weight: 2,
            balloon_weight: 2,
            particle_lifetime_s: 0.8,
            particle_gravity_factor: 0.1,
            burst_size: 8,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: SimConfig = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                ConfigError::Parse {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Row index of the grass surface.
    pub fn ground_row(&self) -> u32 {
        ((self.world_height_tiles as f32) * self.ground_fraction).floor() as u32
    }

    pub fn world_width_px(&self) -> f32 {
        self.world_width_tiles as f32 * self.tile_size
    }

    pub fn world_height_px(&self) -> f32 {
        self.world_height_tiles as f32 * self.tile_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("tile_size", self.tile_size)?;
        if self.world_width_tiles < 4 || self.world_height_tiles < 4 {
            return Err(invalid(
                "world_width_tiles",
                format!(
                    "world must be at least 4x4 tiles, got {}x{}",
                    self.world_width_tiles, self.world_height_tiles
                ),
            ));
        }
        if !(self.ground_fraction > 0.0 && self.ground_fraction < 1.0) {
            return Err(invalid(
                "ground_fraction",
                format!("expected a value in (0, 1), got {}", self.ground_fraction),
            ));
        }
        if self.ground_row() >= self.world_height_tiles {
            return Err(invalid(
                "ground_fraction",
                "ground row falls outside the world".to_string(),
            ));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(invalid("viewport_width", "viewport must be non-empty".to_string()));
        }
        non_negative("gravity", self.gravity)?;
        if !(self.time_of_day_per_tick > 0.0 && self.time_of_day_per_tick < 24.0) {
            return Err(invalid(
                "time_of_day_per_tick",
                format!("expected a value in (0, 24), got {}", self.time_of_day_per_tick),
            ));
        }
        if !(0.0..24.0).contains(&self.start_time_of_day) {
            return Err(invalid(
                "start_time_of_day",
                format!("expected a value in [0, 24), got {}", self.start_time_of_day),
            ));
        }
        if self.growth_time_per_stage_ms <= 0 {
            return Err(invalid(
                "growth_time_per_stage_ms",
                format!("expected > 0, got {}", self.growth_time_per_stage_ms),
            ));
        }

        positive("player.width", self.player.width)?;
        positive("player.height", self.player.height)?;
        non_negative("player.speed", self.player.speed)?;
        non_negative("player.jump_velocity", self.player.jump_velocity)?;
        if self.player.max_storage == 0 {
            return Err(invalid("player.max_storage", "expected > 0".to_string()));
        }
        if self.player.starting_seeds > self.player.max_storage {
            return Err(invalid(
                "player.starting_seeds",
                format!(
                    "expected <= player.max_storage ({}), got {}",
                    self.player.max_storage, self.player.starting_seeds
                ),
            ));
        }

        for (field, vehicle) in [("tractor", &self.tractor), ("combine", &self.combine)] {
            positive(field, vehicle.width)?;
            positive(field, vehicle.height)?;
            non_negative(field, vehicle.speed)?;
            positive(field, vehicle.max_fuel)?;
            non_negative(field, vehicle.fuel_per_tick)?;
        }
        for (field, attachment) in [("plow", &self.plow), ("seeder", &self.seeder)] {
            positive(field, attachment.width)?;
            positive(field, attachment.height)?;
            if attachment.footprint_tiles == 0 {
                return Err(invalid(field, "footprint_tiles must be >= 1".to_string()));
            }
        }
        if self.combine_header_tiles == 0 {
            return Err(invalid("combine_header_tiles", "expected >= 1".to_string()));
        }
        non_negative("enter_range", self.enter_range)?;
        non_negative("hitch_range", self.hitch_range)?;
        non_negative("hitch_gap", self.hitch_gap)?;
        non_negative("economy.upgrade_speed_bonus", self.economy.upgrade_speed_bonus)?;
        non_negative("economy.upgrade_fuel_bonus", self.economy.upgrade_fuel_bonus)?;

        let ambient = &self.ambient;
        positive("ambient.spawn_interval_min_s", ambient.spawn_interval_min_s)?;
        if !(ambient.spawn_interval_max_s >= ambient.spawn_interval_min_s) {
            return Err(invalid(
                "ambient.spawn_interval_max_s",
                format!(
                    "expected >= spawn_interval_min_s ({}), got {}",
                    ambient.spawn_interval_min_s, ambient.spawn_interval_max_s
                ),
            ));
        }
        if ambient.bird_weight + ambient.plane_weight + ambient.balloon_weight == 0 {
            return Err(invalid(
                "ambient.bird_weight",
                "at least one flying kind needs a non-zero weight".to_string(),
            ));
        }
        positive("ambient.particle_lifetime_s", ambient.particle_lifetime_s)?;
        non_negative("ambient.particle_gravity_factor", ambient.particle_gravity_factor)?;
        positive("celestial_radius", self.celestial_radius)?;
        if self.status_queue_limit == 0 {
            return Err(invalid("status_queue_limit", "expected >= 1".to_string()));
        }
        for (field, ticks) in [
            ("save_timeout_ticks", self.save_timeout_ticks),
            ("load_timeout_ticks", self.load_timeout_ticks),
        ] {
            if ticks == 0 {
                return Err(invalid(field, "expected >= 1".to_string()));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("expected finite value > 0, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("expected finite value >= 0, got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn shipped_defaults_validate() {
        let config = SimConfig::default();
        config.validate().expect("defaults valid");
        assert_eq!(config.ground_row(), 22);
        assert_eq!(config.world_width_px(), 3840.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SimConfig::from_json_str(r#"{ "seed": 7, "player": { "speed": 6.0 } }"#).expect("parse");
        assert_eq!(config.seed, 7);
        assert_eq!(config.player.speed, 6.0);
        assert_eq!(config.player.height, PlayerConfig::default().height);
        assert_eq!(config.tile_size, 32.0);
    }

    #[test]
    fn parse_error_reports_json_path() {
        let error = SimConfig::from_json_str(r#"{ "tractor": { "max_fuel": "lots" } }"#)
            .expect_err("type mismatch");
        match error {
            ConfigError::Parse { path, .. } => assert_eq!(path, "tractor.max_fuel"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_values_name_the_field() {
        let error = SimConfig::from_json_str(r#"{ "tile_size": 0.0 }"#).expect_err("invalid");
        assert!(matches!(error, ConfigError::Invalid { field: "tile_size", .. }));

        let error = SimConfig::from_json_str(
            r#"{ "ambient": { "spawn_interval_min_s": 5.0, "spawn_interval_max_s": 1.0 } }"#,
        )
        .expect_err("inverted spawn range");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                field: "ambient.spawn_interval_max_s",
                ..
            }
        ));
    }

    #[test]
    fn zero_queue_limit_and_timeouts_are_rejected() {
        for (json, field) in [
            (r#"{ "status_queue_limit": 0 }"#, "status_queue_limit"),
            (r#"{ "save_timeout_ticks": 0 }"#, "save_timeout_ticks"),
            (r#"{ "load_timeout_ticks": 0 }"#, "load_timeout_ticks"),
        ] {
            let error = SimConfig::from_json_str(json).expect_err("invalid");
            assert!(
                matches!(error, ConfigError::Invalid { field: got, .. } if got == field),
                "{json}"
            );
        }
    }

    #[test]
    fn load_reads_file_and_reports_missing_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("farm.json");
        fs::write(&path, r#"{ "world_width_tiles": 40 }"#).expect("write");
        assert_eq!(SimConfig::load(&path).expect("load").world_width_tiles, 40);

        let missing = SimConfig::load(&temp.path().join("absent.json")).expect_err("missing");
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
