use engine::{world_to_screen, Camera2D, Vec2, Viewport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::clock::TimestampMs;

pub mod ambient;
pub mod celestial;
pub mod config;
pub mod crops;
pub mod economy;
pub mod error;
pub mod field;
pub mod intents;
pub mod physics;
pub mod player;
pub mod snapshot;
pub mod status;
pub mod vehicles;
pub mod world;

pub use ambient::{AmbientState, FlyingKind, ParticleKind, SkyBounds};
pub use celestial::{CelestialState, Rgb, SkyArc};
pub use config::SimConfig;
pub use crops::GrowthReport;
pub use error::{ActionError, ConfigError, SnapshotError};
pub use intents::TickIntents;
pub use physics::Body;
pub use player::{Inventory, Player, ResourceKind};
pub use snapshot::{SimSnapshot, SNAPSHOT_VERSION};
pub use status::{FeedbackEvent, StatusFeed, StatusLatch};
pub use vehicles::{
    Attachment, AttachmentId, AttachmentKind, EquipmentRef, Facing, HitchChange, Vehicle,
    VehicleId, VehicleKind,
};
pub use world::{Crop, CropKind, CropStage, Tile, TileKind, WorldGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStage {
    AdvanceTime,
    ApplyControl,
    Physics,
    Attachments,
    AnchorRider,
    FieldActions,
    CropGrowth,
    Environment,
    Camera,
}

impl SimStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::AdvanceTime => "AdvanceTime",
            Self::ApplyControl => "ApplyControl",
            Self::Physics => "Physics",
            Self::Attachments => "Attachments",
            Self::AnchorRider => "AnchorRider",
            Self::FieldActions => "FieldActions",
            Self::CropGrowth => "CropGrowth",
            Self::Environment => "Environment",
            Self::Camera => "Camera",
        }
    }
}

pub const TICK_ORDER: [SimStage; 9] = [
    SimStage::AdvanceTime,
    SimStage::ApplyControl,
    SimStage::Physics,
    SimStage::Attachments,
    SimStage::AnchorRider,
    SimStage::FieldActions,
    SimStage::CropGrowth,
    SimStage::Environment,
    SimStage::Camera,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlledEntity {
    Player,
    Vehicle(VehicleId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub growth: GrowthReport,
    pub spawned: Option<FlyingKind>,
}

#[derive(Debug, Clone, Copy)]
enum ManualAction {
    Till,
    Plant,
    Harvest,
}

/// The whole simulation state, advanced one tick at a time by [`Simulation::tick`].
#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    world: WorldGrid,
    player: Player,
    vehicles: Vec<Vehicle>,
    attachments: Vec<Attachment>,
    ambient: AmbientState,
    celestial: CelestialState,
    time_of_day: f32,
    camera: Camera2D,
    selected_crop: CropKind,
    tick: u64,
    rng: ChaCha8Rng,
    status: StatusFeed,
    last_tick_order: Vec<SimStage>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let world = WorldGrid::generate(&config);
        let surface = world.ground_surface_y();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let spot = |tile: u32, width: f32| -> f32 {
            (tile as f32 * config.tile_size).min((world.width_px() - width).max(0.0))
        };
        let player = Player::spawn(&config.player, spot(4, config.player.width), surface);
        let vehicles = vec![
            Vehicle::new(
                VehicleKind::Tractor,
                &config.tractor,
                spot(8, config.tractor.width),
                surface,
            ),
            Vehicle::new(
                VehicleKind::Combine,
                &config.combine,
                spot(22, config.combine.width),
                surface,
            ),
        ];
        let attachments = vec![
            Attachment::new(
                AttachmentKind::Plow,
                config.plow.width,
                config.plow.height,
                spot(12, config.plow.width),
                surface,
            ),
            Attachment::new(
                AttachmentKind::Seeder,
                config.seeder.width,
                config.seeder.height,
                spot(15, config.seeder.width),
                surface,
            ),
        ];
        let ambient = AmbientState::new(&config.ambient, sky_bounds(&world), &mut rng);

        let mut simulation = Self {
            world,
            player,
            vehicles,
            attachments,
            ambient,
            celestial: CelestialState::default(),
            time_of_day: config.start_time_of_day,
            camera: Camera2D::default(),
            selected_crop: CropKind::Wheat,
            tick: 0,
            rng,
            status: StatusFeed::new(config.status_duration_ms, config.status_queue_limit),
            last_tick_order: Vec::with_capacity(TICK_ORDER.len()),
            config,
        };
        simulation.update_celestial();
        simulation.update_camera();
        info!(
            width = simulation.world.width(),
            height = simulation.world.height(),
            ground_row = simulation.world.ground_row(),
            seed = simulation.config.seed,
            "world_generated"
        );
        Ok(simulation)
    }

    /// Runs every stage once, in [`TICK_ORDER`]. Invalid requests become
    /// status events; nothing in here fails.
    pub fn tick(
        &mut self,
        intents: &TickIntents,
        now: TimestampMs,
        fixed_dt_seconds: f32,
    ) -> TickReport {
        let mut report = TickReport::default();
        self.last_tick_order.clear();
        for stage in TICK_ORDER {
            self.last_tick_order.push(stage);
            match stage {
                SimStage::AdvanceTime => self.advance_time(),
                SimStage::ApplyControl => self.apply_control(intents, now),
                SimStage::Physics => self.run_physics(),
                SimStage::Attachments => self.place_attachments(),
                SimStage::AnchorRider => self.anchor_rider(),
                SimStage::FieldActions => self.run_field_actions(now),
                SimStage::CropGrowth => {
                    report.growth = crops::grow_crops(
                        &mut self.world,
                        now,
                        self.config.growth_time_per_stage_ms,
                    );
                    if report.growth.matured > 0 {
                        debug!(matured = report.growth.matured, "crops_matured");
                    }
                }
                SimStage::Environment => report.spawned = self.update_environment(fixed_dt_seconds),
                SimStage::Camera => self.update_camera(),
            }
        }
        self.status.end_tick();
        self.tick = self.tick.saturating_add(1);
        report
    }

    fn advance_time(&mut self) {
        self.time_of_day =
            celestial::wrap_hours(self.time_of_day + self.config.time_of_day_per_tick);
    }

    fn apply_control(&mut self, intents: &TickIntents, now: TimestampMs) {
        if intents.enter_exit {
            self.toggle_vehicle();
        }
        if intents.hitch {
            self.toggle_hitch();
        }
        for (requested, action) in [
            (intents.till, ManualAction::Till),
            (intents.plant, ManualAction::Plant),
            (intents.harvest, ManualAction::Harvest),
        ] {
            if requested {
                self.manual_action(action, now);
            }
        }

        match self.controlled() {
            ControlledEntity::Player => {
                self.player
                    .apply_walk_input(intents.horizontal(), intents.jump, &self.config.player);
            }
            ControlledEntity::Vehicle(id) => {
                let bonus = self.config.economy.upgrade_speed_bonus;
                let Some(vehicle) = self.vehicles.get_mut(id.0) else {
                    return;
                };
                if let Err(error) = vehicle.apply_drive_input(intents.direction(), bonus) {
                    self.status
                        .toast_latched(StatusLatch::OutOfFuel(id), error.to_string());
                }
            }
        }
    }

    fn toggle_vehicle(&mut self) {
        if self.player.riding.is_some() {
            let ground = self.world.ground_surface_y();
            if let Some(id) = vehicles::exit_vehicle(&mut self.player, &mut self.vehicles, ground) {
                info!(vehicle = id.0, "vehicle_exited");
            }
            return;
        }
        match vehicles::enter_nearest(&mut self.player, &mut self.vehicles, self.config.enter_range)
        {
            Ok(id) => info!(vehicle = id.0, "vehicle_entered"),
            Err(error) => self.status.toast(error.to_string()),
        }
    }

    fn toggle_hitch(&mut self) {
        let tractor = self
            .player
            .riding
            .and_then(|id| self.vehicles.get_mut(id.0));
        let result = match tractor {
            Some(tractor) => {
                vehicles::toggle_hitch(tractor, &mut self.attachments, self.config.hitch_range)
            }
            None => Err(ActionError::NotDrivingTractor),
        };
        match result {
            Ok(HitchChange::Hitched(equipment)) => {
                info!(attachment = equipment.id.0, "attachment_hitched");
                self.status
                    .toast(format!("{} hitched", equipment.kind.name()));
            }
            Ok(HitchChange::Unhitched(equipment)) => {
                info!(attachment = equipment.id.0, "attachment_unhitched");
                self.status
                    .toast(format!("{} unhitched", equipment.kind.name()));
            }
            Err(error) => self.status.toast(error.to_string()),
        }
    }

    fn manual_action(&mut self, action: ManualAction, now: TimestampMs) {
        if self.player.riding.is_some() {
            self.status.toast(ActionError::RidingVehicle.to_string());
            return;
        }
        let (x, y) = self.player.target_tile(&self.world);
        let result = match action {
            ManualAction::Till => crops::till(&mut self.world, x, y).map(|()| ParticleKind::Soil),
            ManualAction::Plant => crops::plant(
                &mut self.world,
                x,
                y,
                self.selected_crop,
                &mut self.player.inventory,
                now,
            )
            .map(|()| ParticleKind::Seed),
            ManualAction::Harvest => crops::harvest(
                &mut self.world,
                x,
                y,
                &mut self.player.inventory,
                self.player.max_storage,
            )
            .map(|_| ParticleKind::Harvest),
        };
        match result {
            Ok(kind) => self.burst_at_tile(kind, x, y),
            Err(error) => self.status.toast(error.to_string()),
        }
    }

    fn run_physics(&mut self) {
        let gravity = self.config.gravity;
        if self.player.riding.is_none() {
            self.player.body = physics::step_body(self.player.body, &self.world, gravity);
        }
        for vehicle in &mut self.vehicles {
            vehicle.body = physics::step_body(vehicle.body, &self.world, gravity);
        }
    }

    /// Towed attachments follow their tractor; everything else falls and
    /// collides on its own.
    fn place_attachments(&mut self) {
        let gravity = self.config.gravity;
        let gap = self.config.hitch_gap;
        for (index, attachment) in self.attachments.iter_mut().enumerate() {
            let tow = self.vehicles.iter().find(|vehicle| {
                vehicle.occupied
                    && vehicle.kind == VehicleKind::Tractor
                    && vehicle.equipment.is_some_and(|equipment| equipment.id.0 == index)
            });
            match tow {
                Some(tractor) if attachment.hitched => {
                    attachment.body =
                        vehicles::towed_body(&tractor.body, tractor.facing, &attachment.body, gap);
                }
                _ => {
                    attachment.body.vx = 0.0;
                    attachment.body = physics::step_body(attachment.body, &self.world, gravity);
                }
            }
        }
    }

    fn anchor_rider(&mut self) {
        let Some(vehicle) = self
            .player
            .riding
            .and_then(|id| self.vehicles.get(id.0))
        else {
            return;
        };
        let centre = vehicle.body.center();
        let body = &mut self.player.body;
        body.x = centre.x - body.width * 0.5;
        body.y = centre.y - body.height * 0.5;
        body.vx = 0.0;
        body.vy = 0.0;
        body.on_ground = vehicle.body.on_ground;
    }

    fn run_field_actions(&mut self, now: TimestampMs) {
        for index in 0..self.vehicles.len() {
            let vehicle = &self.vehicles[index];
            if !vehicle.occupied || vehicle.body.vx == 0.0 || !vehicle.has_fuel() {
                continue;
            }
            match vehicle.kind {
                VehicleKind::Tractor => {
                    if let Some(equipment) = vehicle.equipment {
                        self.run_implement(equipment, now);
                    }
                }
                VehicleKind::Combine => {
                    let body = vehicle.body;
                    let facing = vehicle.facing;
                    self.run_header(&body, facing);
                }
            }
        }
    }

    fn run_implement(&mut self, equipment: EquipmentRef, now: TimestampMs) {
        let Some(attachment) = self.attachments.get(equipment.id.0) else {
            return;
        };
        if !attachment.hitched {
            return;
        }
        let body = attachment.body;
        match equipment.kind {
            AttachmentKind::Plow => {
                let worked = field::run_plow(&mut self.world, &body, self.config.plow.footprint_tiles);
                for (x, y) in worked {
                    self.burst_at_tile(ParticleKind::Soil, x, y);
                }
            }
            AttachmentKind::Seeder => {
                let kind = self.selected_crop;
                let outcome = field::run_seeder(
                    &mut self.world,
                    &body,
                    self.config.seeder.footprint_tiles,
                    kind,
                    &mut self.player.inventory,
                    now,
                );
                for (x, y) in outcome.planted {
                    self.burst_at_tile(ParticleKind::Seed, x, y);
                }
                if outcome.out_of_seeds {
                    self.status.toast_latched(
                        StatusLatch::SeederEmpty,
                        ActionError::NoSeeds(kind).to_string(),
                    );
                }
            }
        }
    }

    fn run_header(&mut self, body: &Body, facing: Facing) {
        let outcome = field::run_combine(
            &mut self.world,
            body,
            facing,
            self.config.combine_header_tiles,
            &mut self.player.inventory,
            self.player.max_storage,
        );
        for (x, y, _) in outcome.harvested {
            self.burst_at_tile(ParticleKind::Harvest, x, y);
        }
        if outcome.storage_full {
            self.status.toast_latched(
                StatusLatch::CombineStorageFull,
                ActionError::StorageFull.to_string(),
            );
        }
    }

    fn burst_at_tile(&mut self, kind: ParticleKind, x: i64, y: i64) {
        let size = self.world.tile_size();
        let origin = Vec2::new(
            self.world.tile_to_pixel(x) + size * 0.5,
            self.world.tile_to_pixel(y),
        );
        self.ambient
            .emit_burst(kind, origin, size * 0.5, &self.config.ambient, &mut self.rng);
    }

    fn update_environment(&mut self, fixed_dt_seconds: f32) -> Option<FlyingKind> {
        self.update_celestial();
        let spawned = self.ambient.update(
            fixed_dt_seconds,
            &self.config.ambient,
            sky_bounds(&self.world),
            self.config.gravity,
            &mut self.rng,
        );
        if let Some(kind) = spawned {
            debug!(kind = ?kind, "flying_object_spawned");
        }
        spawned
    }

    fn update_celestial(&mut self) {
        let arc = SkyArc::for_viewport(self.viewport(), self.config.celestial_radius);
        self.celestial = celestial::celestial_state(self.time_of_day, &arc);
    }

    fn update_camera(&mut self) {
        let target = self.controlled_body().center();
        let world_size = Vec2::new(self.world.width_px(), self.world.height_px());
        self.camera.follow_clamped(target, self.viewport(), world_size);
    }

    pub fn controlled(&self) -> ControlledEntity {
        match self.player.riding {
            Some(id) if id.0 < self.vehicles.len() => ControlledEntity::Vehicle(id),
            _ => ControlledEntity::Player,
        }
    }

    fn controlled_body(&self) -> &Body {
        match self.controlled() {
            ControlledEntity::Vehicle(id) => &self.vehicles[id.0].body,
            ControlledEntity::Player => &self.player.body,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.config.viewport_width,
            height: self.config.viewport_height,
        }
    }

    pub fn player_screen_position(&self) -> Vec2 {
        world_to_screen(self.player.body.center(), &self.camera)
    }

    pub fn select_crop(&mut self, kind: CropKind) {
        self.selected_crop = kind;
        self.status.toast(format!("Selected {kind}"));
    }

    pub fn buy_seeds(&mut self, kind: CropKind, quantity: u32) -> Result<u64, ActionError> {
        let result = economy::buy_seeds(&mut self.player, kind, quantity, &self.config.economy);
        self.settle(result, Spend::Debit)
    }

    pub fn sell_crop(&mut self, kind: CropKind) -> Result<u64, ActionError> {
        let result = economy::sell_crop(&mut self.player, kind, &self.config.economy);
        self.settle(result, Spend::Credit)
    }

    pub fn refuel(&mut self, id: VehicleId) -> Result<u64, ActionError> {
        let result = match self.vehicles.get_mut(id.0) {
            Some(vehicle) => economy::refuel(&mut self.player, vehicle, &self.config.economy),
            None => Err(ActionError::UnknownVehicle),
        };
        self.settle(result, Spend::Debit)
    }

    pub fn upgrade_vehicle(&mut self, id: VehicleId) -> Result<u64, ActionError> {
        let result = match self.vehicles.get_mut(id.0) {
            Some(vehicle) => {
                economy::upgrade_vehicle(&mut self.player, vehicle, &self.config.economy)
            }
            None => Err(ActionError::UnknownVehicle),
        };
        self.settle(result, Spend::Debit)
    }

    pub fn build_silo(&mut self) -> Result<u64, ActionError> {
        let result = economy::build_silo(&mut self.player, &self.config.economy);
        self.settle(result, Spend::Debit)
    }

    fn settle(&mut self, result: Result<u64, ActionError>, spend: Spend) -> Result<u64, ActionError> {
        match result {
            Ok(amount) => {
                let signed = i64::try_from(amount).unwrap_or(i64::MAX);
                let delta = match spend {
                    Spend::Debit => -signed,
                    Spend::Credit => signed,
                };
                let position = self.player_screen_position();
                self.status.money(delta, position);
                info!(delta, money = self.player.money, "money_changed");
                Ok(amount)
            }
            Err(error) => {
                self.status.toast(error.to_string());
                Err(error)
            }
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldGrid {
        &self.world
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn ambient(&self) -> &AmbientState {
        &self.ambient
    }

    pub fn celestial(&self) -> &CelestialState {
        &self.celestial
    }

    pub fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn selected_crop(&self) -> CropKind {
        self.selected_crop
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn last_tick_order(&self) -> &[SimStage] {
        &self.last_tick_order
    }

    pub fn status(&self) -> &StatusFeed {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut StatusFeed {
        &mut self.status
    }

    pub fn drain_status(&mut self) -> Vec<FeedbackEvent> {
        self.status.drain()
    }
}

#[derive(Debug, Clone, Copy)]
enum Spend {
    Debit,
    Credit,
}

fn sky_bounds(world: &WorldGrid) -> SkyBounds {
    SkyBounds {
        world_width: world.width_px(),
        ground_y: world.ground_surface_y(),
    }
}
