use serde::{Deserialize, Serialize};

use super::config::VehicleConfig;
use super::error::ActionError;
use super::physics::Body;
use super::player::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleKind {
    Tractor,
    Combine,
}

impl VehicleKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tractor => "Tractor",
            Self::Combine => "Combine",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentKind {
    Plow,
    Seeder,
}

impl AttachmentKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Plow => "Plow",
            Self::Seeder => "Seeder",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Which attachment a tractor is towing, resolved by id at each use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRef {
    pub kind: AttachmentKind,
    pub id: AttachmentId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
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

impl Vehicle {
    pub fn new(kind: VehicleKind, config: &VehicleConfig, x: f32, surface_y: f32) -> Self {
        Self {
            kind,
            body: Body::resting_on(x, surface_y, config.width, config.height),
            base_speed: config.speed,
            fuel: config.max_fuel,
            max_fuel: config.max_fuel,
            fuel_per_tick: config.fuel_per_tick,
            facing: Facing::Right,
            occupied: false,
            upgrade_level: 0,
            equipment: None,
        }
    }

    pub fn effective_speed(&self, speed_bonus_per_level: f32) -> f32 {
        self.base_speed * (1.0 + speed_bonus_per_level * self.upgrade_level as f32)
    }

    pub fn has_fuel(&self) -> bool {
        self.fuel > 0.0
    }

    /// Driver input for one tick. An empty tank zeroes `vx` and leaves the
    /// fuel untouched; otherwise moving burns fuel, floored at zero.
    pub fn apply_drive_input(
        &mut self,
        direction: Option<Facing>,
        speed_bonus_per_level: f32,
    ) -> Result<(), ActionError> {
        let Some(direction) = direction else {
            self.body.vx = 0.0;
            return Ok(());
        };
        self.facing = direction;
        if !self.has_fuel() {
            self.body.vx = 0.0;
            return Err(ActionError::OutOfFuel);
        }
        self.body.vx = direction.sign() * self.effective_speed(speed_bonus_per_level);
        self.fuel = (self.fuel - self.fuel_per_tick).max(0.0);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub body: Body,
    pub hitched: bool,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, width: f32, height: f32, x: f32, surface_y: f32) -> Self {
        Self {
            kind,
            body: Body::resting_on(x, surface_y, width, height),
            hitched: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitchChange {
    Hitched(EquipmentRef),
    Unhitched(EquipmentRef),
}

/// Nearest vehicle by centre distance within `range`; ties go to the lower id.
pub fn nearest_vehicle(vehicles: &[Vehicle], from: &Body, range: f32) -> Option<VehicleId> {
    let origin = from.center();
    vehicles
        .iter()
        .enumerate()
        .map(|(index, vehicle)| (index, vehicle.body.center().distance(origin)))
        .filter(|(_, distance)| *distance <= range)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| VehicleId(index))
}

pub fn enter_nearest(
    player: &mut Player,
    vehicles: &mut [Vehicle],
    range: f32,
) -> Result<VehicleId, ActionError> {
    let id = nearest_vehicle(vehicles, &player.body, range).ok_or(ActionError::NoVehicleNearby)?;
    let vehicle = vehicles.get_mut(id.0).ok_or(ActionError::UnknownVehicle)?;
    vehicle.occupied = true;
    player.riding = Some(id);
    player.body.vx = 0.0;
    player.body.vy = 0.0;
    Ok(id)
}

/// Drops the player at the vehicle's horizontal centre, standing on the
/// ground surface.
pub fn exit_vehicle(
    player: &mut Player,
    vehicles: &mut [Vehicle],
    ground_surface_y: f32,
) -> Option<VehicleId> {
    let id = player.riding.take()?;
    if let Some(vehicle) = vehicles.get_mut(id.0) {
        vehicle.occupied = false;
        vehicle.body.vx = 0.0;
        player.body.x = vehicle.body.center().x - player.body.width * 0.5;
    }
    player.body.y = ground_surface_y - player.body.height;
    player.body.vx = 0.0;
    player.body.vy = 0.0;
    player.body.on_ground = true;
    Some(id)
}

/// Detaches the current equipment, or hitches the horizontally nearest free
/// attachment within `range`.
pub fn toggle_hitch(
    tractor: &mut Vehicle,
    attachments: &mut [Attachment],
    range: f32,
) -> Result<HitchChange, ActionError> {
    if tractor.kind != VehicleKind::Tractor || !tractor.occupied {
        return Err(ActionError::NotDrivingTractor);
    }
    if let Some(equipment) = tractor.equipment.take() {
        if let Some(attachment) = attachments.get_mut(equipment.id.0) {
            attachment.hitched = false;
            attachment.body.vx = 0.0;
        }
        return Ok(HitchChange::Unhitched(equipment));
    }

    let tractor_x = tractor.body.center().x;
    let (index, attachment) = attachments
        .iter_mut()
        .enumerate()
        .filter(|(_, attachment)| !attachment.hitched)
        .map(|(index, attachment)| {
            let distance = (attachment.body.center().x - tractor_x).abs();
            (index, attachment, distance)
        })
        .filter(|(_, _, distance)| *distance <= range)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(index, attachment, _)| (index, attachment))
        .ok_or(ActionError::NoAttachmentNearby)?;

    attachment.hitched = true;
    let equipment = EquipmentRef {
        kind: attachment.kind,
        id: AttachmentId(index),
    };
    tractor.equipment = Some(equipment);
    Ok(HitchChange::Hitched(equipment))
}

/// Where a towed attachment sits: behind the tractor relative to its facing,
/// bottom edges aligned, moving with the tractor.
pub fn towed_body(tractor: &Body, facing: Facing, attachment: &Body, gap: f32) -> Body {
    let x = match facing {
        Facing::Right => tractor.x - gap - attachment.width,
        Facing::Left => tractor.right() + gap,
    };
    Body {
        x,
        y: tractor.bottom() - attachment.height,
        width: attachment.width,
        height: attachment.height,
        vx: tractor.vx,
        vy: tractor.vy,
        on_ground: tractor.on_ground,
    }
}

#[cfg(test)]
mod tests {
    use crate::sim::config::{PlayerConfig, SimConfig};

    use super::*;

    const GROUND: f32 = 704.0;

    fn tractor_at(x: f32) -> Vehicle {
        Vehicle::new(VehicleKind::Tractor, &SimConfig::default().tractor, x, GROUND)
    }

    fn player_at(x: f32) -> Player {
        Player::spawn(&PlayerConfig::default(), x, GROUND)
    }

    #[test]
    fn drive_with_empty_tank_zeroes_velocity_and_keeps_fuel() {
        let mut tractor = tractor_at(0.0);
        tractor.fuel = 0.0;
        tractor.body.vx = 3.0;
        assert_eq!(
            tractor.apply_drive_input(Some(Facing::Left), 0.2),
            Err(ActionError::OutOfFuel)
        );
        assert_eq!(tractor.body.vx, 0.0);
        assert_eq!(tractor.fuel, 0.0);
        assert_eq!(tractor.facing, Facing::Left);
    }

    #[test]
    fn driving_burns_fuel_down_to_zero() {
        let mut tractor = tractor_at(0.0);
        tractor.fuel = 0.03;
        tractor
            .apply_drive_input(Some(Facing::Right), 0.0)
            .expect("has fuel");
        assert_eq!(tractor.body.vx, tractor.base_speed);
        assert_eq!(tractor.fuel, 0.0);
    }

    #[test]
    fn upgrades_scale_speed() {
        let mut tractor = tractor_at(0.0);
        tractor.upgrade_level = 2;
        assert!((tractor.effective_speed(0.25) - tractor.base_speed * 1.5).abs() < 1e-6);
    }

    #[test]
    fn enter_picks_nearest_vehicle_in_range() {
        let mut vehicles = vec![tractor_at(300.0), tractor_at(60.0)];
        let mut player = player_at(20.0);
        let id = enter_nearest(&mut player, &mut vehicles, 120.0).expect("in range");
        assert_eq!(id, VehicleId(1));
        assert!(vehicles[1].occupied);
        assert!(!vehicles[0].occupied);
        assert_eq!(player.riding, Some(VehicleId(1)));
    }

    #[test]
    fn enter_out_of_range_changes_nothing() {
        let mut vehicles = vec![tractor_at(900.0)];
        let mut player = player_at(0.0);
        let before = (vehicles.clone(), player.clone());
        assert_eq!(
            enter_nearest(&mut player, &mut vehicles, 120.0),
            Err(ActionError::NoVehicleNearby)
        );
        assert_eq!((vehicles, player), before);
    }

    #[test]
    fn exit_places_player_at_vehicle_centre_on_ground() {
        let mut vehicles = vec![tractor_at(200.0)];
        let mut player = player_at(180.0);
        enter_nearest(&mut player, &mut vehicles, 120.0).expect("enter");
        player.body.vy = 5.0;

        assert_eq!(exit_vehicle(&mut player, &mut vehicles, GROUND), Some(VehicleId(0)));
        assert_eq!(player.body.center().x, vehicles[0].body.center().x);
        assert_eq!(player.body.bottom(), GROUND);
        assert_eq!(player.body.vy, 0.0);
        assert!(!vehicles[0].occupied);
    }

    #[test]
    fn hitch_requires_occupied_tractor() {
        let mut tractor = tractor_at(100.0);
        let mut attachments = vec![Attachment::new(AttachmentKind::Plow, 48.0, 24.0, 120.0, GROUND)];
        assert_eq!(
            toggle_hitch(&mut tractor, &mut attachments, 160.0),
            Err(ActionError::NotDrivingTractor)
        );
        assert!(!attachments[0].hitched);
    }

    #[test]
    fn hitch_toggle_uses_horizontal_distance() {
        let mut tractor = tractor_at(100.0);
        tractor.occupied = true;
        let mut attachments = vec![
            Attachment::new(AttachmentKind::Plow, 48.0, 24.0, 400.0, GROUND),
            Attachment::new(AttachmentKind::Seeder, 48.0, 32.0, 40.0, GROUND - 500.0),
        ];
        let change = toggle_hitch(&mut tractor, &mut attachments, 160.0).expect("hitch");
        let expected = EquipmentRef {
            kind: AttachmentKind::Seeder,
            id: AttachmentId(1),
        };
        assert_eq!(change, HitchChange::Hitched(expected));
        assert!(attachments[1].hitched);

        let change = toggle_hitch(&mut tractor, &mut attachments, 0.0).expect("unhitch");
        assert_eq!(change, HitchChange::Unhitched(expected));
        assert!(!attachments[1].hitched);
        assert!(tractor.equipment.is_none());
    }

    #[test]
    fn hitch_with_nothing_in_range_leaves_equipment_empty() {
        let mut tractor = tractor_at(100.0);
        tractor.occupied = true;
        let mut attachments = vec![Attachment::new(AttachmentKind::Plow, 48.0, 24.0, 900.0, GROUND)];
        assert_eq!(
            toggle_hitch(&mut tractor, &mut attachments, 160.0),
            Err(ActionError::NoAttachmentNearby)
        );
        assert!(tractor.equipment.is_none());
    }

    #[test]
    fn towed_body_trails_behind_facing() {
        let tractor = Body::resting_on(200.0, GROUND, 96.0, 56.0);
        let plow = Body::resting_on(0.0, GROUND, 48.0, 24.0);

        let behind_right = towed_body(&tractor, Facing::Right, &plow, 4.0);
        assert_eq!(behind_right.right(), 196.0);
        assert_eq!(behind_right.bottom(), GROUND);

        let behind_left = towed_body(&tractor, Facing::Left, &plow, 4.0);
        assert_eq!(behind_left.x, 300.0);
    }
}
