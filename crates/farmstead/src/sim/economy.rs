use super::config::EconomyConfig;
use super::error::ActionError;
use super::player::{Player, ResourceKind};
use super::vehicles::Vehicle;
use super::world::CropKind;

fn charge(player: &mut Player, cost: u64) -> Result<(), ActionError> {
    if player.money < cost {
        return Err(ActionError::InsufficientFunds {
            needed: cost,
            available: player.money,
        });
    }
    player.money -= cost;
    Ok(())
}

/// Returns the amount spent.
pub fn buy_seeds(
    player: &mut Player,
    kind: CropKind,
    quantity: u32,
    economy: &EconomyConfig,
) -> Result<u64, ActionError> {
    if quantity == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let resource = ResourceKind::seeds(kind);
    let held = player.inventory.count(resource);
    if held.saturating_add(quantity) > player.max_storage {
        return Err(ActionError::StorageFull);
    }
    let cost = economy
        .seed_prices
        .for_kind(kind)
        .saturating_mul(u64::from(quantity));
    charge(player, cost)?;
    player
        .inventory
        .try_add(resource, quantity, player.max_storage)?;
    Ok(cost)
}

/// Sells the whole stack and returns the amount earned.
pub fn sell_crop(
    player: &mut Player,
    kind: CropKind,
    economy: &EconomyConfig,
) -> Result<u64, ActionError> {
    let resource = ResourceKind::harvested(kind);
    if player.inventory.count(resource) == 0 {
        return Err(ActionError::NothingToSell(kind));
    }
    let sold = player.inventory.take_all(resource);
    let earned = economy
        .crop_prices
        .for_kind(kind)
        .saturating_mul(u64::from(sold));
    player.money = player.money.saturating_add(earned);
    Ok(earned)
}

pub fn refuel_cost(vehicle: &Vehicle, economy: &EconomyConfig) -> u64 {
    let missing = (vehicle.max_fuel - vehicle.fuel).max(0.0);
    (missing.ceil() as u64).saturating_mul(economy.fuel_price)
}

pub fn refuel(
    player: &mut Player,
    vehicle: &mut Vehicle,
    economy: &EconomyConfig,
) -> Result<u64, ActionError> {
    if vehicle.fuel >= vehicle.max_fuel {
        return Err(ActionError::TankFull);
    }
    let cost = refuel_cost(vehicle, economy);
    charge(player, cost)?;
    vehicle.fuel = vehicle.max_fuel;
    Ok(cost)
}

pub fn upgrade_cost(vehicle: &Vehicle, economy: &EconomyConfig) -> u64 {
    economy
        .upgrade_base_cost
        .saturating_mul(u64::from(vehicle.upgrade_level) + 1)
}

pub fn upgrade_vehicle(
    player: &mut Player,
    vehicle: &mut Vehicle,
    economy: &EconomyConfig,
) -> Result<u64, ActionError> {
    let cost = upgrade_cost(vehicle, economy);
    charge(player, cost)?;
    vehicle.upgrade_level += 1;
    vehicle.max_fuel += economy.upgrade_fuel_bonus;
    Ok(cost)
}

pub fn build_silo(player: &mut Player, economy: &EconomyConfig) -> Result<u64, ActionError> {
    if player.silo_built {
        return Err(ActionError::AlreadyBuilt);
    }
    charge(player, economy.silo_cost)?;
    player.silo_built = true;
    player.max_storage = player.max_storage.saturating_add(economy.silo_capacity);
    Ok(economy.silo_cost)
}
