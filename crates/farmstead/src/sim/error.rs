use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::world::CropKind;

/// A gameplay request whose preconditions did not hold. The display text is
/// what the player sees in the status channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("No vehicle nearby")]
    NoVehicleNearby,
    #[error("You need to be driving a tractor")]
    NotDrivingTractor,
    #[error("No attachment nearby")]
    NoAttachmentNearby,
    #[error("Out of fuel")]
    OutOfFuel,
    #[error("Step out of the vehicle first")]
    RidingVehicle,
    #[error("Nothing to work on here")]
    OutOfBounds,
    #[error("This ground can't be tilled")]
    NotTillable,
    #[error("Plant on empty tilled soil")]
    NotPlantable,
    #[error("No {0} seeds left")]
    NoSeeds(CropKind),
    #[error("Nothing ready to harvest")]
    NotHarvestable,
    #[error("Storage full")]
    StorageFull,
    #[error("Not enough money (need {needed}, have {available})")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("No {0} to sell")]
    NothingToSell(CropKind),
    #[error("Tank is already full")]
    TankFull,
    #[error("Silo already built")]
    AlreadyBuilt,
    #[error("Unknown vehicle")]
    UnknownVehicle,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("parse snapshot json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
    #[error("encode snapshot json: {0}")]
    Encode(#[source] serde_json::Error),
}

impl SnapshotError {
    pub(crate) fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn expected_actual(
        path: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::validation(path, format!("expected {expected}, got {actual}"))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse config json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
