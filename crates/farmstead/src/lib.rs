pub mod clock;
pub mod host;
pub mod persistence;
pub mod sim;

pub use clock::{Clock, ManualClock, SystemClock, TimestampMs};
pub use sim::{SimConfig, Simulation, TickIntents};
