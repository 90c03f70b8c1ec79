//! Glue between the simulation and the engine's headless loop.

mod pilot;
mod scene;

pub use pilot::{DemoPilot, PilotStep};
pub use scene::FarmScene;
