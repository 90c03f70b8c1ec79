mod grid;
mod input;
mod loop_runner;
mod metrics;
mod scene;
mod viewport;

pub use grid::{Grid, GridError};
pub use input::{ActionStates, InputAction, InputCollector, InputSnapshot, InputSource};
pub use loop_runner::{run_headless, AppError, LoopConfig, LoopControl, LoopSummary, StopReason};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{Aabb, Camera2D, Scene, SceneCommand, Vec2};
pub use viewport::{world_to_screen, Viewport};
