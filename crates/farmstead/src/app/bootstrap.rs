use std::path::PathBuf;

use engine::{resolve_app_paths, LoopConfig, StartupError};
use farmstead::host::{DemoPilot, FarmScene};
use farmstead::persistence::{FileSnapshotStore, PersistenceWorker, DEFAULT_SLOT};
use farmstead::sim::ConfigError;
use farmstead::{SimConfig, Simulation, SystemClock};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV_VAR: &str = "FARMSTEAD_CONFIG";
const TICKS_ENV_VAR: &str = "FARMSTEAD_TICKS";
const DEFAULT_TICKS: u64 = 600;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: FarmScene,
    pub(crate) pilot: DemoPilot,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Farmstead Startup ===");

    let sim_config = load_sim_config()?;
    let simulation = Simulation::new(sim_config)?;
    let mut scene = FarmScene::new(simulation, Box::new(SystemClock));
    match spawn_persistence() {
        Ok(worker) => scene = scene.with_persistence(worker, DEFAULT_SLOT),
        Err(error) => warn!(error = %error, "persistence_disabled"),
    }

    let config = LoopConfig {
        max_ticks: Some(parse_ticks_from_env()),
        paced: false,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        scene,
        pilot: DemoPilot::farm_tour(),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_sim_config() -> Result<SimConfig, ConfigError> {
    match config_path_from_env() {
        Some(path) => {
            let config = SimConfig::load(&path)?;
            info!(path = %path.display(), "sim_config_loaded");
            Ok(config)
        }
        None => Ok(SimConfig::default()),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Error)]
enum PersistenceSetupError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Worker(#[from] farmstead::persistence::PersistenceError),
}

fn spawn_persistence() -> Result<PersistenceWorker, PersistenceSetupError> {
    let paths = resolve_app_paths()?;
    info!(saves_dir = %paths.saves_dir.display(), "saves_dir_resolved");
    let store = FileSnapshotStore::new(paths.saves_dir);
    Ok(PersistenceWorker::spawn(Box::new(store))?)
}

fn parse_ticks_from_env() -> u64 {
    match std::env::var(TICKS_ENV_VAR) {
        Ok(raw) => parse_ticks(&raw).unwrap_or_else(|| {
            warn!(value = %raw, fallback = DEFAULT_TICKS, "invalid_tick_count");
            DEFAULT_TICKS
        }),
        Err(_) => DEFAULT_TICKS,
    }
}

fn parse_ticks(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|ticks| *ticks > 0)
}
