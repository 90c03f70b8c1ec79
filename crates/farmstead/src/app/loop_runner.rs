use std::process::ExitCode;

use engine::{run_headless, LoopControl, MetricsHandle};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        config,
        mut scene,
        mut pilot,
    } = app;
    let control = LoopControl::new();
    let metrics = MetricsHandle::default();

    match run_headless(&config, &mut scene, &mut pilot, &control, &metrics) {
        Ok(summary) => {
            let sim = scene.simulation();
            info!(
                ticks_run = summary.ticks_run,
                reason = ?summary.stop_reason,
                money = sim.player().money,
                time_of_day = sim.time_of_day(),
                tps = metrics.snapshot().tps,
                "session_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "loop_failed");
            ExitCode::FAILURE
        }
    }
}
