use std::process::ExitCode;

use lazr_core::{run_headless_with_metrics, MetricsHandle};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(mut app: AppWiring) -> ExitCode {
    let metrics = MetricsHandle::default();
    let report =
        match run_headless_with_metrics(&app.config, &mut app.scene, &mut app.input, &metrics) {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "run_failed");
                return ExitCode::FAILURE;
            }
        };

    let summary = app.scene.session().ended();
    info!(
        frames = report.frames,
        simulated_ms = report.simulated.as_millis() as u64,
        tps = report.metrics.tps,
        score = summary.map(|summary| summary.score),
        level = summary.map(|summary| summary.level),
        rank = ?summary.and_then(|summary| summary.rank),
        "run_report"
    );
    match serde_json::to_string(&app.scene.snapshot()) {
        Ok(json) => info!(snapshot = %json, "final_snapshot"),
        Err(err) => error!(error = %err, "snapshot_encode_failed"),
    }

    ExitCode::SUCCESS
}
