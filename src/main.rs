use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use bouncer::{
    batch::{BatchPlan, persist_entries, run_batch},
    cli::args_from_env,
    config::Config,
    logging::init_tracing,
    results::ResultsStore,
    session::{HttpSession, SessionPort},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = args_from_env()?;
    let mut config = Config::load(&args.config_path)
        .with_context(|| format!("failed to load config from {}", args.config_path.display()))?;
    args.apply(&mut config);

    let _logging_guard = init_tracing(&config.logging)?;

    // fail fast on a missing player id before any run is spawned
    HttpSession::new(config.session.clone()).context("invalid session config")?;

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(cancel.clone()));

    let plan = BatchPlan {
        runs: config.batch.runs,
        max_concurrent_runs: config.batch.max_concurrent_runs,
        policy: config.policy.clone(),
        run_config: config.run.loop_config(),
        scenario: Some(config.session.scenario),
    };
    let session_config = config.session.clone();
    let entries = run_batch(
        plan,
        move |_| {
            HttpSession::new(session_config.clone())
                .map(|session| Box::new(session) as Box<dyn SessionPort>)
        },
        cancel.clone(),
    )
    .await;
    signal_task.abort();

    let store = ResultsStore::new(config.results.dir.clone());
    let report = persist_entries(&store, &entries);
    for (run_index, path) in &report.saved {
        if let Some(Ok(summary)) = entries
            .iter()
            .find(|entry| entry.run_index == *run_index)
            .map(|entry| &entry.outcome)
        {
            eprintln!(
                "run {run_index}: {} admitted={} rejected={} success={} -> {}",
                summary.state.label(),
                summary.admitted_total,
                summary.rejected_total,
                summary.metrics.success,
                path.display()
            );
        }
    }
    for (run_index, err) in &report.failed {
        eprintln!("run {run_index}: failed: {err}");
    }
    for run_index in &report.cancelled {
        eprintln!("run {run_index}: cancelled before start");
    }

    if report.all_failed() {
        anyhow::bail!("all {} attempted runs failed", report.failed.len());
    }
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    eprintln!("received {signal_name}; stopping after the current step");
    tracing::warn!(target: "main", signal = signal_name, "shutdown_requested");
    cancel.cancel();
    Ok(())
}
