//! Application run: load targets, schedule them, wait for the outcome.

use gitsync_config::{Target, load_targets};
use gitsync_git::{SyncEngine, SyncMetrics};
use gitsync_scheduler::{Error as SchedulerError, ErrorPolicy, JobResult, Scheduler};

use crate::cli::Settings;
use crate::error::{CliError, Result};
use crate::server::{self, ServerState};

/// Run until the first unrecovered error or a termination signal.
///
/// Configuration errors abort before any task is scheduled.
pub async fn run(settings: Settings) -> Result<()> {
    let targets = load_targets(&settings.config)?;
    tracing::info!(
        config = %settings.config.display(),
        tasks = targets.len(),
        "configuration loaded"
    );

    let policy = if settings.isolate_failures {
        ErrorPolicy::Isolate
    } else {
        ErrorPolicy::FailFast
    };
    let scheduler = Scheduler::new(policy);
    let metrics = SyncMetrics::new();
    let tasks = targets.len();

    if settings.server {
        let listener = server::bind(settings.port).await?;
        let state = ServerState {
            metrics: metrics.clone(),
            tasks,
        };
        scheduler.spawn("http server", async move {
            let result: JobResult = server::serve(listener, state).await.map_err(Into::into);
            result
        });
    }

    for target in targets {
        register(&scheduler, target, metrics.clone());
    }

    let signals = scheduler.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("termination signal received, shutting down");
        signals.finish();
    });

    let outcome = scheduler.wait_error().await;
    tracing::debug!("waiting for running jobs to finish");
    scheduler.shutdown().await;

    match outcome {
        SchedulerError::Finished => {
            tracing::info!("app finished successfully");
            Ok(())
        }
        error => Err(CliError::Scheduler(error)),
    }
}

/// Acquire the target once, then pull it on its interval.
///
/// The pull job is registered only after acquisition succeeded. Under
/// [`ErrorPolicy::Isolate`] a failed acquisition is retried on the same
/// interval instead, and pulls start on the tick after it succeeds.
pub fn register(scheduler: &Scheduler, target: Target, metrics: SyncMetrics) {
    let name = target.name().to_string();
    let handle = scheduler.clone();

    scheduler.execute(format!("clone {name}"), move || {
        let mut engine = SyncEngine::new(target).with_metrics(metrics);
        let delay = engine.target().interval();

        if let Err(err) = engine.clone_or_attach() {
            if handle.policy() != ErrorPolicy::Isolate {
                return Err(err.into());
            }
            tracing::warn!(
                name = %name,
                retry_seconds = delay.as_secs(),
                "unable to acquire repo, retrying on the next interval"
            );
            handle.schedule(format!("sync {name}"), move || sync(&mut engine), delay);
            return Ok(());
        }

        if engine.target().run_once() {
            warn_run_once(&name);
            return Ok(());
        }

        handle.schedule(
            format!("pull {name}"),
            move || engine.pull().map(|_| ()).map_err(Into::into),
            delay,
        );
        Ok(())
    });
}

/// One tick of a target whose first acquisition failed.
fn sync(engine: &mut SyncEngine) -> JobResult {
    if engine.repository().is_none() {
        engine.clone_or_attach()?;
        if engine.target().run_once() {
            warn_run_once(engine.target().name());
        }
        return Ok(());
    }
    if engine.target().run_once() {
        return Ok(());
    }
    engine.pull()?;
    Ok(())
}

fn warn_run_once(name: &str) {
    tracing::warn!(
        name = %name,
        "task is run-once; it will not be pulled again but the process keeps running"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
