use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration};

use crate::core::shutdown::is_shutting_down;
use crate::core::state::AppState;
use crate::services::grading::queue::{GradingQueue, RedisGradingQueue};
use crate::tasks::grading;

const IDLE_POLL: Duration = Duration::from_secs(2);
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

pub(crate) async fn run(
    state: AppState,
    queue: RedisGradingQueue,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let concurrency = state.settings().grading().worker_concurrency;
    let mut handles = Vec::with_capacity(concurrency + 1);

    for _ in 0..concurrency {
        handles.push(tokio::spawn(grading_worker(
            state.clone(),
            queue.clone(),
            shutdown_tx.subscribe(),
        )));
    }
    handles.push(tokio::spawn(stale_recovery_loop(
        state.clone(),
        Some(queue.clone()),
        shutdown_tx.subscribe(),
    )));

    tracing::info!(
        workers = concurrency,
        queue = %state.settings().grading().queue_name,
        "Grading worker started"
    );

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn grading_worker(
    state: AppState,
    queue: RedisGradingQueue,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if is_shutting_down(&shutdown) {
            break;
        }

        match queue.pop().await {
            Ok(Some(job)) => {
                grading::process_job(state.orchestrator(), &job).await;
                continue;
            }
            Ok(None) => {}
            Err(err) => tracing::error!(error = %err, "Failed to take grading job"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = sleep(IDLE_POLL) => {}
        }
    }
}

/// Periodically resets stale submissions. The worker passes its queue so the
/// jobs are republished; the API in synchronous mode passes `None`.
pub(crate) async fn stale_recovery_loop(
    state: AppState,
    queue: Option<RedisGradingQueue>,
    shutdown: watch::Receiver<bool>,
) {
    recovery_loop(state, queue, shutdown, MAINTENANCE_INTERVAL).await;
}

async fn recovery_loop(
    state: AppState,
    queue: Option<RedisGradingQueue>,
    mut shutdown: watch::Receiver<bool>,
    period: Duration,
) {
    let stale_after = state.settings().grading().stale_after();
    let mut tick = interval(period);
    loop {
        if is_shutting_down(&shutdown) {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = grading::recover_stale_submissions(
                    state.orchestrator().ports(),
                    queue.as_ref().map(|queue| queue as &dyn GradingQueue),
                    stale_after,
                )
                .await
                {
                    tracing::error!(error = %err, "recover_stale_submissions failed");
                }
            }
        }
    }
}
