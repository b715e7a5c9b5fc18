pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::{config::Settings, redis::RedisHandle, shutdown, state::AppState, telemetry};
use crate::repositories::grading_store::PgGradingStore;
use crate::services::grading::openai::OpenAiGradingModel;
use crate::services::grading::queue::RedisGradingQueue;
use crate::services::grading::store::GradingPorts;
use crate::services::grading::{GradingConfig, GradingDispatch, GradingFrontDoor, GradingOrchestrator};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    let (state, redis) = bootstrap(settings, shutdown_rx, true).await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        grading_mode = state.front_door().dispatch().mode(),
        "Autograde API listening"
    );

    // Without a queue there is no worker process to recover crashed attempts.
    let recovery = matches!(state.front_door().dispatch(), GradingDispatch::Synchronous).then(|| {
        tracing::info!("Stale grading recovery runs in the API process");
        tokio::spawn(tasks::scheduler::stale_recovery_loop(
            state.clone(),
            None,
            shutdown_tx.subscribe(),
        ))
    });

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::broadcast_on_signal(shutdown_tx))
        .await;

    if let Some(handle) = recovery {
        handle.abort();
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    let (state, redis) = bootstrap(settings, shutdown_rx, false).await?;
    if !redis.is_connected().await {
        anyhow::bail!("grading worker requires a Redis connection");
    }

    let queue =
        RedisGradingQueue::new(redis.clone(), state.settings().grading().queue_name.clone());
    let result = tasks::scheduler::run(state, queue, shutdown_tx).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

/// Wires storage, the model client and the grading pipeline. Queue dispatch
/// is only chosen for the API when enabled and Redis is reachable.
async fn bootstrap(
    settings: Settings,
    shutdown: watch::Receiver<bool>,
    serve_api: bool,
) -> anyhow::Result<(AppState, RedisHandle)> {
    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; grading falls back to synchronous mode");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let ports = GradingPorts::from_store(Arc::new(PgGradingStore::new(db_pool.clone())));
    let model = Arc::new(OpenAiGradingModel::from_settings(&settings)?);
    let orchestrator = Arc::new(GradingOrchestrator::new(
        ports,
        model,
        GradingConfig::from_settings(&settings),
        shutdown,
    ));

    let dispatch = if serve_api && settings.grading().queue_enabled && redis.is_connected().await {
        GradingDispatch::Enqueued(Arc::new(RedisGradingQueue::new(
            redis.clone(),
            settings.grading().queue_name.clone(),
        )))
    } else {
        GradingDispatch::Synchronous
    };
    let front_door = Arc::new(GradingFrontDoor::new(orchestrator.clone(), dispatch));

    let state = AppState::new(settings, db_pool, redis.clone(), orchestrator, front_door);
    Ok((state, redis))
}
