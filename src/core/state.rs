use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::services::grading::{GradingFrontDoor, GradingOrchestrator};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    redis: RedisHandle,
    orchestrator: Arc<GradingOrchestrator>,
    front_door: Arc<GradingFrontDoor>,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        redis: RedisHandle,
        orchestrator: Arc<GradingOrchestrator>,
        front_door: Arc<GradingFrontDoor>,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, redis, orchestrator, front_door }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn orchestrator(&self) -> &Arc<GradingOrchestrator> {
        &self.inner.orchestrator
    }

    pub(crate) fn front_door(&self) -> &GradingFrontDoor {
        &self.inner.front_door
    }
}
