//! AI-assisted grading: one model call per rubric question, aggregated into a
//! single idempotent result per submission.

pub(crate) mod aggregate;
pub(crate) mod errors;
pub(crate) mod front_door;
pub(crate) mod lease;
pub(crate) mod model;
pub(crate) mod openai;
pub(crate) mod orchestrator;
pub(crate) mod queue;
pub(crate) mod retry;
pub(crate) mod store;

pub(crate) use errors::GradingError;
pub(crate) use front_door::{EnqueueReceipt, GradingDispatch, GradingFrontDoor};
pub(crate) use orchestrator::{GradingConfig, GradingOrchestrator, ReviewRequest};
