mod commands;
mod queries;
mod types;

pub(crate) use commands::{
    claim_for_grading, mark_pending, refresh_claim, reset_stale, set_terminal_status,
};
pub(crate) use queries::{find_by_id, list_stale};
