mod maintenance;
mod worker;

pub(crate) use maintenance::recover_stale_submissions;
pub(crate) use worker::process_job;
