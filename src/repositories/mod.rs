pub(crate) mod grading_results;
pub(crate) mod grading_store;
pub(crate) mod health;
pub(crate) mod rubrics;
pub(crate) mod submissions;
pub(crate) mod teacher_settings;
