use anyhow::{Context, Result};
use time::Duration;

use crate::core::time::primitive_now_utc;
use crate::services::grading::queue::{GradingJob, GradingQueue};
use crate::services::grading::store::GradingPorts;

/// Floor for the recovery window; a live attempt refreshes its heartbeat well
/// inside it.
pub(crate) const MIN_STALE_AFTER: Duration = Duration::minutes(2);

/// Returns ungraded submissions whose PROCESSING heartbeat went quiet, or that
/// sat unclaimed in the queue, for longer than `stale_after` to PENDING.
///
/// With a queue the recovered jobs are republished. Without one (synchronous
/// dispatch) they stay PENDING until the next enqueue grades them inline.
pub(crate) async fn recover_stale_submissions(
    ports: &GradingPorts,
    queue: Option<&dyn GradingQueue>,
    stale_after: Duration,
) -> Result<usize> {
    let now = primitive_now_utc();
    let cutoff = now - stale_after.max(MIN_STALE_AFTER);

    let stale = ports
        .submissions
        .list_stale(cutoff)
        .await
        .context("Failed to list stale submissions")?;

    let mut recovered = 0;
    for submission in stale {
        let reset = ports
            .submissions
            .reset_stale(&submission.id, cutoff, now)
            .await
            .context("Failed to reset stale submission")?;
        if !reset {
            continue;
        }

        if let Some(queue) = queue {
            queue
                .publish(&GradingJob::new(&submission.id))
                .await
                .context("Failed to republish stale submission")?;
        }

        tracing::warn!(
            submission_id = %submission.id,
            previous_status = submission.status.as_str(),
            republished = queue.is_some(),
            "Recovered stale submission"
        );
        recovered += 1;
    }

    if recovered > 0 {
        tracing::info!(recovered, "Stale grading submissions reset to pending");
    }
    metrics::counter!("grading_stale_recovered_total").increment(recovered as u64);

    Ok(recovered)
}
