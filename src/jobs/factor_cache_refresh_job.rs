//! Scheduled factor cache warm-up.
//!
//! Forces a rebuild so user requests rarely pay rebuild latency. Joins a
//! rebuild that a request already started instead of running a second one.

use tracing::info;

use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub async fn refresh_factor_cache(ctx: JobContext) -> Result<JobResult, AppError> {
    let universe = ctx.factor_cache.universe().len();
    let cached = ctx.factor_cache.refresh().await;
    let usable = cached.items().len();

    if usable == 0 && universe > 0 {
        return Err(AppError::External(format!(
            "factor cache rebuild produced no candidates from {} symbols",
            universe
        )));
    }

    info!(
        "Factor cache refreshed: {} of {} symbols ({:?})",
        usable, universe, cached.meta.source
    );

    Ok(JobResult {
        items_processed: usable,
        items_failed: universe.saturating_sub(usable),
    })
}
