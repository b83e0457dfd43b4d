//! Background jobs driven by the job scheduler service.
//!
//! - `factor_cache_refresh_job` - rebuilds the candidate factor cache on a schedule

pub mod factor_cache_refresh_job;
