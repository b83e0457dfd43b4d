pub mod analysis_service;
pub mod factor_builder;
pub mod factor_cache;
pub mod job_scheduler_service;
pub mod rate_limiter;
pub mod rebalance_service;
pub mod recommendation_service;
pub mod sector_map;
pub mod statistics_service;
pub mod valuation_service;
