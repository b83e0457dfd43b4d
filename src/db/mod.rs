pub mod operation_log_queries;
pub mod pg_store;
pub mod position_queries;
pub mod store;
pub mod value_history_queries;
pub mod watchlist_queries;

pub use pg_store::PgStore;
pub use store::PortfolioStore;
