use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use folioscope::app;
use folioscope::config::AppConfig;
use folioscope::db::PgStore;
use folioscope::external::yahoofinance::YahooFinanceProvider;
use folioscope::logging::{init_logging, LoggingConfig};
use folioscope::services::factor_cache::FactorCache;
use folioscope::services::job_scheduler_service::JobSchedulerService;
use folioscope::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("🗄️  Database ready, migrations applied");

    let market_data = Arc::new(YahooFinanceProvider::new());
    let factor_cache = Arc::new(FactorCache::new(
        market_data.clone(),
        config.universe.clone(),
        config.factor_cache.clone(),
    ));
    tracing::info!(
        "📊 Factor cache: {} symbols, TTL {}h, {} concurrent fetches, persisted at {}",
        factor_cache.universe().len(),
        config.factor_cache.ttl.num_hours(),
        config.factor_cache.concurrency,
        config.factor_cache.path.display()
    );

    let mut scheduler = JobSchedulerService::new(factor_cache.clone()).await?;
    scheduler.start(&config.factor_refresh_cron).await?;

    let state = AppState::new(&config, Arc::new(PgStore::new(pool)), market_data, factor_cache);
    let app = app::create_app(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 folioscope running at http://{}/", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
