use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::services::analysis_service::AnalysisSettings;
use crate::services::factor_cache::FactorCacheConfig;
use crate::services::recommendation_service::RecommendationPolicy;
use crate::services::valuation_service::ValuationPolicy;

/// Candidate universe used when CANDIDATE_UNIVERSE is not set.
pub const DEFAULT_UNIVERSE: &[&str] = &[
    "7203.T", "6758.T", "9984.T", "8306.T", "8316.T", "9432.T", "9433.T", "6861.T",
    "4063.T", "8058.T", "8001.T", "4502.T", "4568.T", "2914.T", "6098.T", "7974.T",
    "8766.T", "9020.T", "5108.T", "1605.T", "9501.T", "8801.T", "1306.T", "1475.T",
    "AAPL", "MSFT", "JNJ", "KO", "PG", "XOM", "JPM", "NVDA", "VZ", "PFE", "VYM", "SPYD",
];

const DEFAULT_FACTOR_REFRESH_CRON: &str = "0 0 */6 * * *";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub factor_cache: FactorCacheConfig,
    pub universe: Vec<String>,
    pub recommendation: RecommendationPolicy,
    pub valuation: ValuationPolicy,
    pub analysis: AnalysisSettings,
    /// Cron expression for the factor cache warm-up; empty disables it.
    pub factor_refresh_cron: String,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        _ => Ok(default),
    }
}

fn string_or(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Splits a comma separated symbol list, dropping blanks.
pub fn parse_universe(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl AppConfig {
    /// Built-in defaults for everything except the two secrets.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            jwt_secret: jwt_secret.into(),
            factor_cache: FactorCacheConfig::default(),
            universe: DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
            recommendation: RecommendationPolicy::default(),
            valuation: ValuationPolicy::default(),
            analysis: AnalysisSettings::default(),
            factor_refresh_cron: DEFAULT_FACTOR_REFRESH_CRON.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let factor_defaults = FactorCacheConfig::default();
        let recommendation_defaults = RecommendationPolicy::default();
        let valuation_defaults = ValuationPolicy::default();
        let analysis_defaults = AnalysisSettings::default();

        let ttl_hours: i64 = parse_or("FACTOR_CACHE_TTL_HOURS", factor_defaults.ttl.num_hours())?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "FACTOR_CACHE_TTL_HOURS",
                value: ttl_hours.to_string(),
            });
        }
        let min_interval_ms: u64 = parse_or("FACTOR_FETCH_MIN_INTERVAL_MS", 0)?;

        let universe = match std::env::var("CANDIDATE_UNIVERSE") {
            Ok(raw) if !raw.trim().is_empty() => parse_universe(&raw),
            _ => DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
        };

        let history_days: i64 = parse_or("ANALYSIS_HISTORY_DAYS", analysis_defaults.history_days)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            jwt_secret: required("JWT_SECRET")?,
            factor_cache: FactorCacheConfig {
                ttl: chrono::Duration::hours(ttl_hours),
                path: PathBuf::from(string_or("FACTOR_CACHE_PATH", "data/factor_cache.json")),
                concurrency: parse_or("FACTOR_FETCH_CONCURRENCY", factor_defaults.concurrency)?,
                min_interval: std::time::Duration::from_millis(min_interval_ms),
                history_days: factor_defaults.history_days,
            },
            universe,
            recommendation: RecommendationPolicy {
                count: parse_or("RECOMMENDATION_COUNT", recommendation_defaults.count)?,
                sector_cap: parse_or("RECOMMENDATION_SECTOR_CAP", recommendation_defaults.sector_cap)?,
                ..recommendation_defaults
            },
            valuation: ValuationPolicy {
                tax_rate: parse_or("CAPITAL_GAINS_TAX_RATE", valuation_defaults.tax_rate)?,
                tax_advantaged_marker: string_or("TAX_ADVANTAGED_MARKER", &valuation_defaults.tax_advantaged_marker),
                reporting_currency: string_or("REPORTING_CURRENCY", &valuation_defaults.reporting_currency),
                fx_symbol: string_or("FX_SYMBOL", &valuation_defaults.fx_symbol),
                fx_fallback_rate: parse_or("FX_FALLBACK_RATE", valuation_defaults.fx_fallback_rate)?,
            },
            analysis: AnalysisSettings {
                risk_free_rate: parse_or("RISK_FREE_RATE", analysis_defaults.risk_free_rate)?,
                market_index_symbol: string_or("MARKET_INDEX_SYMBOL", &analysis_defaults.market_index_symbol),
                history_days: history_days.max(1),
            },
            factor_refresh_cron: string_or("FACTOR_REFRESH_CRON", DEFAULT_FACTOR_REFRESH_CRON),
        })
    }
}
