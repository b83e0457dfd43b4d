use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::quote::QuoteType;

/// Trailing price returns as fractions (0.12 = +12%).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Returns {
    pub m1: Option<f64>,
    pub m3: Option<f64>,
    pub m6: Option<f64>,
    pub y1: Option<f64>,
}

/// Per-symbol factor snapshot for the candidate universe. Missing
/// fundamentals stay `None` all the way into normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateFactors {
    pub symbol: String,
    pub name: Option<String>,
    pub quote_type: QuoteType,
    pub sector: Option<String>,
    pub dividend_yield: Option<f64>,
    pub per: Option<f64>,
    pub beta: Option<f64>,
    pub roe: Option<f64>,
    pub profit_margin: Option<f64>,
    pub returns: Returns,
    /// Annualized weekly-return volatility.
    pub volatility: Option<f64>,
}

impl CandidateFactors {
    pub fn momentum_6m(&self) -> Option<f64> {
        self.returns.m6
    }
}

/// An immutable cache generation. Swapped wholesale, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorSnapshot {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub fetched_at: DateTime<Utc>,
    pub items: Vec<CandidateFactors>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Memory,
    Disk,
    Rebuild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub source: CacheSource,
    pub fetched_at: DateTime<Utc>,
}

/// Response for GET /api/recommendations/cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub fetched_at: Option<DateTime<Utc>>,
    pub item_count: usize,
    pub universe_size: usize,
    pub ttl_hours: i64,
    pub rebuilding: bool,
}
