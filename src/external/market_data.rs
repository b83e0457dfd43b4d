use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Quote, QuoteType};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_yahoo(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }
}

/// Fundamentals summary. Every numeric field is optional: absent data is
/// never coerced to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    pub short_name: Option<String>,
    pub quote_type: Option<QuoteType>,
    pub sector: Option<String>,
    pub roe: Option<f64>,
    pub profit_margin: Option<f64>,
    pub per: Option<f64>,
    pub beta: Option<f64>,
    /// Fraction, e.g. 0.032 for 3.2%.
    pub dividend_yield: Option<f64>,
    pub market_cap: Option<f64>,
    pub eps: Option<f64>,
    pub pbr: Option<f64>,
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data for symbol {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Closing prices in ascending date order.
    async fn get_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<HistoryPoint>, MarketDataError>;

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError>;
}
