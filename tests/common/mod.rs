#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use uuid::Uuid;

use folioscope::db::PortfolioStore;
use folioscope::external::market_data::{
    Fundamentals, HistoryPoint, Interval, MarketDataError, MarketDataProvider,
};
use folioscope::models::{NewOperation, Position, Quote, QuoteType, ValuePoint, WatchlistItem};

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Deterministic provider that counts every history and fundamentals call.
#[derive(Default)]
pub struct MockMarketData {
    pub fundamentals: HashMap<String, Fundamentals>,
    pub quotes: HashMap<String, Quote>,
    /// Weekly growth rate per symbol; symbols not listed grow 0.5%/week.
    pub trends: HashMap<String, f64>,
    pub failing: HashSet<String>,
    pub delay: Duration,
    pub history_calls: AtomicUsize,
    pub fundamentals_calls: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_candidate(mut self, symbol: &str, sector: &str, fundamentals: Fundamentals) -> Self {
        self.fundamentals.insert(
            symbol.to_string(),
            Fundamentals {
                short_name: Some(format!("{} Holdings", symbol)),
                quote_type: fundamentals.quote_type.or(Some(QuoteType::Equity)),
                sector: Some(sector.to_string()),
                ..fundamentals
            },
        );
        self
    }

    pub fn with_trend(mut self, symbol: &str, weekly: f64) -> Self {
        self.trends.insert(symbol.to_string(), weekly);
        self
    }

    pub fn with_quote(mut self, symbol: &str, price: f64, currency: &str, sector: &str) -> Self {
        self.quotes.insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                price,
                currency: currency.to_string(),
                change: None,
                change_percent: Some(0.8),
                dividend_rate: Some(price * 0.02),
                sector: Some(sector.to_string()),
                quote_type: QuoteType::Equity,
                short_name: Some(format!("{} Holdings", symbol)),
            },
        );
        self
    }

    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn fundamentals_calls(&self) -> usize {
        self.fundamentals_calls.load(Ordering::SeqCst)
    }
}

fn series(start: NaiveDate, end: NaiveDate, step_days: i64, base: f64, growth: f64) -> Vec<HistoryPoint> {
    let mut points = Vec::new();
    let mut date = start;
    let mut close = base;
    while date <= end {
        points.push(HistoryPoint { date, close });
        close *= 1.0 + growth;
        date += chrono::Duration::days(step_days);
    }
    points
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
    }

    async fn get_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<HistoryPoint>, MarketDataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(symbol) {
            return Err(MarketDataError::Network(format!("{} unreachable", symbol)));
        }

        let growth = self.trends.get(symbol).copied().unwrap_or(0.005);
        let step = match interval {
            Interval::Daily => 1,
            Interval::Weekly => 7,
            Interval::Monthly => 30,
        };
        Ok(series(start, end, step, 100.0, growth))
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(symbol) {
            return Err(MarketDataError::Network(format!("{} unreachable", symbol)));
        }
        self.fundamentals
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
    }
}

pub fn fundamentals(dividend_yield: f64, per: f64, beta: f64, roe: f64) -> Fundamentals {
    Fundamentals {
        dividend_yield: Some(dividend_yield),
        per: Some(per),
        beta: Some(beta),
        roe: Some(roe),
        profit_margin: Some(roe / 2.0),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub positions: Mutex<HashMap<Uuid, Vec<Position>>>,
    pub watchlist: Mutex<HashMap<Uuid, Vec<WatchlistItem>>>,
    pub history: Mutex<HashMap<Uuid, Vec<ValuePoint>>>,
    pub operations: Mutex<Vec<(Uuid, NewOperation)>>,
}

impl MemoryStore {
    pub fn add_position(&self, user_id: Uuid, position: Position) {
        self.positions.lock().entry(user_id).or_default().push(position);
    }

    pub fn add_watch(&self, user_id: Uuid, symbol: &str) {
        self.watchlist.lock().entry(user_id).or_default().push(WatchlistItem {
            symbol: symbol.to_string(),
            note: None,
        });
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn fetch_positions(&self, user_id: Uuid) -> Result<Vec<Position>, sqlx::Error> {
        Ok(self.positions.lock().get(&user_id).cloned().unwrap_or_default())
    }

    async fn fetch_watchlist(&self, user_id: Uuid) -> Result<Vec<WatchlistItem>, sqlx::Error> {
        Ok(self.watchlist.lock().get(&user_id).cloned().unwrap_or_default())
    }

    async fn fetch_value_history(&self, user_id: Uuid, since: NaiveDate) -> Result<Vec<ValuePoint>, sqlx::Error> {
        let mut points: Vec<ValuePoint> = self
            .history
            .lock()
            .get(&user_id)
            .map(|h| h.iter().copied().filter(|p| p.date >= since).collect())
            .unwrap_or_default();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn record_value_snapshot(&self, user_id: Uuid, point: ValuePoint) -> Result<(), sqlx::Error> {
        let mut history = self.history.lock();
        let points = history.entry(user_id).or_default();
        points.retain(|p| p.date != point.date);
        points.push(point);
        Ok(())
    }

    async fn append_operation(&self, user_id: Uuid, operation: NewOperation) -> Result<(), sqlx::Error> {
        self.operations.lock().push((user_id, operation));
        Ok(())
    }
}

pub fn temp_cache_path() -> PathBuf {
    std::env::temp_dir().join(format!("folioscope-test-{}.json", Uuid::new_v4()))
}
