use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WatchlistItem {
    pub symbol: String,
    pub note: Option<String>,
}

/// One point of the user's historical total portfolio value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub total_value: f64,
}

/// Append-only operation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOperation {
    pub kind: String,
    pub detail: serde_json::Value,
}
