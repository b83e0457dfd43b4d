use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A holding owned by the user. Read-only input for the engine; the store
/// owns its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    /// Per-unit acquisition price in the instrument's quote currency.
    pub acquisition_price: f64,
    pub account_type: String,
    pub locked: bool,
}

impl Position {
    pub fn new(symbol: impl Into<String>, shares: f64, acquisition_price: f64, account_type: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            acquisition_price,
            account_type: account_type.into(),
            locked: false,
        }
    }

    /// Accounts whose type carries the marker (e.g. "NISA", "NISA成長投資枠")
    /// are exempt from capital-gains tax.
    pub fn is_tax_advantaged(&self, marker: &str) -> bool {
        !marker.is_empty() && self.account_type.contains(marker)
    }
}
