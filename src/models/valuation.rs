use serde::{Deserialize, Serialize};

use crate::models::quote::QuoteType;

/// A position valued against a live quote, expressed in the reporting currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuedRow {
    pub symbol: String,
    pub name: Option<String>,
    pub account_type: String,
    pub shares: f64,
    /// Unit price converted to the reporting currency.
    pub price: f64,
    pub current_value: f64,
    pub investment_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,
    pub annual_dividend: f64,
    pub after_tax_gain: f64,
    pub change_percent: Option<f64>,
    pub sector: Option<String>,
    #[serde(rename = "type")]
    pub quote_type: QuoteType,
    /// Currency the instrument is quoted in (before conversion).
    pub currency: String,
}
