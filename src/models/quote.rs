use serde::{Deserialize, Serialize};

/// Instrument classification as reported by the market data provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum QuoteType {
    #[serde(rename = "EQUITY")]
    Equity,
    #[serde(rename = "ETF")]
    Etf,
    #[serde(rename = "MUTUALFUND")]
    MutualFund,
    #[serde(rename = "INDEX")]
    Index,
    #[serde(rename = "CURRENCY")]
    Currency,
    #[default]
    #[serde(other, rename = "OTHER")]
    Other,
}

impl QuoteType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "EQUITY" => QuoteType::Equity,
            "ETF" => QuoteType::Etf,
            "MUTUALFUND" | "MUTUAL_FUND" | "FUND" => QuoteType::MutualFund,
            "INDEX" => QuoteType::Index,
            "CURRENCY" => QuoteType::Currency,
            _ => QuoteType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuoteType::Equity => "EQUITY",
            QuoteType::Etf => "ETF",
            QuoteType::MutualFund => "MUTUALFUND",
            QuoteType::Index => "INDEX",
            QuoteType::Currency => "CURRENCY",
            QuoteType::Other => "OTHER",
        }
    }

    /// Funds are quoted per 10,000 units.
    pub fn is_fund(&self) -> bool {
        matches!(self, QuoteType::MutualFund)
    }
}

/// Spot quote for one symbol, fetched at most once per valuation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    /// Annual dividend per unit, in the quote currency.
    pub dividend_rate: Option<f64>,
    pub sector: Option<String>,
    pub quote_type: QuoteType,
    pub short_name: Option<String>,
}
