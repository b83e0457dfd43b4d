use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::valuation::ValuedRow;

// ============================================================================
// Diversification
// ============================================================================

/// One group's share of portfolio value on an axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupShare {
    pub key: String,
    pub value: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisBreakdown {
    /// Normalized Herfindahl diversity score, 0-100.
    pub score: f64,
    /// Distinct groups with positive value.
    pub count: usize,
    pub top: Vec<GroupShare>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DiversificationWeights {
    pub sector: f64,
    pub ticker: f64,
    pub currency: f64,
    #[serde(rename = "type")]
    pub quote_type: f64,
}

impl Default for DiversificationWeights {
    fn default() -> Self {
        Self {
            sector: 0.45,
            ticker: 0.35,
            currency: 0.15,
            quote_type: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiversificationAxes {
    pub sector: AxisBreakdown,
    pub ticker: AxisBreakdown,
    pub currency: AxisBreakdown,
    #[serde(rename = "type")]
    pub quote_type: AxisBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiversificationBreakdown {
    pub score: f64,
    pub weights: DiversificationWeights,
    pub axes: DiversificationAxes,
}

// ============================================================================
// Portfolio statistics bundle
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PortfolioTotals {
    pub total_value: f64,
    pub total_investment: f64,
    pub total_gain: f64,
    pub total_gain_percent: f64,
    pub after_tax_gain: f64,
    pub annual_dividend: f64,
    pub dividend_yield_percent: f64,
}

/// Risk/return metrics over the stored value history. Zeroed when there is
/// not enough history.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RiskMetrics {
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub beta: f64,
    pub alpha: f64,
    pub annualized_return: f64,
    pub observations: usize,
    pub history_days: i64,
}

/// Response for GET /api/analysis/portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioAnalysis {
    pub analysis_date: String,
    pub position_count: usize,
    pub totals: PortfolioTotals,
    pub risk: RiskMetrics,
    pub diversification: DiversificationBreakdown,
    pub rows: Vec<ValuedRow>,
}

/// Response for GET /api/analysis/sectors
pub type SectorTotals = BTreeMap<String, f64>;
