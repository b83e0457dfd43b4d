use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// POST body for /api/analysis/rebalance. Percent values are 0-100.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RebalanceRequest {
    pub target_allocation: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalAction {
    Buy,
    Sell,
}

/// A sector-level rebalancing need. Security selection is left to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub sector: String,
    pub action: ProposalAction,
    pub amount: f64,
    pub current_value: f64,
    pub target_value: f64,
    pub current_percent: f64,
    pub target_percent: f64,
}
