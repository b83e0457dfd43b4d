use serde::{Deserialize, Serialize};

use crate::models::factor::{CacheMeta, Returns};

/// User risk preference driving the pre-filter and the weight vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" => Some(RiskTolerance::Low),
            "medium" => Some(RiskTolerance::Medium),
            "high" => Some(RiskTolerance::High),
            _ => None,
        }
    }
}

// ============================================================================
// Weights
// ============================================================================

/// Weights over the six sub-scores. `for_tolerance` always returns a
/// vector normalized to sum to 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FactorWeights {
    pub dividend: f64,
    pub stability: f64,
    pub quality: f64,
    pub momentum: f64,
    pub value: f64,
    pub diversity: f64,
}

impl FactorWeights {
    pub fn for_tolerance(tolerance: RiskTolerance) -> Self {
        let raw = match tolerance {
            RiskTolerance::Low => FactorWeights {
                dividend: 0.35,
                stability: 0.25,
                quality: 0.25,
                momentum: 0.05,
                value: 0.10,
                diversity: 0.15,
            },
            RiskTolerance::Medium => FactorWeights {
                dividend: 0.20,
                stability: 0.20,
                quality: 0.20,
                momentum: 0.25,
                value: 0.15,
                diversity: 0.15,
            },
            RiskTolerance::High => FactorWeights {
                dividend: 0.05,
                stability: 0.15,
                quality: 0.20,
                momentum: 0.35,
                value: 0.10,
                diversity: 0.15,
            },
        };
        raw.normalized()
    }

    pub fn sum(&self) -> f64 {
        self.dividend + self.stability + self.quality + self.momentum + self.value + self.diversity
    }

    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return *self;
        }
        FactorWeights {
            dividend: self.dividend / total,
            stability: self.stability / total,
            quality: self.quality / total,
            momentum: self.momentum / total,
            value: self.value / total,
            diversity: self.diversity / total,
        }
    }

    pub fn composite(&self, s: &SubScores) -> f64 {
        self.dividend * s.dividend
            + self.stability * s.stability
            + self.quality * s.quality
            + self.momentum * s.momentum
            + self.value * s.value
            + self.diversity * s.diversity
    }
}

// ============================================================================
// Score breakdown
// ============================================================================

/// Min-max normalized factor values (0-1) relative to the eligible set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct NormalizedFactors {
    pub dividend_yield: f64,
    pub per: f64,
    pub beta: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub roe: f64,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
    pub dividend: f64,
    pub stability: f64,
    pub quality: f64,
    pub momentum: f64,
    pub value: f64,
    pub diversity: f64,
}

/// Raw inputs that went into the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorInputs {
    pub dividend_yield: Option<f64>,
    pub per: Option<f64>,
    pub beta: Option<f64>,
    pub volatility: Option<f64>,
    pub momentum_6m: Option<f64>,
    pub roe: Option<f64>,
    pub profit_margin: Option<f64>,
    /// Share of portfolio value already in the candidate's sector.
    pub sector_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub weights: FactorWeights,
    pub normalized: NormalizedFactors,
    pub sub_scores: SubScores,
    /// Points each sub-score contributed to the 0-100 score.
    pub contributions: SubScores,
    pub inputs: FactorInputs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub score: u8,
    pub reason: String,
    pub tags: Vec<String>,
    pub breakdown: ScoreBreakdown,
    pub backtest: Returns,
}

// ============================================================================
// API types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationDiagnostics {
    pub cache: Option<CacheMeta>,
    pub universe_size: usize,
    pub excluded_count: usize,
    pub fund_filtered_count: usize,
    pub risk_filtered_count: usize,
    pub eligible_count: usize,
    pub weights: FactorWeights,
}

/// Query parameters for GET /api/recommendations
#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub risk: Option<String>,
    pub diagnostics: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RecommendationsResponse {
    Plain(Vec<Recommendation>),
    WithDiagnostics {
        recommendations: Vec<Recommendation>,
        diagnostics: RecommendationDiagnostics,
    },
}
