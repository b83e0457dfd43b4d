use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::db::store::PortfolioStore;
use crate::errors::AppError;
use crate::external::market_data::MarketDataProvider;
use crate::models::{
    CandidateFactors, FactorInputs, FactorWeights, NormalizedFactors, Recommendation,
    RecommendationDiagnostics, RiskTolerance, ScoreBreakdown, SubScores, ValuedRow,
};
use crate::services::factor_cache::FactorCache;
use crate::services::sector_map::sector_key;
use crate::services::valuation_service::{self, ValuationPolicy};

/// Neutral normalized value for missing inputs and degenerate sets.
const NEUTRAL: f64 = 0.5;

const DIVIDEND_TAG_MIN: f64 = 0.03;
const UPTREND_TAG_MIN: f64 = 0.12;
const LOW_VOLATILITY_TAG_MAX: f64 = 0.22;
const VALUE_TAG_MAX_PER: f64 = 15.0;
const QUALITY_TAG_MIN: f64 = 0.75;
const MAX_REASONS: usize = 2;
const MAX_TAGS: usize = 3;

#[derive(Debug, Clone)]
pub struct RecommendationPolicy {
    pub count: usize,
    pub sector_cap: usize,
    pub low_risk_max_volatility: f64,
    pub low_risk_max_beta: f64,
    /// Held sectors below this share of portfolio value still earn partial diversity credit.
    pub underweight_sector_threshold: f64,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            count: 6,
            sector_cap: 2,
            low_risk_max_volatility: 0.35,
            low_risk_max_beta: 1.3,
            underweight_sector_threshold: 0.10,
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Min-max scaler over the valid (finite) values of one factor.
#[derive(Debug, Clone, Copy)]
pub struct MinMax {
    min: f64,
    max: f64,
    valid: usize,
}

impl MinMax {
    pub fn fit<I: IntoIterator<Item = Option<f64>>>(values: I) -> Self {
        let mut scaler = MinMax {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            valid: 0,
        };
        for v in values.into_iter().flatten().filter(|v| v.is_finite()) {
            scaler.min = scaler.min.min(v);
            scaler.max = scaler.max.max(v);
            scaler.valid += 1;
        }
        scaler
    }

    fn degenerate(&self) -> bool {
        self.valid < 2 || (self.max - self.min).abs() < f64::EPSILON
    }

    /// Scales into [0, 1]. Missing values and degenerate sets get 0.5.
    pub fn normalize(&self, value: Option<f64>) -> f64 {
        match value.filter(|v| v.is_finite()) {
            Some(v) if !self.degenerate() => ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0),
            _ => NEUTRAL,
        }
    }
}

/// Non-positive P/E carries no valuation signal.
fn valid_per(c: &CandidateFactors) -> Option<f64> {
    c.per.filter(|p| *p > 0.0)
}

struct Scalers {
    dividend_yield: MinMax,
    per: MinMax,
    beta: MinMax,
    volatility: MinMax,
    momentum: MinMax,
    roe: MinMax,
    profit_margin: MinMax,
}

impl Scalers {
    fn fit(eligible: &[&CandidateFactors]) -> Self {
        Self {
            dividend_yield: MinMax::fit(eligible.iter().map(|c| c.dividend_yield)),
            per: MinMax::fit(eligible.iter().map(|c| valid_per(c))),
            beta: MinMax::fit(eligible.iter().map(|c| c.beta)),
            volatility: MinMax::fit(eligible.iter().map(|c| c.volatility)),
            momentum: MinMax::fit(eligible.iter().map(|c| c.momentum_6m())),
            roe: MinMax::fit(eligible.iter().map(|c| c.roe)),
            profit_margin: MinMax::fit(eligible.iter().map(|c| c.profit_margin)),
        }
    }

    fn normalize(&self, c: &CandidateFactors) -> NormalizedFactors {
        NormalizedFactors {
            dividend_yield: self.dividend_yield.normalize(c.dividend_yield),
            per: self.per.normalize(valid_per(c)),
            beta: self.beta.normalize(c.beta),
            volatility: self.volatility.normalize(c.volatility),
            momentum: self.momentum.normalize(c.momentum_6m()),
            roe: self.roe.normalize(c.roe),
            profit_margin: self.profit_margin.normalize(c.profit_margin),
        }
    }
}

// ============================================================================
// Portfolio context
// ============================================================================

/// What the user already holds, as value share per sector.
#[derive(Debug, Clone, Default)]
pub struct PortfolioContext {
    pub sector_weights: HashMap<String, f64>,
}

impl PortfolioContext {
    pub fn from_rows(rows: &[ValuedRow]) -> Self {
        let total: f64 = rows.iter().map(|r| r.current_value).filter(|v| *v > 0.0).sum();
        let mut sector_weights = HashMap::new();
        if total > 0.0 {
            for row in rows.iter().filter(|r| r.current_value > 0.0) {
                *sector_weights.entry(sector_key(row.sector.as_deref())).or_insert(0.0) +=
                    row.current_value / total;
            }
        }
        Self { sector_weights }
    }

    pub fn sector_weight(&self, sector: &str) -> f64 {
        self.sector_weights.get(sector).copied().unwrap_or(0.0)
    }
}

fn diversity_score(sector: Option<&str>, context: &PortfolioContext, policy: &RecommendationPolicy) -> f64 {
    let Some(sector) = sector else {
        return NEUTRAL;
    };
    let weight = context.sector_weight(sector);
    if weight <= 0.0 {
        1.0
    } else if weight < policy.underweight_sector_threshold {
        0.6
    } else {
        0.0
    }
}

// ============================================================================
// Scoring
// ============================================================================

fn sub_scores(n: &NormalizedFactors, diversity: f64) -> SubScores {
    SubScores {
        dividend: n.dividend_yield,
        stability: 0.5 * (1.0 - n.volatility) + 0.5 * (1.0 - n.beta),
        quality: 0.6 * n.roe + 0.4 * n.profit_margin,
        momentum: n.momentum,
        value: 1.0 - n.per,
        diversity,
    }
}

fn contributions(w: &FactorWeights, s: &SubScores) -> SubScores {
    SubScores {
        dividend: w.dividend * s.dividend * 100.0,
        stability: w.stability * s.stability * 100.0,
        quality: w.quality * s.quality * 100.0,
        momentum: w.momentum * s.momentum * 100.0,
        value: w.value * s.value * 100.0,
        diversity: w.diversity * s.diversity * 100.0,
    }
}

fn to_score(composite: f64) -> u8 {
    if !composite.is_finite() {
        return 0;
    }
    (composite * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Rule-based reason sentence and tags.
fn explain(
    c: &CandidateFactors,
    sub: &SubScores,
    sector_held: bool,
    tolerance: RiskTolerance,
) -> (String, Vec<String>) {
    let mut reasons: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();

    if let Some(y) = c.dividend_yield.filter(|y| *y >= DIVIDEND_TAG_MIN) {
        tags.push("High dividend".to_string());
        reasons.push(format!("dividend yield of {:.1}%", y * 100.0));
    }
    if let Some(m) = c.momentum_6m().filter(|m| *m >= UPTREND_TAG_MIN) {
        tags.push("Uptrend".to_string());
        reasons.push(format!("6-month return of +{:.1}%", m * 100.0));
    }
    if let Some(v) = c.volatility.filter(|v| *v <= LOW_VOLATILITY_TAG_MAX) {
        tags.push("Low volatility".to_string());
        reasons.push(format!("low volatility ({:.0}% annualized)", v * 100.0));
    }
    if let Some(p) = valid_per(c).filter(|p| *p <= VALUE_TAG_MAX_PER) {
        tags.push("Value".to_string());
        reasons.push(format!("P/E of {:.1}", p));
    }
    if sub.quality >= QUALITY_TAG_MIN {
        tags.push("High quality".to_string());
        reasons.push("strong ROE and margins".to_string());
    }
    if let Some(sector) = c.sector.as_deref().filter(|_| !sector_held) {
        tags.push("Diversification".to_string());
        reasons.push(format!("adds exposure to {}, which you do not hold", sector));
    }

    tags.truncate(MAX_TAGS);

    let reason = if reasons.is_empty() {
        match tolerance {
            RiskTolerance::Low => "A steady candidate that fits a conservative profile.".to_string(),
            RiskTolerance::Medium => "A balanced candidate across income, quality and growth.".to_string(),
            RiskTolerance::High => "A growth-leaning candidate for a higher risk appetite.".to_string(),
        }
    } else {
        reasons.truncate(MAX_REASONS);
        let mut sentence = reasons.join("; ");
        if let Some(first) = sentence.get(..1) {
            sentence = first.to_uppercase() + &sentence[1..];
        }
        sentence + "."
    };

    (reason, tags)
}

struct Scored<'a> {
    candidate: &'a CandidateFactors,
    composite: f64,
    recommendation: Recommendation,
}

/// Recommendations plus the filter counts behind them.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    pub recommendations: Vec<Recommendation>,
    pub excluded_count: usize,
    pub fund_filtered_count: usize,
    pub risk_filtered_count: usize,
    pub eligible_count: usize,
}

/// Ranks the candidate set for one risk tolerance and returns a
/// sector-capped shortlist. Pure: same inputs give the same output.
pub fn recommend(
    candidates: &[CandidateFactors],
    tolerance: RiskTolerance,
    context: &PortfolioContext,
    excluded: &HashSet<String>,
    policy: &RecommendationPolicy,
) -> EngineOutcome {
    let mut outcome = EngineOutcome::default();
    let mut seen: HashSet<String> = HashSet::new();

    // 1. Eligibility and risk pre-filter
    let mut eligible: Vec<&CandidateFactors> = Vec::new();
    for c in candidates {
        let symbol = c.symbol.trim().to_uppercase();
        if !seen.insert(symbol.clone()) {
            continue;
        }
        if excluded.contains(&symbol) {
            outcome.excluded_count += 1;
            continue;
        }
        if c.quote_type.is_fund() {
            outcome.fund_filtered_count += 1;
            continue;
        }
        if tolerance == RiskTolerance::Low {
            let too_volatile = c.volatility.is_some_and(|v| v > policy.low_risk_max_volatility);
            let too_sensitive = c.beta.is_some_and(|b| b > policy.low_risk_max_beta);
            if too_volatile || too_sensitive {
                outcome.risk_filtered_count += 1;
                continue;
            }
        }
        eligible.push(c);
    }
    outcome.eligible_count = eligible.len();

    // 2. Normalize across the eligible set and score
    let scalers = Scalers::fit(&eligible);
    let weights = FactorWeights::for_tolerance(tolerance);

    let mut scored: Vec<Scored> = eligible
        .iter()
        .map(|&c| {
            let normalized = scalers.normalize(c);
            let sector_weight = c.sector.as_deref().map(|s| context.sector_weight(s)).unwrap_or(0.0);
            let diversity = diversity_score(c.sector.as_deref(), context, policy);
            let sub = sub_scores(&normalized, diversity);
            let composite = weights.composite(&sub);
            let (reason, tags) = explain(c, &sub, sector_weight > 0.0, tolerance);

            Scored {
                candidate: c,
                composite,
                recommendation: Recommendation {
                    ticker: c.symbol.clone(),
                    name: c.name.clone(),
                    sector: c.sector.clone(),
                    score: to_score(composite),
                    reason,
                    tags,
                    breakdown: ScoreBreakdown {
                        weights,
                        normalized,
                        sub_scores: sub,
                        contributions: contributions(&weights, &sub),
                        inputs: FactorInputs {
                            dividend_yield: c.dividend_yield,
                            per: c.per,
                            beta: c.beta,
                            volatility: c.volatility,
                            momentum_6m: c.momentum_6m(),
                            roe: c.roe,
                            profit_margin: c.profit_margin,
                            sector_weight,
                        },
                    },
                    backtest: c.returns,
                },
            }
        })
        .collect();

    // 3. Rank: score, then unrounded composite, then ticker
    scored.sort_by(|a, b| {
        b.recommendation
            .score
            .cmp(&a.recommendation.score)
            .then_with(|| b.composite.partial_cmp(&a.composite).unwrap_or(Ordering::Equal))
            .then_with(|| a.candidate.symbol.cmp(&b.candidate.symbol))
    });

    // 4. Sector-capped selection, backfilled in rank order
    let selected = select_with_sector_cap(&scored, policy.count, policy.sector_cap);
    outcome.recommendations = selected
        .into_iter()
        .map(|i| scored[i].recommendation.clone())
        .collect();
    outcome
}

/// Indices into `ranked` of the picks, in rank order.
fn select_with_sector_cap(ranked: &[Scored], count: usize, cap: usize) -> Vec<usize> {
    let mut picked: Vec<usize> = Vec::new();
    let mut per_sector: HashMap<String, usize> = HashMap::new();

    for (i, s) in ranked.iter().enumerate() {
        if picked.len() >= count {
            break;
        }
        let n = per_sector.entry(sector_key(s.candidate.sector.as_deref())).or_insert(0);
        if *n < cap {
            *n += 1;
            picked.push(i);
        }
    }

    if picked.len() < count {
        let taken: HashSet<usize> = picked.iter().copied().collect();
        let backfill: Vec<usize> = (0..ranked.len())
            .filter(|i| !taken.contains(i))
            .take(count - picked.len())
            .collect();
        picked.extend(backfill);
        picked.sort_unstable();
    }
    picked
}

// ============================================================================
// Service
// ============================================================================

pub struct RecommendationService {
    store: Arc<dyn PortfolioStore>,
    market_data: Arc<dyn MarketDataProvider>,
    factor_cache: Arc<FactorCache>,
    valuation: ValuationPolicy,
    policy: RecommendationPolicy,
}

impl RecommendationService {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        market_data: Arc<dyn MarketDataProvider>,
        factor_cache: Arc<FactorCache>,
        valuation: ValuationPolicy,
        policy: RecommendationPolicy,
    ) -> Self {
        Self {
            store,
            market_data,
            factor_cache,
            valuation,
            policy,
        }
    }

    /// Personalized recommendations for one user. Degrades to an empty list
    /// when the factor cache has nothing.
    pub async fn recommend_for_user(
        &self,
        user_id: Uuid,
        tolerance: RiskTolerance,
    ) -> Result<(Vec<Recommendation>, RecommendationDiagnostics), AppError> {
        let positions = self.store.fetch_positions(user_id).await?;
        let watchlist = self.store.fetch_watchlist(user_id).await?;

        let excluded: HashSet<String> = positions
            .iter()
            .map(|p| p.symbol.as_str())
            .chain(watchlist.iter().map(|w| w.symbol.as_str()))
            .map(|s| s.trim().to_uppercase())
            .collect();

        let rows = valuation_service::value_portfolio(self.market_data.as_ref(), &positions, &self.valuation).await;
        let context = PortfolioContext::from_rows(&rows);

        let cached = self.factor_cache.get_candidate_factors().await;
        let weights = FactorWeights::for_tolerance(tolerance);

        if cached.items().is_empty() {
            warn!("Factor cache is empty; returning no recommendations for user {}", user_id);
            let diagnostics = RecommendationDiagnostics {
                cache: Some(cached.meta),
                universe_size: self.factor_cache.universe().len(),
                excluded_count: 0,
                fund_filtered_count: 0,
                risk_filtered_count: 0,
                eligible_count: 0,
                weights,
            };
            return Ok((Vec::new(), diagnostics));
        }

        let outcome = recommend(cached.items(), tolerance, &context, &excluded, &self.policy);
        info!(
            "Recommended {} of {} eligible candidates for user {} ({:?})",
            outcome.recommendations.len(),
            outcome.eligible_count,
            user_id,
            tolerance
        );

        let diagnostics = RecommendationDiagnostics {
            cache: Some(cached.meta),
            universe_size: self.factor_cache.universe().len(),
            excluded_count: outcome.excluded_count,
            fund_filtered_count: outcome.fund_filtered_count,
            risk_filtered_count: outcome.risk_filtered_count,
            eligible_count: outcome.eligible_count,
            weights,
        };
        Ok((outcome.recommendations, diagnostics))
    }
}
