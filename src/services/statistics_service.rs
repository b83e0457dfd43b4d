//! Portfolio statistics: pure, synchronous estimators over valued rows and
//! value series. Degenerate input yields neutral values, never errors.

use std::collections::{BTreeMap, HashMap};

use crate::external::market_data::HistoryPoint;
use crate::models::{
    AxisBreakdown, DiversificationAxes, DiversificationBreakdown, DiversificationWeights,
    GroupShare, PortfolioTotals, RiskMetrics, SectorTotals, ValuePoint, ValuedRow,
};
use crate::services::sector_map::sector_key;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.001;

/// Below this many days annualizing a return is unreliable.
const MIN_ANNUALIZATION_DAYS: i64 = 30;
const MAX_ANNUALIZED_RETURN: f64 = 10.0;
const TOP_GROUPS: usize = 3;

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

// ============================================================================
// Return-series estimators
// ============================================================================

/// Simple period-over-period returns. Periods starting from a non-positive
/// value are skipped.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Population standard deviation of periodic returns.
pub fn volatility(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let m = mean(returns);
    let variance = returns.iter().map(|r| (r - m).powi(2)).sum::<f64>() / returns.len() as f64;
    variance.sqrt()
}

pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let vol = volatility(returns);
    // Steady compounding leaves only rounding noise in the stddev
    if returns.is_empty() || vol < f64::EPSILON {
        return 0.0;
    }
    (mean(returns) - risk_free_rate) / vol
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

/// Covariance over market variance; 1.0 (market-neutral) when the series
/// cannot support an estimate.
pub fn beta(portfolio_returns: &[f64], market_returns: &[f64]) -> f64 {
    if portfolio_returns.is_empty() || portfolio_returns.len() != market_returns.len() {
        return 1.0;
    }
    let mean_p = mean(portfolio_returns);
    let mean_m = mean(market_returns);

    let mut cov = 0.0;
    let mut var_m = 0.0;
    for (p, m) in portfolio_returns.iter().zip(market_returns) {
        cov += (p - mean_p) * (m - mean_m);
        var_m += (m - mean_m).powi(2);
    }

    if var_m.abs() < f64::EPSILON {
        return 1.0;
    }
    cov / var_m
}

/// CAPM residual.
pub fn alpha(portfolio_return: f64, market_return: f64, beta: f64, risk_free_rate: f64) -> f64 {
    portfolio_return - (risk_free_rate + beta * (market_return - risk_free_rate))
}

pub fn annualized_return(start_value: f64, end_value: f64, days: i64) -> f64 {
    if start_value <= 0.0 {
        return 0.0;
    }
    let simple = end_value / start_value - 1.0;
    if days < MIN_ANNUALIZATION_DAYS {
        return simple;
    }
    let annualized = (1.0 + simple).powf(365.0 / days as f64) - 1.0;
    if annualized.is_nan() {
        return -1.0;
    }
    annualized.clamp(-1.0, MAX_ANNUALIZED_RETURN)
}

// ============================================================================
// Diversification
// ============================================================================

/// Normalized Herfindahl diversity over group values, 0-100. Zero for a
/// single group (or none).
pub fn herfindahl_diversity(values: &[f64]) -> f64 {
    let positive: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    let n = positive.len();
    if n <= 1 {
        return 0.0;
    }
    let total: f64 = positive.iter().sum();
    let hhi: f64 = positive.iter().map(|v| (v / total).powi(2)).sum();
    let max_spread = 1.0 - 1.0 / n as f64;
    100.0 * ((1.0 - hhi) / max_spread).clamp(0.0, 1.0)
}

fn axis_breakdown<'a>(rows: &'a [ValuedRow], key: impl Fn(&'a ValuedRow) -> String) -> AxisBreakdown {
    let mut groups: HashMap<String, f64> = HashMap::new();
    for row in rows.iter().filter(|r| r.current_value > 0.0) {
        *groups.entry(key(row)).or_insert(0.0) += row.current_value;
    }

    let values: Vec<f64> = groups.values().copied().collect();
    let total: f64 = values.iter().sum();

    let mut shares: Vec<GroupShare> = groups
        .into_iter()
        .map(|(key, value)| GroupShare {
            percent: if total > 0.0 { round1(value / total * 100.0) } else { 0.0 },
            key,
            value,
        })
        .collect();
    shares.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    shares.truncate(TOP_GROUPS);

    AxisBreakdown {
        score: herfindahl_diversity(&values),
        count: values.len(),
        top: shares,
    }
}

pub fn diversification_breakdown(rows: &[ValuedRow]) -> DiversificationBreakdown {
    let weights = DiversificationWeights::default();

    let sector = axis_breakdown(rows, |r| sector_key(r.sector.as_deref()));
    let ticker = axis_breakdown(rows, |r| r.symbol.clone());
    let currency = axis_breakdown(rows, |r| r.currency.clone());
    let quote_type = axis_breakdown(rows, |r| r.quote_type.label().to_string());

    let score = weights.sector * sector.score
        + weights.ticker * ticker.score
        + weights.currency * currency.score
        + weights.quote_type * quote_type.score;

    let rounded = |mut a: AxisBreakdown| {
        a.score = round1(a.score);
        a
    };

    DiversificationBreakdown {
        score: round1(score),
        weights,
        axes: DiversificationAxes {
            sector: rounded(sector),
            ticker: rounded(ticker),
            currency: rounded(currency),
            quote_type: rounded(quote_type),
        },
    }
}

// ============================================================================
// Aggregates
// ============================================================================

pub fn sector_totals(rows: &[ValuedRow]) -> SectorTotals {
    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(sector_key(row.sector.as_deref())).or_insert(0.0) += row.current_value;
    }
    totals
}

pub fn portfolio_totals(rows: &[ValuedRow]) -> PortfolioTotals {
    let total_value: f64 = rows.iter().map(|r| r.current_value).sum();
    let total_investment: f64 = rows.iter().map(|r| r.investment_value).sum();
    let total_gain = total_value - total_investment;
    let annual_dividend: f64 = rows.iter().map(|r| r.annual_dividend).sum();

    PortfolioTotals {
        total_value,
        total_investment,
        total_gain,
        total_gain_percent: if total_investment > 0.0 {
            round2(total_gain / total_investment * 100.0)
        } else {
            0.0
        },
        after_tax_gain: rows.iter().map(|r| r.after_tax_gain).sum(),
        annual_dividend,
        dividend_yield_percent: if total_value > 0.0 {
            round2(annual_dividend / total_value * 100.0)
        } else {
            0.0
        },
    }
}

/// Risk metrics over the stored value history, with beta/alpha measured
/// against the market series on the dates both share.
pub fn risk_metrics(history: &[ValuePoint], market: &[HistoryPoint], risk_free_rate: f64) -> RiskMetrics {
    if history.len() < 2 {
        return RiskMetrics {
            beta: 1.0,
            observations: 0,
            ..Default::default()
        };
    }

    let values: Vec<f64> = history.iter().map(|p| p.total_value).collect();
    let returns = period_returns(&values);
    let first = history[0];
    let last = history[history.len() - 1];
    let days = (last.date - first.date).num_days();

    let market_by_date: HashMap<_, f64> = market.iter().map(|p| (p.date, p.close)).collect();
    let aligned: Vec<(f64, f64)> = history
        .iter()
        .filter_map(|p| market_by_date.get(&p.date).map(|m| (p.total_value, *m)))
        .collect();

    let (beta_value, alpha_value) = if aligned.len() >= 3 {
        let p: Vec<f64> = aligned.iter().map(|(p, _)| *p).collect();
        let m: Vec<f64> = aligned.iter().map(|(_, m)| *m).collect();
        let b = beta(&period_returns(&p), &period_returns(&m));
        let p_ret = p[p.len() - 1] / p[0] - 1.0;
        let m_ret = m[m.len() - 1] / m[0] - 1.0;
        let a = if p_ret.is_finite() && m_ret.is_finite() {
            alpha(p_ret, m_ret, b, risk_free_rate)
        } else {
            0.0
        };
        (b, a)
    } else {
        (1.0, 0.0)
    };

    RiskMetrics {
        volatility: volatility(&returns),
        sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
        max_drawdown: max_drawdown(&values),
        beta: beta_value,
        alpha: alpha_value,
        annualized_return: annualized_return(first.total_value, last.total_value, days),
        observations: returns.len(),
        history_days: days,
    }
}
