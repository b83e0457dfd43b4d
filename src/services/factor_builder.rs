use crate::external::market_data::{Fundamentals, HistoryPoint};
use crate::models::{CandidateFactors, QuoteType, Returns};
use crate::services::sector_map::localize_sector;
use crate::services::statistics_service;

/// Offsets into a weekly close series.
const WEEKS_1M: usize = 5;
const WEEKS_3M: usize = 13;
const WEEKS_6M: usize = 26;
const WEEKS_PER_YEAR: f64 = 52.0;

/// Builds a candidate snapshot from ~1 year of weekly closes plus a
/// fundamentals summary. Mutual funds and symbols without a usable close
/// are excluded from the candidate set.
pub fn build_candidate(
    symbol: &str,
    history: &[HistoryPoint],
    fundamentals: &Fundamentals,
) -> Option<CandidateFactors> {
    let quote_type = fundamentals.quote_type.unwrap_or_default();
    if quote_type == QuoteType::MutualFund {
        return None;
    }

    let closes: Vec<f64> = history
        .iter()
        .map(|p| p.close)
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect();
    if closes.is_empty() {
        return None;
    }

    Some(CandidateFactors {
        symbol: symbol.to_string(),
        name: fundamentals.short_name.clone(),
        quote_type,
        sector: localize_sector(fundamentals.sector.as_deref(), quote_type),
        dividend_yield: fundamentals.dividend_yield,
        per: fundamentals.per,
        beta: fundamentals.beta,
        roe: fundamentals.roe,
        profit_margin: fundamentals.profit_margin,
        returns: trailing_returns(&closes),
        volatility: weekly_volatility(&closes),
    })
}

/// Trailing returns measured from index offsets into the weekly series.
/// The 1-year return uses the first sample.
pub fn trailing_returns(closes: &[f64]) -> Returns {
    let Some(&last) = closes.last() else {
        return Returns::default();
    };
    let back = |weeks: usize| -> Option<f64> {
        let idx = closes.len().checked_sub(1 + weeks)?;
        simple_return(closes[idx], last)
    };

    Returns {
        m1: back(WEEKS_1M),
        m3: back(WEEKS_3M),
        m6: back(WEEKS_6M),
        y1: if closes.len() >= 2 { simple_return(closes[0], last) } else { None },
    }
}

fn simple_return(from: f64, to: f64) -> Option<f64> {
    if from > 0.0 {
        Some(to / from - 1.0)
    } else {
        None
    }
}

/// Weekly-return standard deviation annualized by sqrt(52).
pub fn weekly_volatility(closes: &[f64]) -> Option<f64> {
    let returns = statistics_service::period_returns(closes);
    if returns.len() < 2 {
        return None;
    }
    Some(statistics_service::volatility(&returns) * WEEKS_PER_YEAR.sqrt())
}
