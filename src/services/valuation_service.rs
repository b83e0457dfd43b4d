use std::collections::{BTreeSet, HashMap};

use futures::future::join_all;
use tracing::{info, warn};

use crate::external::market_data::MarketDataProvider;
use crate::models::{Position, Quote, QuoteType, ValuedRow};
use crate::services::sector_map::localize_sector;

pub const DEFAULT_TAX_RATE: f64 = 0.20315;
pub const DEFAULT_FX_FALLBACK_RATE: f64 = 150.0;
/// Funds are quoted per this many units.
pub const FUND_UNIT_DIVISOR: f64 = 10_000.0;

/// Flat valuation rules: one capital-gains rate and one foreign currency.
#[derive(Debug, Clone)]
pub struct ValuationPolicy {
    pub tax_rate: f64,
    /// Account types containing this marker are tax-advantaged.
    pub tax_advantaged_marker: String,
    pub reporting_currency: String,
    /// Provider symbol quoting USD in the reporting currency.
    pub fx_symbol: String,
    pub fx_fallback_rate: f64,
}

impl Default for ValuationPolicy {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            tax_advantaged_marker: "NISA".to_string(),
            reporting_currency: "JPY".to_string(),
            fx_symbol: "USDJPY=X".to_string(),
            fx_fallback_rate: DEFAULT_FX_FALLBACK_RATE,
        }
    }
}

fn unit_divisor(quote_type: QuoteType) -> f64 {
    if quote_type.is_fund() {
        FUND_UNIT_DIVISOR
    } else {
        1.0
    }
}

/// Values one position against its quote. A missing quote values the
/// position at zero instead of dropping it. Only USD quotes are converted;
/// the acquisition price is taken to be in the quote currency and converted
/// at the same rate.
pub fn value(position: &Position, quote: Option<&Quote>, fx_rate: f64, policy: &ValuationPolicy) -> ValuedRow {
    let quote_type = quote.map(|q| q.quote_type).unwrap_or_default();
    let currency = quote
        .map(|q| q.currency.clone())
        .unwrap_or_else(|| policy.reporting_currency.clone());

    let rate = if currency.eq_ignore_ascii_case("USD") && fx_rate.is_finite() && fx_rate > 0.0 {
        fx_rate
    } else {
        1.0
    };
    let divisor = unit_divisor(quote_type);

    let price = quote.map(|q| q.price).filter(|p| p.is_finite()).unwrap_or(0.0) * rate;
    let dividend_rate = quote.and_then(|q| q.dividend_rate).filter(|d| d.is_finite()).unwrap_or(0.0) * rate;

    let current_value = price * position.shares / divisor;
    let investment_value = position.acquisition_price * rate * position.shares / divisor;
    let gain_loss = current_value - investment_value;
    let gain_loss_percent = if investment_value > 0.0 {
        gain_loss / investment_value * 100.0
    } else {
        0.0
    };

    let after_tax_gain = if position.is_tax_advantaged(&policy.tax_advantaged_marker) || gain_loss <= 0.0 {
        gain_loss
    } else {
        gain_loss * (1.0 - policy.tax_rate)
    };

    ValuedRow {
        symbol: position.symbol.clone(),
        name: quote.and_then(|q| q.short_name.clone()),
        account_type: position.account_type.clone(),
        shares: position.shares,
        price,
        current_value,
        investment_value,
        gain_loss,
        gain_loss_percent,
        annual_dividend: dividend_rate * position.shares / divisor,
        after_tax_gain,
        change_percent: quote.and_then(|q| q.change_percent),
        sector: localize_sector(quote.and_then(|q| q.sector.as_deref()), quote_type),
        quote_type,
        currency,
    }
}

/// Values every position, looking quotes up by symbol.
pub fn value_all(
    positions: &[Position],
    quotes: &HashMap<String, Quote>,
    fx_rate: f64,
    policy: &ValuationPolicy,
) -> Vec<ValuedRow> {
    positions
        .iter()
        .map(|p| value(p, quotes.get(&p.symbol), fx_rate, policy))
        .collect()
}

/// Fetches one quote per distinct symbol. Failed lookups are logged and
/// left out; the position then values at zero.
pub async fn fetch_quotes(provider: &dyn MarketDataProvider, symbols: &[String]) -> HashMap<String, Quote> {
    let unique: BTreeSet<&String> = symbols.iter().collect();
    let results = join_all(unique.into_iter().map(|symbol| async move {
        (symbol.clone(), provider.get_quote(symbol).await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(symbol, result)| match result {
            Ok(quote) => Some((symbol, quote)),
            Err(e) => {
                warn!("Quote lookup failed for {}: {}", symbol, e);
                None
            }
        })
        .collect()
}

/// USD rate in the reporting currency, or the configured fallback.
pub async fn fetch_fx_rate(provider: &dyn MarketDataProvider, policy: &ValuationPolicy) -> f64 {
    match provider.get_quote(&policy.fx_symbol).await {
        Ok(q) if q.price.is_finite() && q.price > 0.0 => q.price,
        Ok(q) => {
            warn!(
                "FX quote {} returned unusable price {}; using fallback {}",
                policy.fx_symbol, q.price, policy.fx_fallback_rate
            );
            policy.fx_fallback_rate
        }
        Err(e) => {
            warn!(
                "FX quote {} failed: {}; using fallback {}",
                policy.fx_symbol, e, policy.fx_fallback_rate
            );
            policy.fx_fallback_rate
        }
    }
}

/// Quotes every held symbol once, converts USD at the live rate, and
/// values each position.
pub async fn value_portfolio(
    provider: &dyn MarketDataProvider,
    positions: &[Position],
    policy: &ValuationPolicy,
) -> Vec<ValuedRow> {
    if positions.is_empty() {
        return Vec::new();
    }

    let symbols: Vec<String> = positions.iter().map(|p| p.symbol.clone()).collect();
    let quotes = fetch_quotes(provider, &symbols).await;

    let needs_fx = quotes.values().any(|q| q.currency.eq_ignore_ascii_case("USD"));
    let fx_rate = if needs_fx {
        fetch_fx_rate(provider, policy).await
    } else {
        1.0
    };

    info!(
        "Valued {} positions ({} quotes, fx {})",
        positions.len(),
        quotes.len(),
        fx_rate
    );
    value_all(positions, &quotes, fx_rate, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, price: f64, currency: &str, quote_type: QuoteType) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            currency: currency.to_string(),
            change: None,
            change_percent: Some(1.5),
            dividend_rate: Some(2.0),
            sector: Some("Technology".to_string()),
            quote_type,
            short_name: Some(format!("{} Corp", symbol)),
        }
    }

    #[test]
    fn test_usd_quote_is_converted() {
        let position = Position::new("AAPL", 10.0, 100.0, "特定");
        let row = value(&position, Some(&quote("AAPL", 150.0, "USD", QuoteType::Equity)), 150.0, &ValuationPolicy::default());

        assert_eq!(row.price, 22_500.0);
        assert_eq!(row.current_value, 225_000.0);
        assert_eq!(row.investment_value, 150_000.0);
        assert_eq!(row.gain_loss, 75_000.0);
        assert!((row.gain_loss_percent - 50.0).abs() < 1e-9);
        assert_eq!(row.annual_dividend, 3_000.0);
        assert_eq!(row.sector.as_deref(), Some("情報技術"));
        assert_eq!(row.name.as_deref(), Some("AAPL Corp"));
    }

    #[test]
    fn test_non_usd_passes_through() {
        let position = Position::new("7203.T", 100.0, 2000.0, "特定");
        let row = value(&position, Some(&quote("7203.T", 2500.0, "JPY", QuoteType::Equity)), 150.0, &ValuationPolicy::default());
        assert_eq!(row.current_value, 250_000.0);
    }

    #[test]
    fn test_fund_is_scaled_per_ten_thousand_units() {
        let position = Position::new("0331418A", 200_000.0, 18_000.0, "NISA つみたて");
        let row = value(&position, Some(&quote("0331418A", 20_000.0, "JPY", QuoteType::MutualFund)), 150.0, &ValuationPolicy::default());

        assert_eq!(row.current_value, 400_000.0);
        assert_eq!(row.investment_value, 360_000.0);
        assert_eq!(row.annual_dividend, 40.0);
    }

    #[test]
    fn test_after_tax_gain_applies_flat_rate() {
        let position = Position::new("7203.T", 100.0, 1000.0, "特定");
        let row = value(&position, Some(&quote("7203.T", 2000.0, "JPY", QuoteType::Equity)), 1.0, &ValuationPolicy::default());
        assert!((row.after_tax_gain - 100_000.0 * (1.0 - DEFAULT_TAX_RATE)).abs() < 1e-6);
    }

    #[test]
    fn test_tax_advantaged_gain_is_untaxed() {
        let position = Position::new("7203.T", 100.0, 1000.0, "NISA成長");
        let row = value(&position, Some(&quote("7203.T", 2000.0, "JPY", QuoteType::Equity)), 1.0, &ValuationPolicy::default());
        assert_eq!(row.after_tax_gain, row.gain_loss);
    }

    #[test]
    fn test_losses_are_not_taxed() {
        let position = Position::new("7203.T", 100.0, 3000.0, "特定");
        let row = value(&position, Some(&quote("7203.T", 2000.0, "JPY", QuoteType::Equity)), 1.0, &ValuationPolicy::default());
        assert_eq!(row.after_tax_gain, -100_000.0);
    }

    #[test]
    fn test_missing_quote_values_at_zero() {
        let position = Position::new("GONE", 10.0, 500.0, "特定");
        let row = value(&position, None, 150.0, &ValuationPolicy::default());

        assert_eq!(row.current_value, 0.0);
        assert_eq!(row.investment_value, 5_000.0);
        assert_eq!(row.annual_dividend, 0.0);
        assert_eq!(row.currency, "JPY");
        assert!(row.sector.is_none());
    }

    #[test]
    fn test_value_all_keeps_every_position() {
        let positions = vec![
            Position::new("A", 1.0, 10.0, "特定"),
            Position::new("B", 1.0, 10.0, "特定"),
        ];
        let mut quotes = HashMap::new();
        quotes.insert("A".to_string(), quote("A", 20.0, "JPY", QuoteType::Equity));

        let rows = value_all(&positions, &quotes, 1.0, &ValuationPolicy::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].current_value, 20.0);
        assert_eq!(rows[1].current_value, 0.0);
    }
}
