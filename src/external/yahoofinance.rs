use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::external::market_data::{
    Fundamentals, HistoryPoint, Interval, MarketDataError, MarketDataProvider,
};
use crate::models::{Quote, QuoteType};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";

/// Yahoo Finance provider - no API key required. Covers Tokyo listings
/// (*.T), US equities, ETFs, funds and FX pairs (e.g. USDJPY=X).
pub struct YahooFinanceProvider {
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (compatible; Folioscope/0.1)")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        symbol: &str,
    ) -> Result<T, MarketDataError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        match resp.status() {
            s if s == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited)
            }
            s if s == reqwest::StatusCode::NOT_FOUND => {
                return Err(MarketDataError::NotFound(symbol.to_string()))
            }
            s if !s.is_success() => {
                return Err(MarketDataError::BadResponse(format!("HTTP {}", s)))
            }
            _ => {}
        }

        resp.json::<T>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }

    async fn summary(&self, symbol: &str, modules: &str) -> Result<SummaryResult, MarketDataError> {
        let url = format!("{}/{}", SUMMARY_URL, symbol);
        let body: SummaryResponse = self
            .get_json(&url, &[("modules", modules.to_string())], symbol)
            .await?;
        first_summary(body, symbol)
    }
}

impl Default for YahooFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Chart (history) response
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn parse_chart(body: ChartResponse, symbol: &str) -> Result<Vec<HistoryPoint>, MarketDataError> {
    if let Some(error) = body.chart.error {
        if error.description.contains("No data found") {
            return Err(MarketDataError::NotFound(symbol.to_string()));
        }
        return Err(MarketDataError::BadResponse(error.description));
    }

    let result = body
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;

    let closes = result
        .indicators
        .quote
        .first()
        .ok_or_else(|| MarketDataError::BadResponse("No quote data in response".into()))?
        .close
        .clone();

    // Null closes (holidays, halted weeks) are skipped
    let mut points: Vec<HistoryPoint> = result
        .timestamp
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let close = (*close)?;
            let date = chrono::DateTime::from_timestamp(*ts, 0)?.date_naive();
            Some(HistoryPoint { date, close })
        })
        .collect();

    points.sort_by_key(|p| p.date);
    Ok(points)
}

// ----------------------------------------------------------------------------
// quoteSummary response
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    result: Option<Vec<SummaryResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    asset_profile: Option<AssetProfile>,
    financial_data: Option<FinancialData>,
    default_key_statistics: Option<KeyStatistics>,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`, or `{}` when absent.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(v: &Option<RawValue>) -> Option<f64> {
    v.and_then(|r| r.raw).filter(|x| x.is_finite())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    regular_market_price: Option<RawValue>,
    regular_market_change: Option<RawValue>,
    regular_market_change_percent: Option<RawValue>,
    currency: Option<String>,
    quote_type: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    dividend_rate: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    trailing_annual_dividend_rate: Option<RawValue>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    beta: Option<RawValue>,
    market_cap: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    return_on_equity: Option<RawValue>,
    profit_margins: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    trailing_eps: Option<RawValue>,
    price_to_book: Option<RawValue>,
    beta: Option<RawValue>,
    profit_margins: Option<RawValue>,
}

fn first_summary(body: SummaryResponse, symbol: &str) -> Result<SummaryResult, MarketDataError> {
    if let Some(error) = body.quote_summary.error {
        return Err(MarketDataError::BadResponse(error.description));
    }
    body.quote_summary
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))
}

fn quote_from_summary(symbol: &str, s: &SummaryResult) -> Result<Quote, MarketDataError> {
    let price = s
        .price
        .as_ref()
        .ok_or_else(|| MarketDataError::BadResponse("missing price module".into()))?;
    let last = raw(&price.regular_market_price)
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;
    let detail = s.summary_detail.as_ref();

    Ok(Quote {
        symbol: symbol.to_string(),
        price: last,
        currency: price.currency.clone().unwrap_or_else(|| "JPY".to_string()),
        change: raw(&price.regular_market_change),
        // Yahoo reports change percent as a fraction here
        change_percent: raw(&price.regular_market_change_percent).map(|p| p * 100.0),
        dividend_rate: detail.and_then(|d| {
            raw(&d.dividend_rate).or_else(|| raw(&d.trailing_annual_dividend_rate))
        }),
        sector: s.asset_profile.as_ref().and_then(|a| a.sector.clone()),
        quote_type: price
            .quote_type
            .as_deref()
            .map(QuoteType::parse)
            .unwrap_or_default(),
        short_name: price.short_name.clone().or_else(|| price.long_name.clone()),
    })
}

fn fundamentals_from_summary(s: &SummaryResult) -> Fundamentals {
    let detail = s.summary_detail.as_ref();
    let stats = s.default_key_statistics.as_ref();
    let financial = s.financial_data.as_ref();
    let price = s.price.as_ref();

    Fundamentals {
        short_name: price.and_then(|p| p.short_name.clone().or_else(|| p.long_name.clone())),
        quote_type: price.and_then(|p| p.quote_type.as_deref()).map(QuoteType::parse),
        sector: s.asset_profile.as_ref().and_then(|a| a.sector.clone()),
        roe: financial.and_then(|f| raw(&f.return_on_equity)),
        profit_margin: financial
            .and_then(|f| raw(&f.profit_margins))
            .or_else(|| stats.and_then(|k| raw(&k.profit_margins))),
        per: detail.and_then(|d| raw(&d.trailing_pe)),
        beta: detail
            .and_then(|d| raw(&d.beta))
            .or_else(|| stats.and_then(|k| raw(&k.beta))),
        dividend_yield: detail.and_then(|d| raw(&d.dividend_yield)),
        market_cap: detail.and_then(|d| raw(&d.market_cap)),
        eps: stats.and_then(|k| raw(&k.trailing_eps)),
        pbr: stats.and_then(|k| raw(&k.price_to_book)),
    }
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let summary = self.summary(symbol, "price,summaryDetail,assetProfile").await?;
        quote_from_summary(symbol, &summary)
    }

    async fn get_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<HistoryPoint>, MarketDataError> {
        let period1 = epoch_seconds(start);
        let period2 = epoch_seconds(end) + 86_400;
        let url = format!("{}/{}", CHART_URL, symbol);

        let body: ChartResponse = self
            .get_json(
                &url,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("interval", interval.as_yahoo().to_string()),
                ],
                symbol,
            )
            .await?;

        parse_chart(body, symbol)
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        let summary = self
            .summary(
                symbol,
                "price,summaryDetail,assetProfile,financialData,defaultKeyStatistics",
            )
            .await?;
        Ok(fundamentals_from_summary(&summary))
    }
}
