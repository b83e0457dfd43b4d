use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::store::PortfolioStore;
use crate::errors::AppError;
use crate::external::market_data::{HistoryPoint, Interval, MarketDataProvider};
use crate::models::{
    NewOperation, PortfolioAnalysis, Proposal, RebalanceRequest, SectorTotals, ValuePoint, ValuedRow,
};
use crate::services::statistics_service::{self, DEFAULT_RISK_FREE_RATE};
use crate::services::valuation_service::{self, ValuationPolicy};
use crate::services::rebalance_service;

pub const REBALANCE_OPERATION: &str = "analysis.rebalance";

/// Minimum aligned history before a market series is worth fetching.
const MIN_HISTORY_POINTS: usize = 3;

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub risk_free_rate: f64,
    pub market_index_symbol: String,
    pub history_days: i64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            market_index_symbol: "^N225".to_string(),
            history_days: 365,
        }
    }
}

pub struct AnalysisService {
    store: Arc<dyn PortfolioStore>,
    market_data: Arc<dyn MarketDataProvider>,
    valuation: ValuationPolicy,
    settings: AnalysisSettings,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn PortfolioStore>,
        market_data: Arc<dyn MarketDataProvider>,
        valuation: ValuationPolicy,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            store,
            market_data,
            valuation,
            settings,
        }
    }

    async fn valued_rows(&self, user_id: Uuid) -> Result<Vec<ValuedRow>, AppError> {
        let positions = self.store.fetch_positions(user_id).await?;
        Ok(valuation_service::value_portfolio(self.market_data.as_ref(), &positions, &self.valuation).await)
    }

    /// Full statistics bundle. Records today's total value as a side effect
    /// so the history series grows with use.
    pub async fn portfolio_analysis(&self, user_id: Uuid) -> Result<PortfolioAnalysis, AppError> {
        let rows = self.valued_rows(user_id).await?;
        let totals = statistics_service::portfolio_totals(&rows);
        let today = Utc::now().date_naive();

        if totals.total_value > 0.0 {
            let point = ValuePoint {
                date: today,
                total_value: totals.total_value,
            };
            if let Err(e) = self.store.record_value_snapshot(user_id, point).await {
                warn!("Failed to record value snapshot for user {}: {}", user_id, e);
            }
        }

        let since = today - Duration::days(self.settings.history_days);
        let mut history = self.store.fetch_value_history(user_id, since).await?;
        if totals.total_value > 0.0 && history.last().map(|p| p.date) != Some(today) {
            history.push(ValuePoint {
                date: today,
                total_value: totals.total_value,
            });
        }

        let market = if history.len() >= MIN_HISTORY_POINTS {
            self.market_history(since, today).await
        } else {
            Vec::new()
        };

        let risk = statistics_service::risk_metrics(&history, &market, self.settings.risk_free_rate);
        let diversification = statistics_service::diversification_breakdown(&rows);

        info!(
            "Portfolio analysis for user {}: {} positions, {} history points, diversification {}",
            user_id,
            rows.len(),
            history.len(),
            diversification.score
        );

        Ok(PortfolioAnalysis {
            analysis_date: today.to_string(),
            position_count: rows.len(),
            totals,
            risk,
            diversification,
            rows,
        })
    }

    /// Market index closes; a failed fetch degrades beta/alpha to neutral.
    async fn market_history(&self, start: NaiveDate, end: NaiveDate) -> Vec<HistoryPoint> {
        match self
            .market_data
            .get_history(&self.settings.market_index_symbol, start, end, Interval::Daily)
            .await
        {
            Ok(points) => points,
            Err(e) => {
                warn!(
                    "Market index {} history unavailable: {}",
                    self.settings.market_index_symbol, e
                );
                Vec::new()
            }
        }
    }

    pub async fn sector_totals(&self, user_id: Uuid) -> Result<SectorTotals, AppError> {
        let rows = self.valued_rows(user_id).await?;
        Ok(statistics_service::sector_totals(&rows))
    }

    /// Validates the target before touching any data, then logs the request
    /// to the operation log on a best-effort basis.
    pub async fn rebalance(&self, user_id: Uuid, request: &RebalanceRequest) -> Result<Vec<Proposal>, AppError> {
        rebalance_service::validate_target(&request.target_allocation)?;

        let rows = self.valued_rows(user_id).await?;
        let proposals = rebalance_service::propose(&rows, &request.target_allocation);

        let operation = NewOperation {
            kind: REBALANCE_OPERATION.to_string(),
            detail: json!({
                "target_allocation": request.target_allocation,
                "proposal_count": proposals.len(),
            }),
        };
        if let Err(e) = self.store.append_operation(user_id, operation).await {
            warn!("Failed to log rebalance for user {}: {}", user_id, e);
        }

        Ok(proposals)
    }
}
