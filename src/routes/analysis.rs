use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{PortfolioAnalysis, Proposal, RebalanceRequest, SectorTotals};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/portfolio", get(get_portfolio_analysis))
        .route("/rebalance", post(post_rebalance))
        .route("/sectors", get(get_sector_totals))
}

async fn get_portfolio_analysis(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PortfolioAnalysis>, AppError> {
    info!("GET /api/analysis/portfolio - user {}", user_id);
    state.analysis.portfolio_analysis(user_id).await.map(Json)
}

async fn post_rebalance(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<RebalanceRequest>, JsonRejection>,
) -> Result<Json<Vec<Proposal>>, AppError> {
    let Json(request) = body.map_err(|e| AppError::Validation(format!("Invalid rebalance request: {}", e.body_text())))?;
    info!(
        "POST /api/analysis/rebalance - user {} ({} target sectors)",
        user_id,
        request.target_allocation.len()
    );
    state.analysis.rebalance(user_id, &request).await.map(Json)
}

async fn get_sector_totals(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SectorTotals>, AppError> {
    info!("GET /api/analysis/sectors - user {}", user_id);
    state.analysis.sector_totals(user_id).await.map(Json)
}
