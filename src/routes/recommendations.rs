use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::info;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::{CacheMeta, CacheStatus, RecommendationQuery, RecommendationsResponse, RiskTolerance};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_recommendations))
        .route("/cache", get(get_cache_status))
        .route("/cache/refresh", post(refresh_cache))
}

fn parse_risk(raw: Option<&str>) -> Result<RiskTolerance, AppError> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(RiskTolerance::default()),
        Some(r) => RiskTolerance::parse(r).ok_or_else(|| {
            AppError::Validation(format!("risk must be one of low, medium, high (got '{}')", r))
        }),
    }
}

fn diagnostics_requested(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("1") | Some("true"))
}

async fn get_recommendations(
    AuthUser(user_id): AuthUser,
    Query(params): Query<RecommendationQuery>,
    State(state): State<AppState>,
) -> Result<Json<RecommendationsResponse>, AppError> {
    let tolerance = parse_risk(params.risk.as_deref())?;
    let with_diagnostics = diagnostics_requested(params.diagnostics.as_deref());
    info!("GET /api/recommendations - user {} risk {:?}", user_id, tolerance);

    let (recommendations, diagnostics) = state
        .recommendations
        .recommend_for_user(user_id, tolerance)
        .await?;

    let response = if with_diagnostics {
        RecommendationsResponse::WithDiagnostics {
            recommendations,
            diagnostics,
        }
    } else {
        RecommendationsResponse::Plain(recommendations)
    };
    Ok(Json(response))
}

async fn get_cache_status(
    AuthUser(_user_id): AuthUser,
    State(state): State<AppState>,
) -> Json<CacheStatus> {
    Json(state.factor_cache.status())
}

async fn refresh_cache(
    AuthUser(user_id): AuthUser,
    State(state): State<AppState>,
) -> Json<CacheMeta> {
    info!("POST /api/recommendations/cache/refresh - requested by user {}", user_id);
    Json(state.factor_cache.refresh().await.meta)
}
