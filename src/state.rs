use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::store::PortfolioStore;
use crate::external::market_data::MarketDataProvider;
use crate::services::analysis_service::AnalysisService;
use crate::services::factor_cache::FactorCache;
use crate::services::recommendation_service::RecommendationService;

#[derive(Clone)]
pub struct AppState {
    pub factor_cache: Arc<FactorCache>,
    pub recommendations: Arc<RecommendationService>,
    pub analysis: Arc<AnalysisService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    /// Wires the services around one store, one provider and one cache.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn PortfolioStore>,
        market_data: Arc<dyn MarketDataProvider>,
        factor_cache: Arc<FactorCache>,
    ) -> Self {
        let recommendations = RecommendationService::new(
            store.clone(),
            market_data.clone(),
            factor_cache.clone(),
            config.valuation.clone(),
            config.recommendation.clone(),
        );
        let analysis = AnalysisService::new(
            store,
            market_data,
            config.valuation.clone(),
            config.analysis.clone(),
        );

        Self {
            factor_cache,
            recommendations: Arc::new(recommendations),
            analysis: Arc::new(analysis),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
        }
    }
}
