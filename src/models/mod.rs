pub mod analytics;
pub mod factor;
pub mod position;
pub mod quote;
pub mod rebalance;
pub mod recommendation;
pub mod store;
pub mod valuation;

pub use analytics::{
    AxisBreakdown, DiversificationAxes, DiversificationBreakdown, DiversificationWeights, GroupShare,
    PortfolioAnalysis, PortfolioTotals, RiskMetrics, SectorTotals,
};
pub use factor::{CacheMeta, CacheSource, CacheStatus, CandidateFactors, FactorSnapshot, Returns};
pub use position::Position;
pub use quote::{Quote, QuoteType};
pub use rebalance::{Proposal, ProposalAction, RebalanceRequest};
pub use recommendation::{
    FactorInputs, FactorWeights, NormalizedFactors, Recommendation, RecommendationDiagnostics,
    RecommendationQuery, RecommendationsResponse, RiskTolerance, ScoreBreakdown, SubScores,
};
pub use store::{NewOperation, ValuePoint, WatchlistItem};
pub use valuation::ValuedRow;
