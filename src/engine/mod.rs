// ==========================================
// 门店集群商品建议系统 - 引擎层
// ==========================================
// 职责: 同组统计 → 机会分类 → 数量建议 → 售罄率校验 → ROI 门控 → 汇总
// 红线: 引擎不做文件/网络 I/O, 所有规则必须输出 rationale
// ==========================================

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod inputs;
pub mod margin_resolver;
pub mod peer_stats;
pub mod pipeline;
pub mod price_resolver;
pub mod quantity;
pub mod redistribution;
pub mod repositories;
pub mod roi_gate;
pub mod sell_through;

// 重导出核心引擎
pub use aggregator::ResultAggregator;
pub use classifier::{
    classifier_for, ClassifierInput, ImbalanceClassifier, MissingFeatureClassifier,
    OpportunityClassifier, PerformanceGapClassifier, Verdict,
};
pub use error::{EngineError, EngineResult};
pub use inputs::{BatchInputs, ClusterIndex, FeatureCatalog, LedgerIndex, MetricTable};
pub use margin_resolver::{MarginResolver, ResolvedMargin};
pub use peer_stats::{MetricBasis, PeerGroupStatistics, PeerStatTable};
pub use pipeline::{BatchOutcome, RecommendationPipeline};
pub use price_resolver::{PriceResolver, ResolvedPrice, UnresolvedPrice};
pub use quantity::{QuantityPlan, QuantityRecommender};
pub use redistribution::{
    assign_actions, balance_transfers, detach_orphaned_transfers, ActionCandidate,
    PlannedCandidate,
};
pub use repositories::PipelineRepositories;
pub use roi_gate::{RoiGate, RoiVerdict};
pub use sell_through::{SellThroughIndex, SellThroughValidator, SellThroughVerdict};
