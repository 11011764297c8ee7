// ==========================================
// 门店集群商品建议系统 - 领域模型层
// ==========================================
// 职责: 定义输入记录、统计实体、输出实体与类型
// 红线: 不含数据访问逻辑, 不含引擎逻辑
// ==========================================

pub mod diagnostics;
pub mod opportunity;
pub mod peer_stat;
pub mod sales;
pub mod store;
pub mod types;

// 重导出核心类型
pub use diagnostics::{
    BatchDiagnostics, RejectionRecord, RejectionStage, SkipReason, SkipRecord,
};
pub use opportunity::{Opportunity, StoreAggregate, NO_OPPORTUNITY_LABEL};
pub use peer_stat::PeerGroupStat;
pub use sales::{FeatureAttributes, MarginRateEntry, MarginScope, QuantityLedgerEntry, SalesRecord};
pub use store::Store;
pub use types::{
    ActionType, Classification, GapUnit, Granularity, ImbalanceDirection, MarginSource,
    PerformanceTier, PriceSource, RedistributionStrategy, RuleKind, Severity,
};
