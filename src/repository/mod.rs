// ==========================================
// 门店集群商品建议系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 外部协作方边界 (集群分配 / 销售 / 台账 / 毛利率 / 结果落地)
// ==========================================

pub mod error;
pub mod memory;
pub mod sources;

pub use error::{RepositoryError, RepositoryResult};
pub use memory::{InMemoryRepository, PersistedBatch};
pub use sources::{
    BatchPersistRequest, ClusterAssignmentSource, MarginRateSource, QuantityLedgerSource,
    RecommendationSink, SalesSource,
};
