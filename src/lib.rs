// ==========================================
// 门店集群商品建议系统 - 核心库
// ==========================================
// 定位: 基于门店集群同组对比的商品配货建议 (批处理, 单线程)
// 流程: 同组统计 → 机会分类 → 数量建议 → 售罄率校验 → ROI 门控 → 汇总
// 边界: 集群划分、文件读写、命令行均由外部协作方负责
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 配置层 - 引擎配置
pub mod config;

// 引擎层 - 业务规则
pub mod engine;

// 数据仓储层 - 外部协作方边界
pub mod repository;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActionType, Classification, GapUnit, Granularity, ImbalanceDirection, MarginSource,
    PerformanceTier, PriceSource, RedistributionStrategy, RuleKind, Severity,
};

// 领域实体
pub use domain::{
    BatchDiagnostics, FeatureAttributes, MarginRateEntry, Opportunity, PeerGroupStat,
    QuantityLedgerEntry, SalesRecord, SkipReason, Store, StoreAggregate,
};

// 配置
pub use config::{EngineConfig, RuleProfile};

// 引擎
pub use engine::{
    BatchInputs, BatchOutcome, EngineError, EngineResult, PipelineRepositories,
    RecommendationPipeline,
};

// 仓储
pub use repository::{InMemoryRepository, RepositoryError, RepositoryResult};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "门店集群商品建议系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
