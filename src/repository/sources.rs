// ==========================================
// 门店集群商品建议系统 - 外部协作方接口
// ==========================================
// 职责: 定义数据源与结果落地接口（不包含业务逻辑）
// 红线: Repository 不含业务规则, 只做读取/写入
// ==========================================

use crate::domain::diagnostics::BatchDiagnostics;
use crate::domain::opportunity::{Opportunity, StoreAggregate};
use crate::domain::sales::{MarginRateEntry, QuantityLedgerEntry, SalesRecord};
use crate::domain::store::Store;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use uuid::Uuid;

// ==========================================
// 只读数据源
// ==========================================

/// 集群分配表 (门店 → 集群, 多对一)
#[async_trait]
pub trait ClusterAssignmentSource: Send + Sync {
    async fn load_assignments(&self) -> RepositoryResult<Vec<Store>>;
}

/// 销售记录
#[async_trait]
pub trait SalesSource: Send + Sync {
    /// 读取销售记录
    ///
    /// # 参数
    /// - period_label: 目标期间; None 表示全部期间
    async fn load_sales(&self, period_label: Option<&str>) -> RepositoryResult<Vec<SalesRecord>>;
}

/// 数量台账
#[async_trait]
pub trait QuantityLedgerSource: Send + Sync {
    async fn load_ledger(&self) -> RepositoryResult<Vec<QuantityLedgerEntry>>;
}

/// 毛利率表（可选）
#[async_trait]
pub trait MarginRateSource: Send + Sync {
    /// Ok(None) 表示未提供毛利率表
    async fn load_margin_rates(&self) -> RepositoryResult<Option<Vec<MarginRateEntry>>>;
}

// ==========================================
// 结果落地
// ==========================================

/// 一次批处理的完整结果
///
/// 只在整批成功时才会交给 sink（无部分落地）
#[derive(Debug, Clone, Copy)]
pub struct BatchPersistRequest<'a> {
    pub run_id: Uuid,
    pub opportunities: &'a [Opportunity],
    pub aggregates: &'a [StoreAggregate],
    pub diagnostics: &'a BatchDiagnostics,
}

#[async_trait]
pub trait RecommendationSink: Send + Sync {
    /// 持久化一次批处理结果
    ///
    /// # 返回
    /// - Ok(usize): 写入的单品建议行数
    async fn persist_batch(&self, request: BatchPersistRequest<'_>) -> RepositoryResult<usize>;
}
