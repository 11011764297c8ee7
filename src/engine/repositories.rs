// ==========================================
// 门店集群商品建议系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合流水线所需的全部外部协作方
// ==========================================

use std::sync::Arc;

use crate::repository::{
    ClusterAssignmentSource, MarginRateSource, QuantityLedgerSource, RecommendationSink,
    SalesSource,
};

/// 流水线协作方集合
///
/// # 包含的协作方
/// - `assignments`: 集群分配表
/// - `sales`: 销售记录
/// - `ledger`: 数量台账
/// - `margins`: 毛利率表（可返回 None）
/// - `sink`: 结果落地
#[derive(Clone)]
pub struct PipelineRepositories {
    pub assignments: Arc<dyn ClusterAssignmentSource>,
    pub sales: Arc<dyn SalesSource>,
    pub ledger: Arc<dyn QuantityLedgerSource>,
    pub margins: Arc<dyn MarginRateSource>,
    pub sink: Arc<dyn RecommendationSink>,
}

impl PipelineRepositories {
    pub fn new(
        assignments: Arc<dyn ClusterAssignmentSource>,
        sales: Arc<dyn SalesSource>,
        ledger: Arc<dyn QuantityLedgerSource>,
        margins: Arc<dyn MarginRateSource>,
        sink: Arc<dyn RecommendationSink>,
    ) -> Self {
        Self {
            assignments,
            sales,
            ledger,
            margins,
            sink,
        }
    }

    /// 由同时实现全部接口的单个仓储构建
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: ClusterAssignmentSource
            + SalesSource
            + QuantityLedgerSource
            + MarginRateSource
            + RecommendationSink
            + 'static,
    {
        Self {
            assignments: repo.clone(),
            sales: repo.clone(),
            ledger: repo.clone(),
            margins: repo.clone(),
            sink: repo,
        }
    }
}
