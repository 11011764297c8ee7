// ==========================================
// 门店集群商品建议系统 - 内存仓储
// ==========================================
// 职责: 以内存集合实现全部协作方接口 (嵌入调用/测试)
// 并发: 结果区使用 tokio RwLock, 数据源只读
// ==========================================

use crate::domain::diagnostics::BatchDiagnostics;
use crate::domain::opportunity::{Opportunity, StoreAggregate};
use crate::domain::sales::{MarginRateEntry, QuantityLedgerEntry, SalesRecord};
use crate::domain::store::Store;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sources::{
    BatchPersistRequest, ClusterAssignmentSource, MarginRateSource, QuantityLedgerSource,
    RecommendationSink, SalesSource,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// 已落地的一批结果
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBatch {
    pub opportunities: Vec<Opportunity>,
    pub aggregates: Vec<StoreAggregate>,
    pub diagnostics: BatchDiagnostics,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    assignments: Vec<Store>,
    sales: Vec<SalesRecord>,
    ledger: Vec<QuantityLedgerEntry>,
    margins: Option<Vec<MarginRateEntry>>,
    batches: RwLock<BTreeMap<Uuid, PersistedBatch>>,
}

impl InMemoryRepository {
    pub fn new(
        assignments: Vec<Store>,
        sales: Vec<SalesRecord>,
        ledger: Vec<QuantityLedgerEntry>,
    ) -> Self {
        Self {
            assignments,
            sales,
            ledger,
            ..Self::default()
        }
    }

    pub fn with_margins(mut self, margins: Vec<MarginRateEntry>) -> Self {
        self.margins = Some(margins);
        self
    }

    /// 读取已落地批次
    pub async fn batch(&self, run_id: Uuid) -> RepositoryResult<PersistedBatch> {
        self.batches
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "PersistedBatch".to_string(),
                id: run_id.to_string(),
            })
    }

    pub async fn batch_count(&self) -> usize {
        self.batches.read().await.len()
    }
}

#[async_trait]
impl ClusterAssignmentSource for InMemoryRepository {
    async fn load_assignments(&self) -> RepositoryResult<Vec<Store>> {
        Ok(self.assignments.clone())
    }
}

#[async_trait]
impl SalesSource for InMemoryRepository {
    async fn load_sales(&self, period_label: Option<&str>) -> RepositoryResult<Vec<SalesRecord>> {
        Ok(self
            .sales
            .iter()
            .filter(|r| period_label.map_or(true, |p| r.period_label == p))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuantityLedgerSource for InMemoryRepository {
    async fn load_ledger(&self) -> RepositoryResult<Vec<QuantityLedgerEntry>> {
        Ok(self.ledger.clone())
    }
}

#[async_trait]
impl MarginRateSource for InMemoryRepository {
    async fn load_margin_rates(&self) -> RepositoryResult<Option<Vec<MarginRateEntry>>> {
        Ok(self.margins.clone())
    }
}

#[async_trait]
impl RecommendationSink for InMemoryRepository {
    async fn persist_batch(&self, request: BatchPersistRequest<'_>) -> RepositoryResult<usize> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&request.run_id) {
            return Err(RepositoryError::PersistenceError(format!(
                "批次 {} 已存在",
                request.run_id
            )));
        }
        batches.insert(
            request.run_id,
            PersistedBatch {
                opportunities: request.opportunities.to_vec(),
                aggregates: request.aggregates.to_vec(),
                diagnostics: request.diagnostics.clone(),
            },
        );
        debug!(
            run_id = %request.run_id,
            opportunities = request.opportunities.len(),
            aggregates = request.aggregates.len(),
            "批次结果已写入内存仓储"
        );
        Ok(request.opportunities.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sales_filtered_by_period() {
        let repo = InMemoryRepository::new(
            vec![Store::new("S1", "C1")],
            vec![
                SalesRecord::new("S1", "F1", "2025Q1", 10.0),
                SalesRecord::new("S1", "F1", "2025Q2", 20.0),
            ],
            vec![],
        );
        assert_eq!(repo.load_sales(Some("2025Q2")).await.unwrap().len(), 1);
        assert_eq!(repo.load_sales(None).await.unwrap().len(), 2);
        assert!(repo.load_margin_rates().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_and_read_back() {
        let repo = InMemoryRepository::default();
        let run_id = Uuid::new_v4();
        let diagnostics = BatchDiagnostics::default();
        let request = BatchPersistRequest {
            run_id,
            opportunities: &[],
            aggregates: &[StoreAggregate::empty("S1", "C1")],
            diagnostics: &diagnostics,
        };
        assert_eq!(repo.persist_batch(request).await.unwrap(), 0);
        assert_eq!(repo.batch(run_id).await.unwrap().aggregates.len(), 1);

        // 同一批次不可重复写入
        assert!(repo.persist_batch(request).await.is_err());
        assert!(matches!(
            repo.batch(Uuid::new_v4()).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
