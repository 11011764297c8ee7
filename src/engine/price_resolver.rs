// ==========================================
// 门店集群商品建议系统 - 单价解析 (有序回退链)
// ==========================================
// 顺序: (1) 门店台账均价
//       (2) 本店同期 销售额 ÷ 数量
//       (3) 集群内已解析单价的中位数
// 红线: 全部失败 → 候选丢弃; 绝不使用全局/默认单价
// 输出: 带来源标签的 (source, value), 便于审计
// ==========================================

use crate::domain::types::PriceSource;
use crate::engine::inputs::{ClusterIndex, LedgerIndex, MetricTable};
use crate::engine::peer_stats::median;
use serde::Serialize;
use std::collections::BTreeMap;

/// 已解析单价
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedPrice {
    pub source: PriceSource,
    pub value: f64,
}

/// 回退链全部失败
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedPrice {
    pub attempted: Vec<PriceSource>,
}

/// 单价解析器
///
/// 构造时预先计算每个 (门店, 商品) 的门店级单价 (步骤 1/2),
/// 以及每个 (集群, 商品) 的中位数 (步骤 3)
pub struct PriceResolver {
    store_level: BTreeMap<(String, String), ResolvedPrice>,
    cluster_medians: BTreeMap<(String, String), f64>,
}

impl PriceResolver {
    pub fn build(clusters: &ClusterIndex, ledger: &LedgerIndex, metrics: &MetricTable) -> Self {
        let mut store_level: BTreeMap<(String, String), ResolvedPrice> = BTreeMap::new();

        // 步骤 1: 台账均价
        for ((store, feature), position) in ledger.iter() {
            if clusters.cluster_of(store).is_none() {
                continue;
            }
            if let Some(price) = position.average_price() {
                store_level.insert(
                    (store.clone(), feature.clone()),
                    ResolvedPrice {
                        source: PriceSource::StoreLedgerAverage,
                        value: price,
                    },
                );
            }
        }

        // 步骤 2: 本店同期销售推导 (仅在步骤 1 缺失时)
        for ((store, feature), metric) in metrics.iter() {
            let key = (store.clone(), feature.clone());
            if store_level.contains_key(&key) {
                continue;
            }
            if let Some(price) = derive_sales_price(metric.sales_amount, metric.quantity) {
                store_level.insert(
                    key,
                    ResolvedPrice {
                        source: PriceSource::StoreSalesDerived,
                        value: price,
                    },
                );
            }
        }

        // 步骤 3: 集群中位数 (基于步骤 1/2 的结果)
        let mut by_cluster: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for ((store, feature), resolved) in &store_level {
            if let Some(cluster) = clusters.cluster_of(store) {
                by_cluster
                    .entry((cluster.to_string(), feature.clone()))
                    .or_default()
                    .push(resolved.value);
            }
        }
        let cluster_medians = by_cluster
            .into_iter()
            .filter_map(|(key, prices)| median(&prices).map(|m| (key, m)))
            .collect();

        Self {
            store_level,
            cluster_medians,
        }
    }

    /// 解析某候选的单价
    pub fn resolve(
        &self,
        store_code: &str,
        cluster_id: &str,
        feature_key: &str,
    ) -> Result<ResolvedPrice, UnresolvedPrice> {
        if let Some(resolved) = self
            .store_level
            .get(&(store_code.to_string(), feature_key.to_string()))
        {
            return Ok(*resolved);
        }

        if let Some(value) = self
            .cluster_medians
            .get(&(cluster_id.to_string(), feature_key.to_string()))
        {
            if value.is_finite() && *value > 0.0 {
                return Ok(ResolvedPrice {
                    source: PriceSource::ClusterMedian,
                    value: *value,
                });
            }
        }

        Err(UnresolvedPrice {
            attempted: vec![
                PriceSource::StoreLedgerAverage,
                PriceSource::StoreSalesDerived,
                PriceSource::ClusterMedian,
            ],
        })
    }
}

fn derive_sales_price(amount: f64, quantity: Option<f64>) -> Option<f64> {
    let quantity = quantity?;
    if quantity <= 0.0 || amount <= 0.0 {
        return None;
    }
    let price = amount / quantity;
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}
