// ==========================================
// 门店集群商品建议系统 - 同组统计引擎
// ==========================================
// 职责: 按 (集群, 商品) 聚合 样本数/均值/样本标准差/p75/p80
// 红线: 样本数 < min_cluster_size 的组不产出统计 (不是零填充)
// 副作用: 无 (纯聚合)
// ==========================================

use crate::domain::peer_stat::PeerGroupStat;
use crate::engine::inputs::{ClusterIndex, LedgerIndex, MetricTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// 统计所用度量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricBasis {
    /// 期间销售额, 只统计有销售的门店
    SalesAmount,
    /// 台账在库数量, 只统计有库存的门店
    StockQuantity,
}

/// 单条观测: 某门店在某 (集群, 商品) 组中的取值
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub cluster_id: String,
    pub feature_key: String,
    pub store_code: String,
    pub value: f64,
}

// ==========================================
// PeerStatTable - 同组统计表 + 组内观测
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PeerStatTable {
    stats: BTreeMap<(String, String), PeerGroupStat>,
    /// (集群, 商品) → [(门店, 值)]（门店升序, 仅保留有统计的组）
    members: BTreeMap<(String, String), Vec<(String, f64)>>,
    excluded_groups: usize,
}

impl PeerStatTable {
    pub fn get(&self, cluster_id: &str, feature_key: &str) -> Option<&PeerGroupStat> {
        self.stats
            .get(&(cluster_id.to_string(), feature_key.to_string()))
    }

    /// 组内成员取值
    pub fn members(&self, cluster_id: &str, feature_key: &str) -> &[(String, f64)] {
        self.members
            .get(&(cluster_id.to_string(), feature_key.to_string()))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// 按 (集群, 商品) 升序遍历
    pub fn iter(&self) -> impl Iterator<Item = &PeerGroupStat> {
        self.stats.values()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// 因样本不足被排除的组数
    pub fn excluded_groups(&self) -> usize {
        self.excluded_groups
    }
}

// ==========================================
// PeerGroupStatistics - 同组统计引擎
// ==========================================
pub struct PeerGroupStatistics {
    min_cluster_size: usize,
}

impl PeerGroupStatistics {
    pub fn new(min_cluster_size: usize) -> Self {
        Self { min_cluster_size }
    }

    /// 按度量口径收集观测并聚合
    pub fn compute_for_basis(
        &self,
        basis: MetricBasis,
        clusters: &ClusterIndex,
        metrics: &MetricTable,
        ledger: &LedgerIndex,
    ) -> PeerStatTable {
        self.compute(collect_observations(basis, clusters, metrics, ledger))
    }

    /// 聚合观测
    #[instrument(skip(self, observations), fields(min_cluster_size = self.min_cluster_size))]
    pub fn compute(&self, observations: Vec<Observation>) -> PeerStatTable {
        let mut groups: BTreeMap<(String, String), Vec<(String, f64)>> = BTreeMap::new();
        for obs in observations {
            if !obs.value.is_finite() {
                continue;
            }
            groups
                .entry((obs.cluster_id, obs.feature_key))
                .or_default()
                .push((obs.store_code, obs.value));
        }

        let mut stats = BTreeMap::new();
        let mut members = BTreeMap::new();
        let mut excluded_groups = 0usize;

        for ((cluster_id, feature_key), mut values) in groups {
            if values.len() < self.min_cluster_size {
                excluded_groups += 1;
                continue;
            }
            values.sort_by(|a, b| a.0.cmp(&b.0));

            let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
            let mut sorted = raw.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));

            let stat = PeerGroupStat {
                cluster_id: cluster_id.clone(),
                feature_key: feature_key.clone(),
                count: raw.len(),
                mean: mean(&raw),
                std: sample_std(&raw),
                p75: percentile(&sorted, 75.0),
                p80: percentile(&sorted, 80.0),
                total: raw.iter().sum(),
            };
            stats.insert((cluster_id.clone(), feature_key.clone()), stat);
            members.insert((cluster_id, feature_key), values);
        }

        info!(
            groups = stats.len(),
            excluded_groups,
            "同组统计完成"
        );

        PeerStatTable {
            stats,
            members,
            excluded_groups,
        }
    }
}

fn collect_observations(
    basis: MetricBasis,
    clusters: &ClusterIndex,
    metrics: &MetricTable,
    ledger: &LedgerIndex,
) -> Vec<Observation> {
    let mut observations = Vec::new();
    match basis {
        MetricBasis::SalesAmount => {
            for ((store, feature), metric) in metrics.iter() {
                if !metric.is_selling() {
                    continue;
                }
                if let Some(cluster) = clusters.cluster_of(store) {
                    observations.push(Observation {
                        cluster_id: cluster.to_string(),
                        feature_key: feature.clone(),
                        store_code: store.clone(),
                        value: metric.sales_amount,
                    });
                }
            }
        }
        MetricBasis::StockQuantity => {
            for ((store, feature), position) in ledger.iter() {
                if !position.in_stock() {
                    continue;
                }
                if let Some(cluster) = clusters.cluster_of(store) {
                    observations.push(Observation {
                        cluster_id: cluster.to_string(),
                        feature_key: feature.clone(),
                        store_code: store.clone(),
                        value: position.quantity,
                    });
                }
            }
        }
    }
    debug!(?basis, observations = observations.len(), "观测收集完成");
    observations
}

// ==========================================
// 统计工具函数
// ==========================================

/// 算术平均（空集为 0）
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 样本标准差 (ddof=1)，样本数 < 2 时为 0
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// 线性插值分位数（输入必须已升序, q ∈ [0, 100]）
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// 中位数（输入无序）
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(percentile(&sorted, 50.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(cluster: &str, feature: &str, store: &str, value: f64) -> Observation {
        Observation {
            cluster_id: cluster.to_string(),
            feature_key: feature.to_string(),
            store_code: store.to_string(),
            value,
        }
    }

    #[test]
    fn test_small_groups_are_excluded() {
        let engine = PeerGroupStatistics::new(3);
        let table = engine.compute(vec![
            obs("C1", "F1", "S1", 10.0),
            obs("C1", "F1", "S2", 20.0),
            obs("C1", "F2", "S1", 1.0),
            obs("C1", "F2", "S2", 2.0),
            obs("C1", "F2", "S3", 3.0),
        ]);
        assert!(table.get("C1", "F1").is_none());
        assert!(table.members("C1", "F1").is_empty());
        assert_eq!(table.excluded_groups(), 1);

        let stat = table.get("C1", "F2").unwrap();
        assert_eq!(stat.count, 3);
        assert!((stat.mean - 2.0).abs() < 1e-12);
        assert!((stat.std - 1.0).abs() < 1e-12);
        assert!((stat.total - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((percentile(&sorted, 75.0) - 4.0).abs() < 1e-12);
        assert!((percentile(&sorted, 80.0) - 4.2).abs() < 1e-12);
        assert!((percentile(&sorted, 50.0) - 3.0).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[7.0], 80.0), 7.0);
    }

    #[test]
    fn test_sample_std_uses_ddof_one() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // 总体标准差为 2.0, 样本标准差 = sqrt(32/7)
        assert!((sample_std(&values) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[3.0]), 0.0);
    }

    #[test]
    fn test_median_unsorted_input() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_non_finite_observations_ignored() {
        let engine = PeerGroupStatistics::new(2);
        let table = engine.compute(vec![
            obs("C1", "F1", "S1", f64::NAN),
            obs("C1", "F1", "S2", 5.0),
        ]);
        assert!(table.is_empty());
    }
}
