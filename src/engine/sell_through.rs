// ==========================================
// 门店集群商品建议系统 - 售罄率校验
// ==========================================
// 售罄率 = 期间内有销售的在库商品数 / 在库商品数 (百分比, 按门店 × 品类)
// 预测 = clamp(((1 − s) × 铺货率曲线 + s × 证据) × 季节系数, 0, 100)
//   铺货率曲线 = clip(L / (1 + e^(−k(adoption − x0))), 10, 70)
//   证据       = (1 − bw) × 集群历史 + bw × 门店基线
//   集群历史   = p50 + w × (p80 − p50)
//   s          = min(1, 集群样本数 / min_comparables)
// 当前售罄率: 门店基线; 门店无在库数据时取集群历史, 再无则取预测值 (提升为 0)
// 审批: 预测值必须落在 [min_threshold, max_threshold], 且满足动作规则
// ==========================================

use crate::config::SellThroughParams;
use crate::domain::types::ActionType;
use crate::engine::inputs::{ClusterIndex, FeatureCatalog, LedgerIndex, MetricTable};
use crate::engine::peer_stats::percentile;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// ==========================================
// SellThroughIndex - 门店/集群 品类售罄率
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterSellThrough {
    pub p50: f64,
    pub p80: f64,
    /// 参与统计的门店数
    pub sample_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SellThroughIndex {
    store_rates: BTreeMap<(String, String), f64>,
    cluster_rates: BTreeMap<(String, String), ClusterSellThrough>,
}

impl SellThroughIndex {
    pub fn build(
        clusters: &ClusterIndex,
        ledger: &LedgerIndex,
        metrics: &MetricTable,
        catalog: &FeatureCatalog,
    ) -> Self {
        // (门店, 品类) → (在库商品集合, 有销售的在库商品集合)
        let mut counts: BTreeMap<(String, String), (BTreeSet<&str>, BTreeSet<&str>)> =
            BTreeMap::new();

        for ((store, feature), position) in ledger.iter() {
            if !position.in_stock() || clusters.cluster_of(store).is_none() {
                continue;
            }
            let Some(category) = catalog.category(feature) else {
                continue;
            };
            let entry = counts
                .entry((store.clone(), category.to_string()))
                .or_default();
            entry.0.insert(feature.as_str());
            let sold = metrics
                .get(store, feature)
                .map(|m| m.is_selling())
                .unwrap_or(false);
            if sold {
                entry.1.insert(feature.as_str());
            }
        }

        let store_rates: BTreeMap<(String, String), f64> = counts
            .into_iter()
            .map(|(key, (stocked, sold))| {
                (key, sold.len() as f64 / stocked.len() as f64 * 100.0)
            })
            .collect();

        let mut by_cluster: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for ((store, category), rate) in &store_rates {
            if let Some(cluster) = clusters.cluster_of(store) {
                by_cluster
                    .entry((cluster.to_string(), category.clone()))
                    .or_default()
                    .push(*rate);
            }
        }
        let cluster_rates: BTreeMap<(String, String), ClusterSellThrough> = by_cluster
            .into_iter()
            .map(|(key, mut rates)| {
                rates.sort_by(|a, b| a.total_cmp(b));
                let stat = ClusterSellThrough {
                    p50: percentile(&rates, 50.0),
                    p80: percentile(&rates, 80.0),
                    sample_size: rates.len(),
                };
                (key, stat)
            })
            .collect();

        debug!(
            store_categories = store_rates.len(),
            cluster_categories = cluster_rates.len(),
            "售罄率索引构建完成"
        );

        Self {
            store_rates,
            cluster_rates,
        }
    }

    pub fn store_rate(&self, store_code: &str, category: &str) -> Option<f64> {
        self.store_rates
            .get(&(store_code.to_string(), category.to_string()))
            .copied()
    }

    pub fn cluster_rate(&self, cluster_id: &str, category: &str) -> Option<ClusterSellThrough> {
        self.cluster_rates
            .get(&(cluster_id.to_string(), category.to_string()))
            .copied()
    }
}

// ==========================================
// SellThroughValidator - 预测 + 审批
// ==========================================

/// 单候选的校验请求
#[derive(Debug, Clone)]
pub struct SellThroughRequest<'a> {
    pub action: ActionType,
    pub quantity: i64,
    pub store_code: &'a str,
    pub cluster_id: &'a str,
    pub category: &'a str,
    pub season: Option<&'a str>,
    /// 同组铺货率 [0, 1]
    pub adoption: f64,
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellThroughVerdict {
    pub approved: bool,
    pub current_rate: f64,
    pub predicted_rate: f64,
    pub improvement: f64,
    /// JSON 字符串
    pub rationale: String,
}

pub struct SellThroughValidator<'a> {
    params: &'a SellThroughParams,
    min_comparables: usize,
    index: &'a SellThroughIndex,
}

impl<'a> SellThroughValidator<'a> {
    pub fn new(
        params: &'a SellThroughParams,
        min_comparables: usize,
        index: &'a SellThroughIndex,
    ) -> Self {
        Self {
            params,
            min_comparables,
            index,
        }
    }

    /// 铺货率 logistic 估计（已截断）
    pub fn adoption_estimate(&self, adoption: f64) -> f64 {
        let p = self.params;
        let raw = p.logistic_ceiling
            / (1.0 + (-p.logistic_steepness * (adoption - p.logistic_midpoint)).exp());
        raw.clamp(p.logistic_clip_min, p.logistic_clip_max)
    }

    /// 收缩系数: 集群样本不足时偏向铺货率估计
    pub fn shrinkage(&self, sample_size: usize) -> f64 {
        (sample_size as f64 / self.min_comparables.max(1) as f64).min(1.0)
    }

    pub fn validate(&self, request: &SellThroughRequest<'_>) -> SellThroughVerdict {
        let p = self.params;
        let store_rate = self.index.store_rate(request.store_code, request.category);
        let cluster = self.index.cluster_rate(request.cluster_id, request.category);

        let adoption_est = self.adoption_estimate(request.adoption);
        let (historical, sample_size) = match cluster {
            Some(c) => (c.p50 + p.cluster_p80_weight * (c.p80 - c.p50), c.sample_size),
            None => (adoption_est, 0),
        };
        let baseline = store_rate.unwrap_or(historical);
        let evidence = (1.0 - p.baseline_weight) * historical + p.baseline_weight * baseline;
        let s = self.shrinkage(sample_size);
        let seasonal = p.seasonal_factor(request.season);

        let predicted = (((1.0 - s) * adoption_est + s * evidence) * seasonal).clamp(0.0, 100.0);
        let (current, current_source) = match (store_rate, cluster) {
            (Some(rate), _) => (rate, "store_baseline"),
            (None, Some(_)) => (historical, "cluster_historical"),
            (None, None) => (predicted, "predicted"),
        };

        let (approved, rule) = self.decide(request.action, request.quantity, current, predicted);

        let rationale = json!({
            "stage": "sell_through",
            "action": request.action.to_string(),
            "rule": rule,
            "category": request.category,
            "adoption": request.adoption,
            "adoption_estimate": adoption_est,
            "cluster_historical": historical,
            "cluster_sample_size": sample_size,
            "store_baseline": store_rate,
            "shrinkage": s,
            "seasonal_factor": seasonal,
            "current_rate": current,
            "current_source": current_source,
            "predicted_rate": predicted,
            "improvement": predicted - current,
            "approved": approved,
        })
        .to_string();

        SellThroughVerdict {
            approved,
            current_rate: current,
            predicted_rate: predicted,
            improvement: predicted - current,
            rationale,
        }
    }

    /// 审批规则: (是否通过, 命中规则名)
    ///
    /// 负数量一律按减量规则审批 (含配对调拨的调出方)
    pub fn decide(
        &self,
        action: ActionType,
        quantity: i64,
        current: f64,
        predicted: f64,
    ) -> (bool, &'static str) {
        let p = self.params;
        let improvement = predicted - current;
        let in_range = predicted >= p.min_threshold && predicted <= p.max_threshold;

        if action.is_decrease() || quantity < 0 {
            return (in_range && improvement >= 0.0, "decrease_requires_non_negative_improvement");
        }

        let max_degradation = if current >= p.near_full_rate {
            p.near_full_max_degradation
        } else {
            p.max_degradation
        };
        (
            in_range && improvement >= -max_degradation,
            "increase_within_degradation_band",
        )
    }
}
