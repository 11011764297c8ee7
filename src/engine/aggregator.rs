// ==========================================
// 门店集群商品建议系统 - 结果汇总
// ==========================================
// 职责: 单店截断 + 门店级汇总
// 截断排序: 售罄率提升 降序 → |z| 降序 → |数量| 降序 → 商品/规则 升序
// 红线: 集群分配表中每个门店恰好一行汇总 (零机会门店输出显式空行)
//       Σ 单品数量 == 门店 total_quantity_needed
// ==========================================

use crate::domain::diagnostics::{BatchDiagnostics, RejectionRecord, RejectionStage};
use crate::domain::opportunity::{Opportunity, StoreAggregate, NO_OPPORTUNITY_LABEL};
use crate::domain::types::ActionType;
use crate::engine::inputs::ClusterIndex;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub struct ResultAggregator {
    max_per_store: Option<usize>,
}

impl ResultAggregator {
    pub fn new(max_per_store: Option<usize>) -> Self {
        Self { max_per_store }
    }

    /// 候选排序键
    pub fn rank_order(a: &Opportunity, b: &Opportunity) -> Ordering {
        b.sell_through_improvement
            .total_cmp(&a.sell_through_improvement)
            .then_with(|| b.z_score.abs().total_cmp(&a.z_score.abs()))
            .then_with(|| {
                b.recommended_quantity_change
                    .unsigned_abs()
                    .cmp(&a.recommended_quantity_change.unsigned_abs())
            })
            .then_with(|| a.feature_key.cmp(&b.feature_key))
            .then_with(|| a.rule.cmp(&b.rule))
    }

    /// 按门店排序并截断; 被截断的候选记入诊断
    ///
    /// 输出按 门店编码 升序, 店内按排序键
    pub fn apply_cap(
        &self,
        candidates: Vec<Opportunity>,
        diagnostics: &mut BatchDiagnostics,
    ) -> Vec<Opportunity> {
        let mut by_store: BTreeMap<String, Vec<Opportunity>> = BTreeMap::new();
        for opp in candidates {
            by_store.entry(opp.store_code.clone()).or_default().push(opp);
        }

        let mut kept = Vec::new();
        for (store_code, mut list) in by_store {
            list.sort_by(Self::rank_order);
            if let Some(cap) = self.max_per_store {
                if list.len() > cap {
                    for (rank, dropped) in list.drain(cap..).enumerate() {
                        warn!(
                            store_code = %store_code,
                            feature_key = %dropped.feature_key,
                            cap,
                            "超出单店建议上限, 已截断"
                        );
                        diagnostics.record_rejection(RejectionRecord {
                            store_code: dropped.store_code.clone(),
                            feature_key: dropped.feature_key.clone(),
                            rule: dropped.rule,
                            stage: RejectionStage::StoreCap,
                            rationale: json!({
                                "stage": "store_cap",
                                "cap": cap,
                                "rank": cap + rank + 1,
                                "sell_through_improvement": dropped.sell_through_improvement,
                                "z_score": dropped.z_score,
                                "recommended_quantity_change": dropped.recommended_quantity_change,
                            })
                            .to_string(),
                        });
                    }
                }
            }
            kept.extend(list);
        }
        kept
    }

    /// 门店级汇总: 集群分配表中每店一行
    pub fn aggregate(
        &self,
        clusters: &ClusterIndex,
        opportunities: &[Opportunity],
    ) -> Vec<StoreAggregate> {
        let mut by_store: BTreeMap<&str, Vec<&Opportunity>> = BTreeMap::new();
        for opp in opportunities {
            by_store.entry(opp.store_code.as_str()).or_default().push(opp);
        }

        let aggregates: Vec<StoreAggregate> = clusters
            .stores()
            .map(|(store_code, cluster_id)| match by_store.get(store_code) {
                Some(items) if !items.is_empty() => summarize(store_code, cluster_id, items),
                _ => StoreAggregate::empty(store_code, cluster_id),
            })
            .collect();

        debug!(
            stores = aggregates.len(),
            with_opportunity = aggregates.iter().filter(|a| a.has_opportunity).count(),
            "门店汇总完成"
        );
        aggregates
    }
}

fn summarize(store_code: &str, cluster_id: &str, items: &[&Opportunity]) -> StoreAggregate {
    let n = items.len() as f64;
    let count_action = |action: ActionType| items.iter().filter(|o| o.action == action).count();

    let mut labels: BTreeMap<String, usize> = BTreeMap::new();
    for o in items {
        *labels.entry(o.classification.label()).or_insert(0) += 1;
    }
    // 出现次数最多; 并列取标签字典序最小
    let primary = labels
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(label, _)| label.clone())
        .unwrap_or_else(|| NO_OPPORTUNITY_LABEL.to_string());

    StoreAggregate {
        store_code: store_code.to_string(),
        cluster_id: cluster_id.to_string(),
        opportunity_count: items.len(),
        approved_count: items.iter().filter(|o| o.approved).count(),
        add_count: count_action(ActionType::Add),
        increase_count: count_action(ActionType::Increase),
        reduce_count: count_action(ActionType::Reduce) + count_action(ActionType::Decrease),
        rebalance_count: count_action(ActionType::Rebalance),
        total_quantity_needed: items.iter().map(|o| o.recommended_quantity_change).sum(),
        total_investment: items.iter().map(|o| o.investment_required).sum(),
        total_retail_value: items.iter().map(|o| o.retail_value).sum(),
        mean_abs_z: items.iter().map(|o| o.z_score.abs()).sum::<f64>() / n,
        mean_predicted_sell_through: items
            .iter()
            .map(|o| o.predicted_sell_through_rate)
            .sum::<f64>()
            / n,
        primary_classification: primary,
        has_opportunity: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::Store;
    use crate::domain::types::{Classification, MarginSource, PriceSource, RuleKind};

    fn opp(store: &str, feature: &str, improvement: f64, z: f64, qty: i64) -> Opportunity {
        Opportunity {
            store_code: store.to_string(),
            cluster_id: "C1".to_string(),
            feature_key: feature.to_string(),
            rule: RuleKind::MissingFeature,
            classification: Classification::MissingOpportunity,
            action: ActionType::Add,
            z_score: z,
            metric_gap: 100.0,
            peer_count: 5,
            recommended_quantity_change: qty,
            unit_price: 10.0,
            price_source: PriceSource::ClusterMedian,
            margin_rate: 0.5,
            margin_source: MarginSource::ConfiguredDefault,
            unit_cost: 5.0,
            investment_required: qty.unsigned_abs() as f64 * 5.0,
            retail_value: qty.unsigned_abs() as f64 * 10.0,
            current_sell_through_rate: 40.0,
            predicted_sell_through_rate: 40.0 + improvement,
            sell_through_improvement: improvement,
            roi: None,
            margin_uplift: None,
            transfer_partner: None,
            approved: true,
            rationale: "{}".to_string(),
        }
    }

    #[test]
    fn test_cap_keeps_top_ranked() {
        let aggregator = ResultAggregator::new(Some(3));
        let candidates = vec![
            opp("S1", "F1", 1.0, 2.0, 3),
            opp("S1", "F2", 5.0, 1.0, 3),
            opp("S1", "F3", 5.0, 3.0, 3),
            opp("S1", "F4", 2.0, 1.0, 9),
            opp("S1", "F5", 2.0, 1.0, 4),
        ];
        let mut diagnostics = BatchDiagnostics::default();
        let kept = aggregator.apply_cap(candidates, &mut diagnostics);

        let features: Vec<&str> = kept.iter().map(|o| o.feature_key.as_str()).collect();
        assert_eq!(features, vec!["F3", "F2", "F4"]);
        assert_eq!(diagnostics.rejection_counts.get("STORE_CAP_TRUNCATED"), Some(&2));
    }

    #[test]
    fn test_every_store_gets_a_row() {
        let clusters = ClusterIndex::build(&[
            Store::new("S1", "C1"),
            Store::new("S2", "C1"),
            Store::new("S3", "C2"),
        ])
        .unwrap();
        let opportunities = vec![opp("S1", "F1", 1.0, -2.0, 4), opp("S1", "F2", 1.0, 1.0, 6)];
        let aggregates = ResultAggregator::new(None).aggregate(&clusters, &opportunities);

        assert_eq!(aggregates.len(), 3);
        let s1 = &aggregates[0];
        assert_eq!(s1.total_quantity_needed, 10);
        assert_eq!(s1.add_count, 2);
        assert!((s1.mean_abs_z - 1.5).abs() < 1e-9);
        assert!((s1.total_investment - 50.0).abs() < 1e-9);
        assert_eq!(s1.primary_classification, "MISSING_OPPORTUNITY");

        let s3 = &aggregates[2];
        assert_eq!(s3.cluster_id, "C2");
        assert!(!s3.has_opportunity);
        assert_eq!(s3.opportunity_count, 0);
        assert_eq!(s3.primary_classification, NO_OPPORTUNITY_LABEL);
    }
}
