// ==========================================
// 门店集群商品建议系统 - 动作分配与调拨配对
// ==========================================
// 职责: 机会判定 → 建议动作
// paired 模式: 同 (集群, 商品) 内
//   超配门店按 z 降序, 欠配门店按 z 升序, 按下标一一配对
//   配对双方动作为 REBALANCE, 并记录对手门店
//   未配对者保留 REDUCE / INCREASE
// increase_only 模式: 不配对, 减量在数量环节丢弃
// 配对整理 (数量确定之后):
//   双方均有数量 → 两侧幅度取较小者, 调出 = 调入
//   对手方被跳过/拒绝/截断 → 本侧退回单边动作, 清除对手门店
// ==========================================

use crate::domain::opportunity::Opportunity;
use crate::domain::types::{
    ActionType, Classification, ImbalanceDirection, RedistributionStrategy,
};
use crate::engine::classifier::{OpportunityClassifier, Verdict};
use crate::engine::quantity::QuantityPlan;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// 带动作的候选
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCandidate {
    pub verdict: Verdict,
    pub action: ActionType,
    pub transfer_partner: Option<String>,
}

/// 数量已确定的候选
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCandidate {
    pub candidate: ActionCandidate,
    pub plan: QuantityPlan,
}

/// 为机会判定分配动作; 非机会判定被丢弃
pub fn assign_actions(
    classifier: &dyn OpportunityClassifier,
    verdicts: &[Verdict],
    strategy: RedistributionStrategy,
) -> Vec<ActionCandidate> {
    let mut candidates: Vec<ActionCandidate> = verdicts
        .iter()
        .filter(|v| v.is_opportunity())
        .filter_map(|v| {
            classifier.action_for(v).map(|action| ActionCandidate {
                verdict: v.clone(),
                action,
                transfer_partner: None,
            })
        })
        .collect();

    if strategy == RedistributionStrategy::Paired {
        let pairs = pair_transfers(&mut candidates);
        debug!(pairs, "调拨配对完成");
    }

    candidates
}

/// 同 (集群, 商品) 内配对超配与欠配门店, 返回配对数
pub fn pair_transfers(candidates: &mut [ActionCandidate]) -> usize {
    // (集群, 商品) → (超配下标, 欠配下标)
    let mut groups: BTreeMap<(String, String), (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (idx, c) in candidates.iter().enumerate() {
        let direction = match c.verdict.classification {
            Classification::Imbalanced { direction, .. } => direction,
            _ => continue,
        };
        let entry = groups
            .entry((c.verdict.cluster_id.clone(), c.verdict.feature_key.clone()))
            .or_default();
        match direction {
            ImbalanceDirection::OverAllocated => entry.0.push(idx),
            ImbalanceDirection::UnderAllocated => entry.1.push(idx),
        }
    }

    let mut paired = 0;
    for (_, (mut over, mut under)) in groups {
        over.sort_by(|a, b| by_z(candidates, *b, *a));
        under.sort_by(|a, b| by_z(candidates, *a, *b));

        for (&o, &u) in over.iter().zip(under.iter()) {
            let over_store = candidates[o].verdict.store_code.clone();
            let under_store = candidates[u].verdict.store_code.clone();
            candidates[o].action = ActionType::Rebalance;
            candidates[o].transfer_partner = Some(under_store);
            candidates[u].action = ActionType::Rebalance;
            candidates[u].transfer_partner = Some(over_store);
            paired += 1;
        }
    }
    paired
}

/// 数量确定后整理配对: 返回 (对齐的调拨对数, 退回单边的候选数)
pub fn balance_transfers(planned: &mut [PlannedCandidate]) -> (usize, usize) {
    let index: BTreeMap<(String, String, String), usize> = planned
        .iter()
        .enumerate()
        .filter(|(_, p)| p.candidate.transfer_partner.is_some())
        .map(|(idx, p)| {
            let v = &p.candidate.verdict;
            (
                (v.store_code.clone(), v.cluster_id.clone(), v.feature_key.clone()),
                idx,
            )
        })
        .collect();

    let mut pairs = Vec::new();
    let mut orphans = Vec::new();
    for (idx, p) in planned.iter().enumerate() {
        let Some(partner) = p.candidate.transfer_partner.as_deref() else {
            continue;
        };
        let v = &p.candidate.verdict;
        let mirror = index
            .get(&(partner.to_string(), v.cluster_id.clone(), v.feature_key.clone()))
            .copied()
            .filter(|&other| {
                planned[other].candidate.transfer_partner.as_deref() == Some(v.store_code.as_str())
            });
        match mirror {
            Some(other) if idx < other => pairs.push((idx, other)),
            Some(_) => {}
            None => orphans.push(idx),
        }
    }

    for &(a, b) in &pairs {
        let (qa, qb) = (planned[a].plan.quantity, planned[b].plan.quantity);
        let units = qa.unsigned_abs().min(qb.unsigned_abs()) as i64;
        planned[a].plan = planned[a].plan.with_quantity(qa.signum() * units);
        planned[b].plan = planned[b].plan.with_quantity(qb.signum() * units);
    }

    for &idx in &orphans {
        let quantity = planned[idx].plan.quantity;
        let candidate = &mut planned[idx].candidate;
        candidate.action = standalone_action(&candidate.verdict.classification, quantity);
        candidate.transfer_partner = None;
    }

    debug!(balanced = pairs.len(), detached = orphans.len(), "调拨数量对齐");
    (pairs.len(), orphans.len())
}

/// 对手方没有建议行的调拨退回单边动作, 返回退回数
pub fn detach_orphaned_transfers(opportunities: &mut [Opportunity]) -> usize {
    let links: BTreeSet<(String, String, String, String)> = opportunities
        .iter()
        .filter_map(|o| {
            o.transfer_partner.as_ref().map(|partner| {
                (
                    o.store_code.clone(),
                    o.cluster_id.clone(),
                    o.feature_key.clone(),
                    partner.clone(),
                )
            })
        })
        .collect();

    let mut detached = 0;
    for opp in opportunities.iter_mut() {
        let Some(partner) = opp.transfer_partner.clone() else {
            continue;
        };
        let mirror = (
            partner.clone(),
            opp.cluster_id.clone(),
            opp.feature_key.clone(),
            opp.store_code.clone(),
        );
        if links.contains(&mirror) {
            continue;
        }
        let action = standalone_action(&opp.classification, opp.recommended_quantity_change);
        opp.action = action;
        opp.transfer_partner = None;
        opp.rationale = mark_detached(&opp.rationale, action, &partner);
        detached += 1;
    }
    detached
}

/// 不配对时的动作
fn standalone_action(classification: &Classification, quantity: i64) -> ActionType {
    classification.imbalance_action().unwrap_or(if quantity < 0 {
        ActionType::Reduce
    } else {
        ActionType::Increase
    })
}

/// 在 rationale 中记录退回前的对手门店
fn mark_detached(rationale: &str, action: ActionType, partner: &str) -> String {
    match serde_json::from_str::<Value>(rationale) {
        Ok(Value::Object(mut fields)) => {
            fields.insert("action".to_string(), json!(action));
            fields.insert("transfer_partner".to_string(), Value::Null);
            fields.insert("detached_partner".to_string(), json!(partner));
            Value::Object(fields).to_string()
        }
        _ => rationale.to_string(),
    }
}

/// 按 z 升序比较, 同 z 按门店编码
fn by_z(candidates: &[ActionCandidate], a: usize, b: usize) -> Ordering {
    let (va, vb) = (&candidates[a].verdict, &candidates[b].verdict);
    va.z_score
        .total_cmp(&vb.z_score)
        .then_with(|| va.store_code.cmp(&vb.store_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImbalanceMetric, ImbalanceThresholds};
    use crate::domain::types::{
        GapUnit, Granularity, MarginSource, PriceSource, RuleKind, Severity,
    };
    use crate::engine::classifier::ImbalanceClassifier;
    use crate::engine::margin_resolver::ResolvedMargin;
    use crate::engine::price_resolver::ResolvedPrice;

    fn verdict(store: &str, z: f64, direction: Option<ImbalanceDirection>) -> Verdict {
        Verdict {
            rule: RuleKind::Imbalance,
            store_code: store.to_string(),
            cluster_id: "C1".to_string(),
            feature_key: "F1".to_string(),
            classification: match direction {
                Some(direction) => Classification::Imbalanced {
                    direction,
                    severity: Severity::High,
                },
                None => Classification::Optimal,
            },
            z_score: z,
            metric_gap: -z * 10.0,
            gap_unit: GapUnit::Units,
            store_value: 0.0,
            current_quantity: 10.0,
            peer_count: 8,
            peer_adoption: 1.0,
        }
    }

    fn classifier() -> ImbalanceClassifier {
        ImbalanceClassifier::new(
            ImbalanceThresholds::for_granularity(Granularity::Subcategory),
            ImbalanceMetric::StockQuantity,
        )
    }

    fn verdicts() -> Vec<Verdict> {
        vec![
            verdict("S1", 2.6, Some(ImbalanceDirection::OverAllocated)),
            verdict("S2", 3.4, Some(ImbalanceDirection::OverAllocated)),
            verdict("S3", -2.2, Some(ImbalanceDirection::UnderAllocated)),
            verdict("S4", -3.1, Some(ImbalanceDirection::UnderAllocated)),
            verdict("S5", -2.8, Some(ImbalanceDirection::UnderAllocated)),
            verdict("S6", 0.3, None),
        ]
    }

    #[test]
    fn test_increase_only_keeps_directional_actions() {
        let c = classifier();
        let candidates = assign_actions(&c, &verdicts(), RedistributionStrategy::IncreaseOnly);
        assert_eq!(candidates.len(), 5);
        assert!(candidates.iter().all(|c| c.transfer_partner.is_none()));
        assert_eq!(candidates[0].action, ActionType::Reduce);
        assert_eq!(candidates[2].action, ActionType::Increase);
    }

    #[test]
    fn test_paired_matches_extremes_first() {
        let c = classifier();
        let candidates = assign_actions(&c, &verdicts(), RedistributionStrategy::Paired);
        let by_store: BTreeMap<&str, &ActionCandidate> = candidates
            .iter()
            .map(|c| (c.verdict.store_code.as_str(), c))
            .collect();

        // 最超配 S2 ↔ 最欠配 S4, 其次 S1 ↔ S5
        assert_eq!(by_store["S2"].transfer_partner.as_deref(), Some("S4"));
        assert_eq!(by_store["S4"].transfer_partner.as_deref(), Some("S2"));
        assert_eq!(by_store["S1"].transfer_partner.as_deref(), Some("S5"));
        assert_eq!(by_store["S1"].action, ActionType::Rebalance);
        // S3 未配对
        assert_eq!(by_store["S3"].action, ActionType::Increase);
        assert!(by_store["S3"].transfer_partner.is_none());
    }

    fn planned(store: &str, z: f64, direction: ImbalanceDirection, quantity: i64) -> PlannedCandidate {
        let price = ResolvedPrice {
            source: PriceSource::StoreLedgerAverage,
            value: 20.0,
        };
        let margin = ResolvedMargin {
            source: MarginSource::ConfiguredDefault,
            value: 0.5,
        };
        let plan = QuantityPlan {
            quantity,
            raw_quantity: quantity as f64,
            price,
            margin,
            category: "TOPS".to_string(),
            unit_cost: 10.0,
            investment_required: 0.0,
            retail_value: 0.0,
        }
        .with_quantity(quantity);
        PlannedCandidate {
            candidate: ActionCandidate {
                verdict: verdict(store, z, Some(direction)),
                action: ActionType::Increase,
                transfer_partner: None,
            },
            plan,
        }
    }

    fn paired(mut a: PlannedCandidate, mut b: PlannedCandidate) -> Vec<PlannedCandidate> {
        a.candidate.action = ActionType::Rebalance;
        a.candidate.transfer_partner = Some(b.candidate.verdict.store_code.clone());
        b.candidate.action = ActionType::Rebalance;
        b.candidate.transfer_partner = Some(a.candidate.verdict.store_code.clone());
        vec![a, b]
    }

    #[test]
    fn test_pair_quantities_are_balanced() {
        let mut list = paired(
            planned("S1", 3.4, ImbalanceDirection::OverAllocated, -30),
            planned("S2", -2.5, ImbalanceDirection::UnderAllocated, 4),
        );
        assert_eq!(balance_transfers(&mut list), (1, 0));
        assert_eq!(list[0].plan.quantity, -4);
        assert_eq!(list[1].plan.quantity, 4);
        assert!((list[0].plan.investment_required - 40.0).abs() < 1e-9);
        assert!((list[0].plan.retail_value - 80.0).abs() < 1e-9);
        assert_eq!(list[0].candidate.action, ActionType::Rebalance);
    }

    #[test]
    fn test_unplanned_partner_detaches_survivor() {
        // S1 的对手 S2 在数量环节已被跳过
        let mut list = paired(
            planned("S1", 3.4, ImbalanceDirection::OverAllocated, -30),
            planned("S2", -2.5, ImbalanceDirection::UnderAllocated, 4),
        );
        list.pop();
        assert_eq!(balance_transfers(&mut list), (0, 1));
        assert_eq!(list[0].candidate.action, ActionType::Reduce);
        assert!(list[0].candidate.transfer_partner.is_none());
        assert_eq!(list[0].plan.quantity, -30);
    }

    fn opportunity(store: &str, partner: Option<&str>, quantity: i64) -> Opportunity {
        Opportunity {
            store_code: store.to_string(),
            cluster_id: "C1".to_string(),
            feature_key: "F1".to_string(),
            rule: RuleKind::Imbalance,
            classification: Classification::Imbalanced {
                direction: ImbalanceDirection::UnderAllocated,
                severity: Severity::Moderate,
            },
            action: ActionType::Rebalance,
            z_score: -2.2,
            metric_gap: 5.0,
            peer_count: 8,
            recommended_quantity_change: quantity,
            unit_price: 20.0,
            price_source: PriceSource::StoreLedgerAverage,
            margin_rate: 0.5,
            margin_source: MarginSource::ConfiguredDefault,
            unit_cost: 10.0,
            investment_required: 10.0 * quantity.unsigned_abs() as f64,
            retail_value: 20.0 * quantity.unsigned_abs() as f64,
            current_sell_through_rate: 50.0,
            predicted_sell_through_rate: 50.0,
            sell_through_improvement: 0.0,
            roi: None,
            margin_uplift: None,
            transfer_partner: partner.map(str::to_string),
            approved: true,
            rationale: json!({ "action": "REBALANCE", "transfer_partner": partner }).to_string(),
        }
    }

    #[test]
    fn test_rejected_partner_detaches_opportunity() {
        let mut opps = vec![
            opportunity("S2", Some("S1"), 4),
            opportunity("S3", Some("S4"), 2),
            opportunity("S4", Some("S3"), -2),
        ];
        assert_eq!(detach_orphaned_transfers(&mut opps), 1);

        assert_eq!(opps[0].action, ActionType::Increase);
        assert!(opps[0].transfer_partner.is_none());
        let rationale: Value = serde_json::from_str(&opps[0].rationale).unwrap();
        assert_eq!(rationale["action"], "INCREASE");
        assert_eq!(rationale["transfer_partner"], Value::Null);
        assert_eq!(rationale["detached_partner"], "S1");

        // 完整的一对保持不变
        assert_eq!(opps[1].transfer_partner.as_deref(), Some("S4"));
        assert_eq!(opps[2].action, ActionType::Rebalance);
    }
}
