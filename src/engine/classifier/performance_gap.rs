// ==========================================
// 门店集群商品建议系统 - 销售差距策略
// ==========================================
// 规则: gap = 组 p75 − 门店值
//       全批次差距做一次标准化 (z), 按切点分为 5 个有序档位
//       输出顺序: z 大者在前, 同 z 按 (门店, 商品) 升序
// 边界: 组内零方差 → z = 0 → performing_well (不进入全局标准化)
//       gap ≤ 0 的门店不会落入机会档
// ==========================================

use super::{ClassifierInput, OpportunityClassifier, Verdict};
use crate::config::PerformanceTierCuts;
use crate::domain::types::{ActionType, Classification, GapUnit, PerformanceTier, RuleKind};
use crate::domain::peer_stat::standard_score;
use crate::engine::peer_stats::{mean, sample_std, MetricBasis};
use std::cmp::Ordering;
use tracing::debug;

pub struct PerformanceGapClassifier {
    cuts: PerformanceTierCuts,
}

impl PerformanceGapClassifier {
    pub fn new(cuts: PerformanceTierCuts) -> Self {
        Self { cuts }
    }

    /// 按全局 z 分档
    pub fn tier_for(&self, z: f64, gap: f64) -> PerformanceTier {
        let tier = if z >= self.cuts.major_opportunity_from {
            PerformanceTier::MajorOpportunity
        } else if z >= self.cuts.good_opportunity_from {
            PerformanceTier::GoodOpportunity
        } else if z >= self.cuts.some_opportunity_from {
            PerformanceTier::SomeOpportunity
        } else if z < self.cuts.top_performer_below {
            PerformanceTier::TopPerformer
        } else {
            PerformanceTier::PerformingWell
        };

        // 已达到或超过 p75 的门店没有上行空间
        if gap <= 0.0 && tier.is_opportunity() {
            PerformanceTier::PerformingWell
        } else {
            tier
        }
    }
}

impl OpportunityClassifier for PerformanceGapClassifier {
    fn rule(&self) -> RuleKind {
        RuleKind::PerformanceGap
    }

    fn metric_basis(&self) -> MetricBasis {
        MetricBasis::SalesAmount
    }

    fn classify(&self, input: &ClassifierInput<'_>) -> Vec<Verdict> {
        // 1. 收集每个成员的原始差距
        let mut verdicts = Vec::new();
        let mut pooled_gaps = Vec::new();

        for stat in input.peer_stats.iter() {
            let adoption = input.adoption(&stat.cluster_id, stat.count);
            for (store, value) in input.peer_stats.members(&stat.cluster_id, &stat.feature_key) {
                let gap = stat.p75 - value;
                let zero_variance = stat.is_zero_variance();
                if !zero_variance {
                    pooled_gaps.push(gap);
                }
                verdicts.push((
                    zero_variance,
                    Verdict {
                        rule: RuleKind::PerformanceGap,
                        store_code: store.clone(),
                        cluster_id: stat.cluster_id.clone(),
                        feature_key: stat.feature_key.clone(),
                        classification: Classification::Performance(
                            PerformanceTier::PerformingWell,
                        ),
                        z_score: 0.0,
                        metric_gap: gap,
                        gap_unit: GapUnit::Currency,
                        store_value: *value,
                        current_quantity: input.ledger.quantity(store, &stat.feature_key),
                        peer_count: stat.count,
                        peer_adoption: adoption,
                    },
                ));
            }
        }

        // 2. 全批次标准化
        let gap_mean = mean(&pooled_gaps);
        let gap_std = sample_std(&pooled_gaps);
        debug!(
            pooled = pooled_gaps.len(),
            gap_mean, gap_std, "销售差距全局标准化"
        );

        let mut verdicts: Vec<Verdict> = verdicts
            .into_iter()
            .map(|(zero_variance, mut verdict)| {
                if !zero_variance {
                    let z = standard_score(verdict.metric_gap, gap_mean, gap_std);
                    verdict.z_score = z;
                    verdict.classification =
                        Classification::Performance(self.tier_for(z, verdict.metric_gap));
                }
                verdict
            })
            .collect();

        // 3. z 降序, 同 z 按 (门店, 商品)
        verdicts.sort_by(|a, b| {
            b.z_score
                .partial_cmp(&a.z_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.store_code.cmp(&b.store_code))
                .then_with(|| a.feature_key.cmp(&b.feature_key))
        });

        verdicts
    }

    fn action_for(&self, verdict: &Verdict) -> Option<ActionType> {
        match verdict.classification {
            Classification::Performance(tier) if tier.is_opportunity() && verdict.metric_gap > 0.0 => {
                Some(ActionType::Increase)
            }
            _ => None,
        }
    }
}
