// ==========================================
// 门店集群商品建议系统 - 配货失衡策略
// ==========================================
// 规则: z = (门店值 − 组均值) / 组样本标准差
//       |z| > z_score_threshold → 失衡; 符号决定 超配/欠配
//       |z| 分档: MODERATE / HIGH / EXTREME (切点随粒度不同)
// 边界: 组内零方差 → z = 0 → OPTIMAL (无机会)
// ==========================================

use super::{basis_for_imbalance, ClassifierInput, OpportunityClassifier, Verdict};
use crate::config::{ImbalanceMetric, ImbalanceThresholds};
use crate::domain::peer_stat::PeerGroupStat;
use crate::domain::types::{
    ActionType, Classification, GapUnit, ImbalanceDirection, RuleKind, Severity,
};
use crate::engine::peer_stats::MetricBasis;

pub struct ImbalanceClassifier {
    thresholds: ImbalanceThresholds,
    metric: ImbalanceMetric,
}

impl ImbalanceClassifier {
    pub fn new(thresholds: ImbalanceThresholds, metric: ImbalanceMetric) -> Self {
        Self { thresholds, metric }
    }

    /// 单值分类: (分类, z)
    pub fn classify_value(&self, value: f64, stat: &PeerGroupStat) -> (Classification, f64) {
        if stat.is_zero_variance() {
            return (Classification::Optimal, 0.0);
        }
        let z = stat.z_score(value);
        if z.abs() <= self.thresholds.z_score_threshold {
            return (Classification::Optimal, z);
        }

        let direction = if z > 0.0 {
            ImbalanceDirection::OverAllocated
        } else {
            ImbalanceDirection::UnderAllocated
        };
        (
            Classification::Imbalanced {
                direction,
                severity: self.severity(z.abs()),
            },
            z,
        )
    }

    fn severity(&self, abs_z: f64) -> Severity {
        if abs_z >= self.thresholds.extreme_cut {
            Severity::Extreme
        } else if abs_z >= self.thresholds.high_cut {
            Severity::High
        } else {
            Severity::Moderate
        }
    }

    fn gap_unit(&self) -> GapUnit {
        match self.metric {
            ImbalanceMetric::SalesAmount => GapUnit::Currency,
            ImbalanceMetric::StockQuantity => GapUnit::Units,
        }
    }
}

impl OpportunityClassifier for ImbalanceClassifier {
    fn rule(&self) -> RuleKind {
        RuleKind::Imbalance
    }

    fn metric_basis(&self) -> MetricBasis {
        basis_for_imbalance(self.metric)
    }

    fn classify(&self, input: &ClassifierInput<'_>) -> Vec<Verdict> {
        let mut verdicts = Vec::new();

        for stat in input.peer_stats.iter() {
            let adoption = input.adoption(&stat.cluster_id, stat.count);
            for (store, value) in input.peer_stats.members(&stat.cluster_id, &stat.feature_key) {
                let (classification, z) = self.classify_value(*value, stat);
                verdicts.push(Verdict {
                    rule: RuleKind::Imbalance,
                    store_code: store.clone(),
                    cluster_id: stat.cluster_id.clone(),
                    feature_key: stat.feature_key.clone(),
                    classification,
                    z_score: z,
                    // 欠配为正（需补）, 超配为负（需减）
                    metric_gap: stat.mean - value,
                    gap_unit: self.gap_unit(),
                    store_value: *value,
                    current_quantity: input.ledger.quantity(store, &stat.feature_key),
                    peer_count: stat.count,
                    peer_adoption: adoption,
                });
            }
        }

        verdicts
    }

    fn action_for(&self, verdict: &Verdict) -> Option<ActionType> {
        verdict.classification.imbalance_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Granularity;

    fn stat(mean: f64, std: f64) -> PeerGroupStat {
        PeerGroupStat {
            cluster_id: "C1".to_string(),
            feature_key: "F1".to_string(),
            count: 10,
            mean,
            std,
            p75: mean,
            p80: mean,
            total: mean * 10.0,
        }
    }

    fn classifier(granularity: Granularity) -> ImbalanceClassifier {
        ImbalanceClassifier::new(
            ImbalanceThresholds::for_granularity(granularity),
            ImbalanceMetric::SalesAmount,
        )
    }

    #[test]
    fn test_zero_variance_is_optimal() {
        let (c, z) = classifier(Granularity::Subcategory).classify_value(10.0, &stat(10.0, 0.0));
        assert_eq!(c, Classification::Optimal);
        assert_eq!(z, 0.0);
    }

    #[test]
    fn test_over_and_under_allocation() {
        let c = classifier(Granularity::Subcategory);
        let (over, z) = c.classify_value(130.0, &stat(100.0, 10.0));
        assert!((z - 3.0).abs() < 1e-12);
        assert_eq!(
            over,
            Classification::Imbalanced {
                direction: ImbalanceDirection::OverAllocated,
                severity: Severity::Extreme,
            }
        );

        let (under, _) = c.classify_value(78.0, &stat(100.0, 10.0));
        assert_eq!(
            under,
            Classification::Imbalanced {
                direction: ImbalanceDirection::UnderAllocated,
                severity: Severity::Moderate,
            }
        );
    }

    #[test]
    fn test_spu_granularity_uses_higher_threshold() {
        // |z| = 2.5: 子类别 → HIGH, SPU → OPTIMAL
        let (sub, _) = classifier(Granularity::Subcategory).classify_value(125.0, &stat(100.0, 10.0));
        let (spu, _) = classifier(Granularity::Spu).classify_value(125.0, &stat(100.0, 10.0));
        assert!(sub.is_opportunity());
        assert_eq!(spu, Classification::Optimal);
    }

    #[test]
    fn test_threshold_is_strict() {
        let (c, _) = classifier(Granularity::Subcategory).classify_value(120.0, &stat(100.0, 10.0));
        assert_eq!(c, Classification::Optimal);
    }

    #[test]
    fn test_actions_follow_direction() {
        let c = classifier(Granularity::Subcategory);
        let mut verdict = Verdict {
            rule: RuleKind::Imbalance,
            store_code: "S1".to_string(),
            cluster_id: "C1".to_string(),
            feature_key: "F1".to_string(),
            classification: Classification::Imbalanced {
                direction: ImbalanceDirection::UnderAllocated,
                severity: Severity::High,
            },
            z_score: -2.6,
            metric_gap: 26.0,
            gap_unit: GapUnit::Currency,
            store_value: 74.0,
            current_quantity: 5.0,
            peer_count: 10,
            peer_adoption: 1.0,
        };
        assert_eq!(c.action_for(&verdict), Some(ActionType::Increase));

        verdict.classification = Classification::Optimal;
        assert_eq!(c.action_for(&verdict), None);
    }
}
