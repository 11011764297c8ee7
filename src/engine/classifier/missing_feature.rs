// ==========================================
// 门店集群商品建议系统 - 缺失畅销品策略
// ==========================================
// 规则: 集群内 有售门店数/集群门店数 ≥ adoption_threshold
//       且 集群总销售额 ≥ volume_threshold → 该商品为“畅销”
//       集群内未销售畅销品的门店 → 候选 (动作 ADD)
// 差距: 有售门店的平均销售额 (本店为 0)
// ==========================================

use super::{ClassifierInput, OpportunityClassifier, Verdict};
use crate::domain::types::{ActionType, Classification, GapUnit, RuleKind};
use crate::engine::peer_stats::MetricBasis;
use tracing::debug;

pub struct MissingFeatureClassifier {
    adoption_threshold: f64,
    volume_threshold: f64,
}

impl MissingFeatureClassifier {
    pub fn new(adoption_threshold: f64, volume_threshold: f64) -> Self {
        Self {
            adoption_threshold,
            volume_threshold,
        }
    }

    /// 判定某 (集群, 商品) 是否畅销
    pub fn is_well_selling(&self, stores_selling: usize, cluster_size: usize, total_sales: f64) -> bool {
        if cluster_size == 0 {
            return false;
        }
        let adoption = stores_selling as f64 / cluster_size as f64;
        adoption >= self.adoption_threshold && total_sales >= self.volume_threshold
    }
}

impl OpportunityClassifier for MissingFeatureClassifier {
    fn rule(&self) -> RuleKind {
        RuleKind::MissingFeature
    }

    fn metric_basis(&self) -> MetricBasis {
        MetricBasis::SalesAmount
    }

    fn classify(&self, input: &ClassifierInput<'_>) -> Vec<Verdict> {
        let mut verdicts = Vec::new();

        for stat in input.peer_stats.iter() {
            let cluster_size = input.clusters.cluster_size(&stat.cluster_id);
            if !self.is_well_selling(stat.count, cluster_size, stat.total) {
                continue;
            }

            let adoption = input.adoption(&stat.cluster_id, stat.count);
            debug!(
                cluster_id = %stat.cluster_id,
                feature_key = %stat.feature_key,
                adoption,
                total_sales = stat.total,
                "畅销商品"
            );

            for store in input.clusters.members(&stat.cluster_id) {
                let selling = input
                    .metrics
                    .get(store, &stat.feature_key)
                    .map(|m| m.is_selling())
                    .unwrap_or(false);
                if selling {
                    continue;
                }

                verdicts.push(Verdict {
                    rule: RuleKind::MissingFeature,
                    store_code: store.clone(),
                    cluster_id: stat.cluster_id.clone(),
                    feature_key: stat.feature_key.clone(),
                    classification: Classification::MissingOpportunity,
                    z_score: stat.z_score(0.0),
                    metric_gap: stat.mean,
                    gap_unit: GapUnit::Currency,
                    store_value: 0.0,
                    current_quantity: input.ledger.quantity(store, &stat.feature_key),
                    peer_count: stat.count,
                    peer_adoption: adoption,
                });
            }
        }

        verdicts
    }

    fn action_for(&self, verdict: &Verdict) -> Option<ActionType> {
        match verdict.classification {
            Classification::MissingOpportunity => Some(ActionType::Add),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sales::SalesRecord;
    use crate::domain::store::Store;
    use crate::engine::inputs::{ClusterIndex, LedgerIndex, MetricTable};
    use crate::engine::peer_stats::PeerGroupStatistics;

    fn run(stores: &[Store], sales: &[SalesRecord], classifier: &MissingFeatureClassifier) -> Vec<Verdict> {
        let clusters = ClusterIndex::build(stores).unwrap();
        let metrics = MetricTable::build(sales, &clusters, None).unwrap();
        let ledger = LedgerIndex::default();
        let stats = PeerGroupStatistics::new(3).compute_for_basis(
            MetricBasis::SalesAmount,
            &clusters,
            &metrics,
            &ledger,
        );
        classifier.classify(&ClassifierInput {
            clusters: &clusters,
            metrics: &metrics,
            ledger: &ledger,
            peer_stats: &stats,
        })
    }

    fn five_store_cluster() -> Vec<Store> {
        (1..=5).map(|i| Store::new(format!("S{}", i), "C1")).collect()
    }

    #[test]
    fn test_well_selling_feature_flags_non_selling_store() {
        let sales: Vec<SalesRecord> = (1..=4)
            .map(|i| SalesRecord::new(format!("S{}", i), "F", "P1", 500.0))
            .collect();
        let verdicts = run(&five_store_cluster(), &sales, &MissingFeatureClassifier::new(0.7, 1500.0));

        assert_eq!(verdicts.len(), 1);
        let v = &verdicts[0];
        assert_eq!(v.store_code, "S5");
        assert_eq!(v.classification, Classification::MissingOpportunity);
        assert!((v.metric_gap - 500.0).abs() < 1e-9);
        assert!((v.peer_adoption - 0.8).abs() < 1e-9);
        assert_eq!(v.peer_count, 4);
    }

    #[test]
    fn test_low_volume_feature_is_not_well_selling() {
        let sales: Vec<SalesRecord> = (1..=4)
            .map(|i| SalesRecord::new(format!("S{}", i), "F", "P1", 100.0))
            .collect();
        let verdicts = run(&five_store_cluster(), &sales, &MissingFeatureClassifier::new(0.7, 1500.0));
        assert!(verdicts.is_empty());
    }

    #[test]
    fn test_low_adoption_feature_is_not_well_selling() {
        let sales: Vec<SalesRecord> = (1..=3)
            .map(|i| SalesRecord::new(format!("S{}", i), "F", "P1", 1000.0))
            .collect();
        // 3/5 = 0.6 < 0.7
        let verdicts = run(&five_store_cluster(), &sales, &MissingFeatureClassifier::new(0.7, 1500.0));
        assert!(verdicts.is_empty());
    }

    #[test]
    fn test_is_well_selling_handles_empty_cluster() {
        let classifier = MissingFeatureClassifier::new(0.7, 1500.0);
        assert!(classifier.is_well_selling(4, 5, 2000.0));
        assert!(!classifier.is_well_selling(4, 0, 2000.0));
    }
}
