// ==========================================
// 门店集群商品建议系统 - 机会分类器
// ==========================================
// 职责: 把门店度量与同组统计转成 分类 + 带符号差距
// 结构: 三种可互换策略共享同一接口, 共享下游数量/校验/汇总环节
// 红线: 同组统计为空 → 输出为空 (不是错误)
// ==========================================

pub mod imbalance;
pub mod missing_feature;
pub mod performance_gap;

use crate::config::{EngineConfig, ImbalanceMetric};
use crate::domain::types::{ActionType, Classification, GapUnit, RuleKind};
use crate::engine::inputs::{ClusterIndex, LedgerIndex, MetricTable};
use crate::engine::peer_stats::{MetricBasis, PeerStatTable};
use serde::Serialize;

pub use imbalance::ImbalanceClassifier;
pub use missing_feature::MissingFeatureClassifier;
pub use performance_gap::PerformanceGapClassifier;

/// 单个 (门店, 商品) 的分类判定
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub rule: RuleKind,
    pub store_code: String,
    pub cluster_id: String,
    pub feature_key: String,
    pub classification: Classification,
    pub z_score: f64,
    /// 带符号差距: 正值 = 需要增加
    pub metric_gap: f64,
    pub gap_unit: GapUnit,
    pub store_value: f64,
    /// 台账当前在库数量
    pub current_quantity: f64,
    pub peer_count: usize,
    /// 同组有售门店数 / 集群门店数
    pub peer_adoption: f64,
}

impl Verdict {
    pub fn is_opportunity(&self) -> bool {
        self.classification.is_opportunity()
    }
}

/// 分类器共享的只读输入
pub struct ClassifierInput<'a> {
    pub clusters: &'a ClusterIndex,
    pub metrics: &'a MetricTable,
    pub ledger: &'a LedgerIndex,
    /// 按分类器 metric_basis() 口径计算的同组统计
    pub peer_stats: &'a PeerStatTable,
}

impl<'a> ClassifierInput<'a> {
    /// 同组有售门店占集群门店比例
    pub fn adoption(&self, cluster_id: &str, peer_count: usize) -> f64 {
        let size = self.clusters.cluster_size(cluster_id);
        if size == 0 {
            0.0
        } else {
            peer_count as f64 / size as f64
        }
    }
}

/// 机会分类策略
///
/// classify 输出全部判定（含无机会判定, 便于计数）,
/// action_for 只对机会判定返回动作
pub trait OpportunityClassifier {
    fn rule(&self) -> RuleKind;

    /// 同组统计口径
    fn metric_basis(&self) -> MetricBasis;

    fn classify(&self, input: &ClassifierInput<'_>) -> Vec<Verdict>;

    fn action_for(&self, verdict: &Verdict) -> Option<ActionType>;
}

/// 按规则种类创建分类器
pub fn classifier_for(rule: RuleKind, config: &EngineConfig) -> Box<dyn OpportunityClassifier> {
    match rule {
        RuleKind::MissingFeature => Box::new(MissingFeatureClassifier::new(
            config.adoption_threshold,
            config.volume_threshold,
        )),
        RuleKind::Imbalance => Box::new(ImbalanceClassifier::new(
            config.imbalance.clone(),
            config.imbalance_metric,
        )),
        RuleKind::PerformanceGap => {
            Box::new(PerformanceGapClassifier::new(config.performance_tiers.clone()))
        }
    }
}

/// 失衡度量 → 统计口径
pub(crate) fn basis_for_imbalance(metric: ImbalanceMetric) -> MetricBasis {
    match metric {
        ImbalanceMetric::SalesAmount => MetricBasis::SalesAmount,
        ImbalanceMetric::StockQuantity => MetricBasis::StockQuantity,
    }
}
