// ==========================================
// 门店集群商品建议系统 - 跳过/拒绝诊断
// ==========================================
// 红线: 所有跳过与拒绝必须带原因并计数 (可解释性)
// ==========================================

use crate::domain::types::{PriceSource, RuleKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 候选被跳过的原因（单候选失败, 非致命）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// 单价回退链全部失败
    PriceUnresolved { attempted: Vec<PriceSource> },
    /// 商品缺少类别标签
    MissingCategory,
    /// increase_only 模式下的减量候选
    DecreaseSuppressed,
    /// 取整后数量为 0
    ZeroQuantity { raw_quantity: f64 },
    /// 减量候选的门店在库不足以减少 1 件
    NoStockToReduce { current_quantity: f64 },
}

impl SkipReason {
    /// 计数用的稳定键
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::PriceUnresolved { .. } => "PRICE_UNRESOLVED",
            SkipReason::MissingCategory => "MISSING_CATEGORY",
            SkipReason::DecreaseSuppressed => "DECREASE_SUPPRESSED",
            SkipReason::ZeroQuantity { .. } => "ZERO_QUANTITY",
            SkipReason::NoStockToReduce { .. } => "NO_STOCK_TO_REDUCE",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::PriceUnresolved { attempted } => {
                let names: Vec<String> = attempted.iter().map(|s| s.to_string()).collect();
                write!(f, "PRICE_UNRESOLVED: attempted=[{}]", names.join(","))
            }
            SkipReason::MissingCategory => write!(f, "MISSING_CATEGORY"),
            SkipReason::DecreaseSuppressed => write!(f, "DECREASE_SUPPRESSED: increase_only"),
            SkipReason::ZeroQuantity { raw_quantity } => {
                write!(f, "ZERO_QUANTITY: raw_quantity={:.4}", raw_quantity)
            }
            SkipReason::NoStockToReduce { current_quantity } => {
                write!(f, "NO_STOCK_TO_REDUCE: current_quantity={}", current_quantity)
            }
        }
    }
}

/// 候选被拒绝的环节（正常结果, 非错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionStage {
    SellThrough,
    Roi,
    StoreCap,
}

impl fmt::Display for RejectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionStage::SellThrough => write!(f, "SELL_THROUGH_REJECTED"),
            RejectionStage::Roi => write!(f, "ROI_REJECTED"),
            RejectionStage::StoreCap => write!(f, "STORE_CAP_TRUNCATED"),
        }
    }
}

/// 跳过记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub store_code: String,
    pub feature_key: String,
    pub rule: RuleKind,
    pub reason: SkipReason,
}

/// 拒绝记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub store_code: String,
    pub feature_key: String,
    pub rule: RuleKind,
    pub stage: RejectionStage,
    pub rationale: String,
}

/// 批次诊断汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDiagnostics {
    pub skips: Vec<SkipRecord>,
    pub rejections: Vec<RejectionRecord>,
    /// 原因码 → 次数
    pub skip_counts: BTreeMap<String, usize>,
    pub rejection_counts: BTreeMap<String, usize>,
    /// 分类标签 → 判定数
    pub classification_counts: BTreeMap<String, usize>,
    /// 不在集群分配表中的销售记录行数
    pub ignored_sales_rows: usize,
    pub peer_groups: usize,
    pub verdicts: usize,
    /// 按双方较小幅度对齐的调拨对数
    pub transfers_balanced: usize,
    /// 对手方无建议行而退回单边动作的调拨候选数
    pub transfers_detached: usize,
}

impl BatchDiagnostics {
    pub fn record_skip(&mut self, record: SkipRecord) {
        *self
            .skip_counts
            .entry(record.reason.code().to_string())
            .or_insert(0) += 1;
        self.skips.push(record);
    }

    pub fn record_rejection(&mut self, record: RejectionRecord) {
        *self
            .rejection_counts
            .entry(record.stage.to_string())
            .or_insert(0) += 1;
        self.rejections.push(record);
    }

    pub fn record_classification(&mut self, label: &str) {
        *self.classification_counts.entry(label.to_string()).or_insert(0) += 1;
        self.verdicts += 1;
    }

    pub fn total_skipped(&self) -> usize {
        self.skips.len()
    }

    pub fn total_rejected(&self) -> usize {
        self.rejections.len()
    }

    /// 某个候选是否出现在跳过清单中
    pub fn was_skipped(&self, store_code: &str, feature_key: &str) -> bool {
        self.skips
            .iter()
            .any(|s| s.store_code == store_code && s.feature_key == feature_key)
    }
}
