// ==========================================
// 门店集群商品建议系统 - 建议输出实体
// ==========================================
// 职责: 单品级建议 (Opportunity) 与门店级汇总 (StoreAggregate)
// 生命周期: 仅存在于一次批处理, 交由外部持久化
// 红线: recommended_quantity_change 为整数; investment = |qty| × unit_cost
// ==========================================

use crate::domain::types::{
    ActionType, Classification, MarginSource, PriceSource, RuleKind,
};
use serde::{Deserialize, Serialize};

/// 无机会门店的默认分类标签
pub const NO_OPPORTUNITY_LABEL: &str = "NO_OPPORTUNITY";

/// 单品级建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub store_code: String,
    pub cluster_id: String,
    pub feature_key: String,
    pub rule: RuleKind,
    pub classification: Classification,
    pub action: ActionType,

    /// 失衡/缺失规则为 z-score，销售差距规则为全局标准化后的差距 z
    pub z_score: f64,
    /// 带符号的原始差距（金额或件数）
    pub metric_gap: f64,
    pub peer_count: usize,

    // ===== 数量与金额 =====
    pub recommended_quantity_change: i64,
    pub unit_price: f64,
    pub price_source: PriceSource,
    pub margin_rate: f64,
    pub margin_source: MarginSource,
    pub unit_cost: f64,
    pub investment_required: f64,
    pub retail_value: f64,

    // ===== 售罄率校验 =====
    pub current_sell_through_rate: f64,
    pub predicted_sell_through_rate: f64,
    pub sell_through_improvement: f64,

    // ===== ROI 门控（未启用时为 None）=====
    pub roi: Option<f64>,
    pub margin_uplift: Option<f64>,

    /// 配对调拨的对手门店
    pub transfer_partner: Option<String>,

    pub approved: bool,
    /// JSON 字符串
    pub rationale: String,
}

/// 门店级汇总（每店恰好一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreAggregate {
    pub store_code: String,
    pub cluster_id: String,
    pub opportunity_count: usize,
    pub approved_count: usize,
    pub add_count: usize,
    pub increase_count: usize,
    pub reduce_count: usize,
    pub rebalance_count: usize,
    pub total_quantity_needed: i64,
    pub total_investment: f64,
    pub total_retail_value: f64,
    pub mean_abs_z: f64,
    pub mean_predicted_sell_through: f64,
    pub primary_classification: String,
    pub has_opportunity: bool,
}

impl StoreAggregate {
    /// 零机会门店的显式空行
    pub fn empty(store_code: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            store_code: store_code.into(),
            cluster_id: cluster_id.into(),
            opportunity_count: 0,
            approved_count: 0,
            add_count: 0,
            increase_count: 0,
            reduce_count: 0,
            rebalance_count: 0,
            total_quantity_needed: 0,
            total_investment: 0.0,
            total_retail_value: 0.0,
            mean_abs_z: 0.0,
            mean_predicted_sell_through: 0.0,
            primary_classification: NO_OPPORTUNITY_LABEL.to_string(),
            has_opportunity: false,
        }
    }
}
