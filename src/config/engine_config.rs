// ==========================================
// 门店集群商品建议系统 - 引擎配置值对象
// ==========================================
// 职责: 一次批处理的全部阈值, 构造后不可变, 显式传入每个组件
// 红线: 不允许模块级可变全局配置
// ==========================================

use crate::domain::types::{Granularity, RedistributionStrategy};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 毛利率上限（clamp 到 [0, 0.95]）
pub const MAX_MARGIN_RATE: f64 = 0.95;

// ==========================================
// 失衡阈值（按粒度区分默认值）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceThresholds {
    /// |z| 超过该值即判定失衡（同时为 MODERATE 下界）
    pub z_score_threshold: f64,
    /// |z| ≥ high_cut → HIGH
    pub high_cut: f64,
    /// |z| ≥ extreme_cut → EXTREME
    pub extreme_cut: f64,
}

impl ImbalanceThresholds {
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Subcategory => Self {
                z_score_threshold: 2.0,
                high_cut: 2.5,
                extreme_cut: 3.0,
            },
            // SPU 粒度噪声更大, 阈值更高
            Granularity::Spu => Self {
                z_score_threshold: 3.0,
                high_cut: 3.5,
                extreme_cut: 4.0,
            },
        }
    }
}

/// 失衡规则使用的度量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbalanceMetric {
    /// 销售金额（差距需除以单价）
    SalesAmount,
    /// 台账在库数量（差距即件数）
    StockQuantity,
}

// ==========================================
// 销售差距分档切点（作用于全局标准化后的差距 z）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceTierCuts {
    /// z < top_performer_below → top_performer
    pub top_performer_below: f64,
    /// z ≥ some_opportunity_from → some_opportunity
    pub some_opportunity_from: f64,
    /// z ≥ good_opportunity_from → good_opportunity
    pub good_opportunity_from: f64,
    /// z ≥ major_opportunity_from → major_opportunity
    pub major_opportunity_from: f64,
}

impl Default for PerformanceTierCuts {
    fn default() -> Self {
        Self {
            top_performer_below: -1.0,
            some_opportunity_from: 0.5,
            good_opportunity_from: 1.0,
            major_opportunity_from: 2.0,
        }
    }
}

// ==========================================
// 售罄率预测参数
// ==========================================
// 经验调参值, 可整体覆写; 不代表业务真理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellThroughParams {
    // ----- 铺货率 logistic 曲线 -----
    pub logistic_ceiling: f64,
    pub logistic_steepness: f64,
    pub logistic_midpoint: f64,
    pub logistic_clip_min: f64,
    pub logistic_clip_max: f64,

    // ----- 证据混合 -----
    /// 历史值 = p50 + w × (p80 − p50)
    pub cluster_p80_weight: f64,
    /// 证据 = (1 − w) × 集群历史 + w × 门店品类基线
    pub baseline_weight: f64,
    /// 季节标签 → 调整系数（缺省 1.0）
    #[serde(default)]
    pub seasonal_factors: BTreeMap<String, f64>,

    // ----- 审批阈值（百分比）-----
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub max_degradation: f64,
    pub near_full_max_degradation: f64,
    /// 当前售罄率 ≥ 该值视为“接近 100%”
    pub near_full_rate: f64,
}

impl Default for SellThroughParams {
    fn default() -> Self {
        Self {
            logistic_ceiling: 80.0,
            logistic_steepness: 6.0,
            logistic_midpoint: 0.5,
            logistic_clip_min: 10.0,
            logistic_clip_max: 70.0,
            cluster_p80_weight: 0.5,
            baseline_weight: 0.4,
            seasonal_factors: BTreeMap::new(),
            min_threshold: 10.0,
            max_threshold: 90.0,
            max_degradation: 5.0,
            near_full_max_degradation: 15.0,
            near_full_rate: 95.0,
        }
    }
}

impl SellThroughParams {
    /// 季节调整系数
    pub fn seasonal_factor(&self, season: Option<&str>) -> f64 {
        season
            .and_then(|s| self.seasonal_factors.get(s))
            .copied()
            .unwrap_or(1.0)
    }
}

// ==========================================
// ROI 门控（可选）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiGateConfig {
    pub enabled: bool,
    pub roi_min_threshold: f64,
    pub min_margin_uplift: f64,
}

impl Default for RoiGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            roi_min_threshold: 0.3,
            min_margin_uplift: 100.0,
        }
    }
}

// ==========================================
// EngineConfig - 引擎配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub granularity: Granularity,

    // ----- 同组统计 -----
    /// 样本数低于该值的 (集群, 商品) 组不产出统计
    pub min_cluster_size: usize,

    // ----- 缺失畅销品 -----
    pub adoption_threshold: f64,
    pub volume_threshold: f64,

    // ----- 失衡 -----
    pub imbalance: ImbalanceThresholds,
    pub imbalance_metric: ImbalanceMetric,

    // ----- 销售差距 -----
    pub performance_tiers: PerformanceTierCuts,

    // ----- 数量 -----
    pub min_quantity_change: f64,
    pub max_quantity_change: f64,
    pub max_change_pct: f64,
    pub redistribution_strategy: RedistributionStrategy,

    // ----- 毛利 -----
    pub default_margin_rate: f64,

    // ----- 校验 -----
    pub min_comparables: usize,
    pub sell_through: SellThroughParams,
    pub roi: RoiGateConfig,

    /// 单店最多保留的建议数（None 不限）
    pub max_opportunities_per_store: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_granularity(Granularity::Subcategory)
    }
}

impl EngineConfig {
    /// 指定粒度的默认配置
    pub fn for_granularity(granularity: Granularity) -> Self {
        Self {
            granularity,
            min_cluster_size: 3,
            adoption_threshold: 0.70,
            volume_threshold: 1500.0,
            imbalance: ImbalanceThresholds::for_granularity(granularity),
            imbalance_metric: ImbalanceMetric::SalesAmount,
            performance_tiers: PerformanceTierCuts::default(),
            min_quantity_change: 1.0,
            max_quantity_change: 50.0,
            max_change_pct: 0.5,
            redistribution_strategy: RedistributionStrategy::IncreaseOnly,
            default_margin_rate: 0.45,
            min_comparables: 5,
            sell_through: SellThroughParams::default(),
            roi: RoiGateConfig::default(),
            max_opportunities_per_store: None,
        }
    }

    /// 便捷: 读取失衡 z 阈值
    pub fn z_score_threshold(&self) -> f64 {
        self.imbalance.z_score_threshold
    }

    /// 校验配置取值范围（计算开始前调用）
    ///
    /// 任一字段越界即返回 Configuration 错误, 不做静默修正
    pub fn validate(&self) -> EngineResult<()> {
        if self.min_cluster_size < 2 {
            // 样本标准差 (ddof=1) 至少需要 2 个样本
            return Err(EngineError::configuration(
                "min_cluster_size",
                format!("必须 ≥ 2, 实际 {}", self.min_cluster_size),
            ));
        }
        check_unit_interval("adoption_threshold", self.adoption_threshold)?;
        check_non_negative("volume_threshold", self.volume_threshold)?;

        let imb = &self.imbalance;
        check_positive("imbalance.z_score_threshold", imb.z_score_threshold)?;
        if !(imb.z_score_threshold <= imb.high_cut && imb.high_cut <= imb.extreme_cut) {
            return Err(EngineError::configuration(
                "imbalance",
                format!(
                    "严重度切点必须单调: z_score_threshold={} ≤ high_cut={} ≤ extreme_cut={}",
                    imb.z_score_threshold, imb.high_cut, imb.extreme_cut
                ),
            ));
        }

        let tiers = &self.performance_tiers;
        let cuts = [
            tiers.top_performer_below,
            tiers.some_opportunity_from,
            tiers.good_opportunity_from,
            tiers.major_opportunity_from,
        ];
        if cuts.iter().any(|c| !c.is_finite()) || cuts.windows(2).any(|w| w[0] > w[1]) {
            return Err(EngineError::configuration(
                "performance_tiers",
                format!("分档切点必须有限且单调不减: {:?}", cuts),
            ));
        }

        check_positive("min_quantity_change", self.min_quantity_change)?;
        if self.min_quantity_change > self.max_quantity_change {
            return Err(EngineError::configuration(
                "min_quantity_change",
                format!(
                    "min_quantity_change={} > max_quantity_change={}",
                    self.min_quantity_change, self.max_quantity_change
                ),
            ));
        }
        check_positive("max_change_pct", self.max_change_pct)?;

        if !(0.0..=MAX_MARGIN_RATE).contains(&self.default_margin_rate) {
            return Err(EngineError::configuration(
                "default_margin_rate",
                format!("必须位于 [0, {}], 实际 {}", MAX_MARGIN_RATE, self.default_margin_rate),
            ));
        }

        if self.min_comparables == 0 {
            return Err(EngineError::configuration("min_comparables", "必须 ≥ 1"));
        }

        self.validate_sell_through()?;

        check_finite("roi.roi_min_threshold", self.roi.roi_min_threshold)?;
        check_non_negative("roi.min_margin_uplift", self.roi.min_margin_uplift)?;

        if self.max_opportunities_per_store == Some(0) {
            return Err(EngineError::configuration(
                "max_opportunities_per_store",
                "上限为 0 会清空所有建议, 请使用 None 表示不限",
            ));
        }

        Ok(())
    }

    fn validate_sell_through(&self) -> EngineResult<()> {
        let st = &self.sell_through;
        check_percent("sell_through.min_threshold", st.min_threshold)?;
        check_percent("sell_through.max_threshold", st.max_threshold)?;
        if st.min_threshold > st.max_threshold {
            return Err(EngineError::configuration(
                "sell_through.min_threshold",
                format!(
                    "min_threshold={} > max_threshold={}",
                    st.min_threshold, st.max_threshold
                ),
            ));
        }
        check_percent("sell_through.logistic_clip_min", st.logistic_clip_min)?;
        check_percent("sell_through.logistic_clip_max", st.logistic_clip_max)?;
        if st.logistic_clip_min > st.logistic_clip_max {
            return Err(EngineError::configuration(
                "sell_through.logistic_clip_min",
                format!(
                    "logistic_clip_min={} > logistic_clip_max={}",
                    st.logistic_clip_min, st.logistic_clip_max
                ),
            ));
        }
        check_positive("sell_through.logistic_ceiling", st.logistic_ceiling)?;
        check_finite("sell_through.logistic_steepness", st.logistic_steepness)?;
        check_unit_interval("sell_through.logistic_midpoint", st.logistic_midpoint)?;
        check_unit_interval("sell_through.cluster_p80_weight", st.cluster_p80_weight)?;
        check_unit_interval("sell_through.baseline_weight", st.baseline_weight)?;
        check_non_negative("sell_through.max_degradation", st.max_degradation)?;
        check_non_negative(
            "sell_through.near_full_max_degradation",
            st.near_full_max_degradation,
        )?;
        check_percent("sell_through.near_full_rate", st.near_full_rate)?;
        for (season, factor) in &st.seasonal_factors {
            if !factor.is_finite() || *factor <= 0.0 {
                return Err(EngineError::configuration(
                    "sell_through.seasonal_factors",
                    format!("season={} 系数必须为正数, 实际 {}", season, factor),
                ));
            }
        }
        Ok(())
    }
}

// ==========================================
// 取值范围检查工具
// ==========================================

fn check_finite(field: &str, value: f64) -> EngineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::configuration(field, format!("必须为有限数值, 实际 {}", value)))
    }
}

fn check_non_negative(field: &str, value: f64) -> EngineResult<()> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(EngineError::configuration(field, format!("不能为负数, 实际 {}", value)));
    }
    Ok(())
}

fn check_positive(field: &str, value: f64) -> EngineResult<()> {
    check_finite(field, value)?;
    if value <= 0.0 {
        return Err(EngineError::configuration(field, format!("必须为正数, 实际 {}", value)));
    }
    Ok(())
}

fn check_unit_interval(field: &str, value: f64) -> EngineResult<()> {
    check_finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::configuration(field, format!("必须位于 [0, 1], 实际 {}", value)));
    }
    Ok(())
}

fn check_percent(field: &str, value: f64) -> EngineResult<()> {
    check_finite(field, value)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(EngineError::configuration(field, format!("必须位于 [0, 100], 实际 {}", value)));
    }
    Ok(())
}
