// ==========================================
// 门店集群商品建议系统 - 领域类型定义
// ==========================================
// 职责: 规则种类、动作类型、分级标签、来源标签
// 序列化格式: SCREAMING_SNAKE_CASE (与下游持久化一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 商品维度粒度 (Granularity)
// ==========================================
// 子类别 与 SPU 两种粒度使用不同的默认阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Granularity {
    Subcategory, // 子类别
    Spu,         // 单品
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Subcategory => write!(f, "SUBCATEGORY"),
            Granularity::Spu => write!(f, "SPU"),
        }
    }
}

// ==========================================
// 规则种类 (Rule Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    MissingFeature, // 缺失畅销品
    Imbalance,      // 配货失衡
    PerformanceGap, // 销售差距
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::MissingFeature => write!(f, "MISSING_FEATURE"),
            RuleKind::Imbalance => write!(f, "IMBALANCE"),
            RuleKind::PerformanceGap => write!(f, "PERFORMANCE_GAP"),
        }
    }
}

// ==========================================
// 建议动作 (Action Type)
// ==========================================
// 校验器按动作类型选择审批规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Add,       // 新增铺货
    Increase,  // 加量
    Reduce,    // 减量
    Decrease,  // 压缩
    Rebalance, // 店间调拨
}

impl ActionType {
    /// 是否为减量类动作
    pub fn is_decrease(&self) -> bool {
        matches!(self, ActionType::Reduce | ActionType::Decrease)
    }

    /// 是否为增量类动作（含调拨）
    pub fn is_increase(&self) -> bool {
        matches!(
            self,
            ActionType::Add | ActionType::Increase | ActionType::Rebalance
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Add => write!(f, "ADD"),
            ActionType::Increase => write!(f, "INCREASE"),
            ActionType::Reduce => write!(f, "REDUCE"),
            ActionType::Decrease => write!(f, "DECREASE"),
            ActionType::Rebalance => write!(f, "REBALANCE"),
        }
    }
}

// ==========================================
// 失衡方向 / 严重度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImbalanceDirection {
    OverAllocated,  // z > 0
    UnderAllocated, // z < 0
}

impl fmt::Display for ImbalanceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImbalanceDirection::OverAllocated => write!(f, "OVER_ALLOCATED"),
            ImbalanceDirection::UnderAllocated => write!(f, "UNDER_ALLOCATED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Moderate,
    High,
    Extreme,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Moderate => write!(f, "MODERATE"),
            Severity::High => write!(f, "HIGH"),
            Severity::Extreme => write!(f, "EXTREME"),
        }
    }
}

// ==========================================
// 销售差距分档 (Performance Tier)
// ==========================================
// 有序: 声明顺序即机会从小到大
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    TopPerformer,
    PerformingWell,
    SomeOpportunity,
    GoodOpportunity,
    MajorOpportunity,
}

impl PerformanceTier {
    /// 只有三个机会档会生成候选
    pub fn is_opportunity(&self) -> bool {
        *self >= PerformanceTier::SomeOpportunity
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceTier::TopPerformer => write!(f, "top_performer"),
            PerformanceTier::PerformingWell => write!(f, "performing_well"),
            PerformanceTier::SomeOpportunity => write!(f, "some_opportunity"),
            PerformanceTier::GoodOpportunity => write!(f, "good_opportunity"),
            PerformanceTier::MajorOpportunity => write!(f, "major_opportunity"),
        }
    }
}

// ==========================================
// 分类结果 (Classification)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// 集群畅销而本店未销售
    MissingOpportunity,
    /// |z| 超阈值
    Imbalanced {
        direction: ImbalanceDirection,
        severity: Severity,
    },
    /// 失衡规则下的无机会状态
    Optimal,
    /// 销售差距分档
    Performance(PerformanceTier),
}

impl Classification {
    /// 是否构成机会（进入数量计算）
    pub fn is_opportunity(&self) -> bool {
        match self {
            Classification::MissingOpportunity => true,
            Classification::Imbalanced { .. } => true,
            Classification::Optimal => false,
            Classification::Performance(tier) => tier.is_opportunity(),
        }
    }

    /// 失衡判定的单边动作 (未配对调拨时)
    ///
    /// 欠配 → INCREASE; 超配 EXTREME → DECREASE; 其余超配 → REDUCE
    pub fn imbalance_action(&self) -> Option<ActionType> {
        match self {
            Classification::Imbalanced {
                direction: ImbalanceDirection::UnderAllocated,
                ..
            } => Some(ActionType::Increase),
            Classification::Imbalanced {
                direction: ImbalanceDirection::OverAllocated,
                severity: Severity::Extreme,
            } => Some(ActionType::Decrease),
            Classification::Imbalanced {
                direction: ImbalanceDirection::OverAllocated,
                ..
            } => Some(ActionType::Reduce),
            _ => None,
        }
    }

    /// 输出用标签
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::MissingOpportunity => write!(f, "MISSING_OPPORTUNITY"),
            Classification::Imbalanced {
                direction,
                severity,
            } => write!(f, "{}_{}", direction, severity),
            Classification::Optimal => write!(f, "OPTIMAL"),
            Classification::Performance(tier) => write!(f, "{}", tier),
        }
    }
}

// ==========================================
// 调配策略 (Redistribution Strategy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedistributionStrategy {
    IncreaseOnly, // 只加不减: 减量候选直接丢弃
    Paired,       // 同集群同商品 超配/欠配 配对调拨
}

impl fmt::Display for RedistributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedistributionStrategy::IncreaseOnly => write!(f, "increase_only"),
            RedistributionStrategy::Paired => write!(f, "paired"),
        }
    }
}

// ==========================================
// 差距单位 (Gap Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapUnit {
    Currency, // 金额差距, 需除以单价
    Units,    // 件数差距
}

// ==========================================
// 单价来源 (Price Source)
// ==========================================
// 回退链顺序即声明顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceSource {
    StoreLedgerAverage, // 门店数量台账均价
    StoreSalesDerived,  // 本店同期 金额/数量
    ClusterMedian,      // 集群已解析单价中位数
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::StoreLedgerAverage => write!(f, "STORE_LEDGER_AVERAGE"),
            PriceSource::StoreSalesDerived => write!(f, "STORE_SALES_DERIVED"),
            PriceSource::ClusterMedian => write!(f, "CLUSTER_MEDIAN"),
        }
    }
}

// ==========================================
// 毛利率来源 (Margin Source)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginSource {
    StoreFeature,      // (门店, 商品)
    StoreCategory,     // (门店, 上级品类)
    StoreMean,         // 门店均值
    ConfiguredDefault, // 配置默认值
}

impl fmt::Display for MarginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginSource::StoreFeature => write!(f, "STORE_FEATURE"),
            MarginSource::StoreCategory => write!(f, "STORE_CATEGORY"),
            MarginSource::StoreMean => write!(f, "STORE_MEAN"),
            MarginSource::ConfiguredDefault => write!(f, "CONFIGURED_DEFAULT"),
        }
    }
}
