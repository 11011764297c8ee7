// ==========================================
// 门店集群商品建议系统 - 配置层
// ==========================================
// 职责: 不可变配置值对象 + JSON 覆写
// 红线: 所有组件通过构造参数显式接收配置
// ==========================================

pub mod engine_config;
pub mod rule_profile;

// 重导出核心配置
pub use engine_config::{
    EngineConfig, ImbalanceMetric, ImbalanceThresholds, PerformanceTierCuts, RoiGateConfig,
    SellThroughParams, MAX_MARGIN_RATE,
};
pub use rule_profile::{RuleProfile, RuleProfileParameters};
