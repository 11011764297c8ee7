// ==========================================
// 门店集群商品建议系统 - 规则配置覆写
// ==========================================
// 职责: JSON 局部覆写 → EngineConfig
// 红线: 覆写后重新校验, 越界即配置错误
// ==========================================

use crate::config::engine_config::{EngineConfig, ImbalanceMetric};
use crate::domain::types::RedistributionStrategy;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 规则配置覆写（持久化对象）
///
/// 只携带需要覆写的字段, 其余沿用 EngineConfig 默认值
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleProfile {
    /// 配置 ID（用于选择/引用）
    #[serde(default)]
    pub profile_id: Option<String>,

    /// 说明（可选）
    #[serde(default)]
    pub description: Option<String>,

    /// 阈值覆写
    #[serde(default)]
    pub parameters: RuleProfileParameters,
}

/// 阈值覆写项（全部可选）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleProfileParameters {
    #[serde(default)]
    pub min_cluster_size: Option<usize>,

    /// 集群铺货率阈值（0~1）
    #[serde(default)]
    pub adoption_threshold: Option<f64>,

    /// 集群总销售额阈值
    #[serde(default)]
    pub volume_threshold: Option<f64>,

    /// 失衡 |z| 阈值
    #[serde(default)]
    pub z_score_threshold: Option<f64>,

    #[serde(default)]
    pub imbalance_metric: Option<ImbalanceMetric>,

    #[serde(default)]
    pub min_quantity_change: Option<f64>,

    #[serde(default)]
    pub max_quantity_change: Option<f64>,

    /// 相对当前数量的最大变动比例
    #[serde(default)]
    pub max_change_pct: Option<f64>,

    #[serde(default)]
    pub redistribution_strategy: Option<RedistributionStrategy>,

    #[serde(default)]
    pub default_margin_rate: Option<f64>,

    #[serde(default)]
    pub min_comparables: Option<usize>,

    /// 启用 ROI 门控
    #[serde(default)]
    pub roi_enabled: Option<bool>,

    #[serde(default)]
    pub roi_min_threshold: Option<f64>,

    #[serde(default)]
    pub min_margin_uplift: Option<f64>,

    /// 售罄率审批区间（百分比）
    #[serde(default)]
    pub sell_through_min_threshold: Option<f64>,

    #[serde(default)]
    pub sell_through_max_threshold: Option<f64>,

    /// 季节 → 调整系数（与默认表合并）
    #[serde(default)]
    pub seasonal_factors: Option<BTreeMap<String, f64>>,

    /// 单店建议上限
    #[serde(default)]
    pub max_opportunities_per_store: Option<usize>,
}

impl RuleProfile {
    /// 从 JSON 文本解析
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| EngineError::configuration("rule_profile", format!("JSON 解析失败: {}", e)))
    }
}

impl EngineConfig {
    /// 应用覆写并重新校验
    ///
    /// z_score_threshold 覆写时, 严重度切点同步上移以保持单调
    pub fn with_profile(mut self, profile: &RuleProfile) -> EngineResult<Self> {
        let p = &profile.parameters;

        if let Some(v) = p.min_cluster_size {
            self.min_cluster_size = v;
        }
        if let Some(v) = p.adoption_threshold {
            self.adoption_threshold = v;
        }
        if let Some(v) = p.volume_threshold {
            self.volume_threshold = v;
        }
        if let Some(v) = p.z_score_threshold {
            let shift = v - self.imbalance.z_score_threshold;
            self.imbalance.z_score_threshold = v;
            self.imbalance.high_cut += shift;
            self.imbalance.extreme_cut += shift;
        }
        if let Some(v) = p.imbalance_metric {
            self.imbalance_metric = v;
        }
        if let Some(v) = p.min_quantity_change {
            self.min_quantity_change = v;
        }
        if let Some(v) = p.max_quantity_change {
            self.max_quantity_change = v;
        }
        if let Some(v) = p.max_change_pct {
            self.max_change_pct = v;
        }
        if let Some(v) = p.redistribution_strategy {
            self.redistribution_strategy = v;
        }
        if let Some(v) = p.default_margin_rate {
            self.default_margin_rate = v;
        }
        if let Some(v) = p.min_comparables {
            self.min_comparables = v;
        }
        if let Some(v) = p.roi_enabled {
            self.roi.enabled = v;
        }
        if let Some(v) = p.roi_min_threshold {
            self.roi.roi_min_threshold = v;
        }
        if let Some(v) = p.min_margin_uplift {
            self.roi.min_margin_uplift = v;
        }
        if let Some(v) = p.sell_through_min_threshold {
            self.sell_through.min_threshold = v;
        }
        if let Some(v) = p.sell_through_max_threshold {
            self.sell_through.max_threshold = v;
        }
        if let Some(factors) = &p.seasonal_factors {
            for (season, factor) in factors {
                self.sell_through
                    .seasonal_factors
                    .insert(season.clone(), *factor);
            }
        }
        if p.max_opportunities_per_store.is_some() {
            self.max_opportunities_per_store = p.max_opportunities_per_store;
        }

        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_overrides_selected_fields() {
        let raw = r#"{
            "profile_id": "spring",
            "parameters": {
                "adoption_threshold": 0.6,
                "redistribution_strategy": "paired",
                "roi_enabled": true,
                "seasonal_factors": {"SPRING": 1.1}
            }
        }"#;
        let profile = RuleProfile::from_json(raw).unwrap();
        let config = EngineConfig::default().with_profile(&profile).unwrap();

        assert_eq!(config.adoption_threshold, 0.6);
        assert_eq!(config.redistribution_strategy, RedistributionStrategy::Paired);
        assert!(config.roi.enabled);
        assert_eq!(config.sell_through.seasonal_factor(Some("SPRING")), 1.1);
        // 未覆写字段保持默认
        assert_eq!(config.volume_threshold, 1500.0);
    }

    #[test]
    fn test_profile_z_threshold_shifts_severity_cuts() {
        let mut profile = RuleProfile::default();
        profile.parameters.z_score_threshold = Some(2.5);
        let config = EngineConfig::default().with_profile(&profile).unwrap();
        assert_eq!(config.imbalance.z_score_threshold, 2.5);
        assert!(config.imbalance.high_cut >= 2.5);
        assert!(config.imbalance.extreme_cut >= config.imbalance.high_cut);
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let mut profile = RuleProfile::default();
        profile.parameters.adoption_threshold = Some(1.5);
        let err = EngineConfig::default().with_profile(&profile).unwrap_err();
        assert!(err.is_configuration());

        assert!(RuleProfile::from_json("{not json").is_err());
    }
}
