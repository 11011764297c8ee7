// ==========================================
// 门店集群商品建议系统 - ROI 门控 (可选)
// ==========================================
// 开关: RoiGateConfig.enabled
// 公式: margin_uplift = (unit_price − unit_cost) × 预期件数
//       roi           = margin_uplift / (预期件数 × unit_cost)
// 拒绝: roi < roi_min_threshold
//       或 margin_uplift < min_margin_uplift
//       或 同组样本数 < min_comparables
// 范围: 只评估正数量 (需要投入) 的候选, 减量候选不占用资金
// ==========================================

use crate::config::RoiGateConfig;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiVerdict {
    pub approved: bool,
    pub roi: f64,
    pub margin_uplift: f64,
    pub rationale: String,
}

pub struct RoiGate<'a> {
    config: &'a RoiGateConfig,
    min_comparables: usize,
}

impl<'a> RoiGate<'a> {
    pub fn new(config: &'a RoiGateConfig, min_comparables: usize) -> Self {
        Self {
            config,
            min_comparables,
        }
    }

    /// 评估单个候选; 未启用或数量 ≤ 0 时返回 None
    pub fn evaluate(
        &self,
        unit_price: f64,
        unit_cost: f64,
        quantity: i64,
        peer_count: usize,
    ) -> Option<RoiVerdict> {
        if !self.config.enabled || quantity <= 0 {
            return None;
        }

        let units = quantity as f64;
        let margin_uplift = (unit_price - unit_cost) * units;
        let invested = units * unit_cost;
        let roi = if invested > 0.0 {
            margin_uplift / invested
        } else {
            0.0
        };

        let mut failures = Vec::new();
        if roi < self.config.roi_min_threshold {
            failures.push("roi_below_threshold");
        }
        if margin_uplift < self.config.min_margin_uplift {
            failures.push("margin_uplift_below_minimum");
        }
        if peer_count < self.min_comparables {
            failures.push("insufficient_comparables");
        }
        let approved = failures.is_empty();

        let rationale = json!({
            "stage": "roi",
            "roi": roi,
            "roi_min_threshold": self.config.roi_min_threshold,
            "margin_uplift": margin_uplift,
            "min_margin_uplift": self.config.min_margin_uplift,
            "peer_count": peer_count,
            "min_comparables": self.min_comparables,
            "failures": failures,
            "approved": approved,
        })
        .to_string();

        Some(RoiVerdict {
            approved,
            roi,
            margin_uplift,
            rationale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> RoiGateConfig {
        RoiGateConfig {
            enabled: true,
            ..RoiGateConfig::default()
        }
    }

    #[test]
    fn test_disabled_gate_is_skipped() {
        let config = RoiGateConfig::default();
        let gate = RoiGate::new(&config, 5);
        assert!(gate.evaluate(100.0, 55.0, 10, 10).is_none());
    }

    #[test]
    fn test_roi_and_uplift() {
        let config = enabled();
        let gate = RoiGate::new(&config, 5);
        // 单价 100, 成本 55, 10 件: 毛利增量 450, roi = 450 / 550
        let verdict = gate.evaluate(100.0, 55.0, 10, 10).unwrap();
        assert!((verdict.margin_uplift - 450.0).abs() < 1e-9);
        assert!((verdict.roi - 450.0 / 550.0).abs() < 1e-9);
        assert!(verdict.approved);
    }

    #[test]
    fn test_rejections() {
        let config = enabled();
        let gate = RoiGate::new(&config, 5);
        // 低毛利增量
        assert!(!gate.evaluate(100.0, 55.0, 2, 10).unwrap().approved);
        // 低 ROI: 毛利率 10%
        assert!(!gate.evaluate(100.0, 90.0, 20, 10).unwrap().approved);
        // 样本不足
        let verdict = gate.evaluate(100.0, 55.0, 10, 4).unwrap();
        assert!(!verdict.approved);
        assert!(verdict.rationale.contains("insufficient_comparables"));
    }

    #[test]
    fn test_decrease_not_evaluated() {
        let config = enabled();
        let gate = RoiGate::new(&config, 5);
        assert!(gate.evaluate(100.0, 55.0, -10, 10).is_none());
    }
}
