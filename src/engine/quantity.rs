// ==========================================
// 门店集群商品建议系统 - 数量建议引擎
// ==========================================
// 职责: 判定 → 整数调整数量 + 单价/毛利/投资额
// 规则: raw = 差距 ÷ 单价 (金额差距) 或 差距本身 (件数差距)
//       |raw| clamp 到 [min_quantity_change, 上限] 后四舍五入, 符号不变
//       加量上限 = min(max_quantity_change, 当前在库 × max_change_pct), 无在库时为 max_quantity_change
//       减量上限 = min(max_quantity_change, 当前在库 × max_change_pct, 当前在库), 向下取整
//       减量上限不足 1 件 → 跳过 (NO_STOCK_TO_REDUCE)
// 红线: investment = |qty| × unit_price × (1 − margin_rate)
//       increase_only 模式下减量候选丢弃 (不是置 0)
// ==========================================

use crate::config::EngineConfig;
use crate::domain::diagnostics::SkipReason;
use crate::domain::types::{GapUnit, RedistributionStrategy};
use crate::engine::classifier::Verdict;
use crate::engine::inputs::FeatureCatalog;
use crate::engine::margin_resolver::{MarginResolver, ResolvedMargin};
use crate::engine::price_resolver::{PriceResolver, ResolvedPrice};
use serde::Serialize;

/// 单候选的数量方案
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityPlan {
    pub quantity: i64,
    /// clamp 与取整前的原始数量
    pub raw_quantity: f64,
    pub price: ResolvedPrice,
    pub margin: ResolvedMargin,
    pub category: String,
    pub unit_cost: f64,
    pub investment_required: f64,
    pub retail_value: f64,
}

impl QuantityPlan {
    /// 改写数量并重算金额 (单价与毛利不变)
    pub fn with_quantity(&self, quantity: i64) -> Self {
        let units = quantity.unsigned_abs() as f64;
        Self {
            quantity,
            investment_required: units * self.unit_cost,
            retail_value: units * self.price.value,
            ..self.clone()
        }
    }
}

pub struct QuantityRecommender<'a> {
    config: &'a EngineConfig,
    prices: &'a PriceResolver,
    margins: &'a MarginResolver,
    catalog: &'a FeatureCatalog,
}

impl<'a> QuantityRecommender<'a> {
    pub fn new(
        config: &'a EngineConfig,
        prices: &'a PriceResolver,
        margins: &'a MarginResolver,
        catalog: &'a FeatureCatalog,
    ) -> Self {
        Self {
            config,
            prices,
            margins,
            catalog,
        }
    }

    /// 为单个判定生成数量方案; 失败时返回跳过原因
    pub fn recommend(&self, verdict: &Verdict) -> Result<QuantityPlan, SkipReason> {
        // 1. 只加不减: 减量候选直接丢弃
        if verdict.metric_gap < 0.0
            && self.config.redistribution_strategy == RedistributionStrategy::IncreaseOnly
        {
            return Err(SkipReason::DecreaseSuppressed);
        }

        // 2. 单价回退链
        let price = self
            .prices
            .resolve(&verdict.store_code, &verdict.cluster_id, &verdict.feature_key)
            .map_err(|unresolved| SkipReason::PriceUnresolved {
                attempted: unresolved.attempted,
            })?;

        // 3. 类别标签
        let category = self
            .catalog
            .category(&verdict.feature_key)
            .ok_or(SkipReason::MissingCategory)?
            .to_string();

        // 4. 数量
        let raw_quantity = match verdict.gap_unit {
            GapUnit::Currency => verdict.metric_gap / price.value,
            GapUnit::Units => verdict.metric_gap,
        };
        if raw_quantity < 0.0 && self.decrease_cap(verdict.current_quantity) < 1.0 {
            return Err(SkipReason::NoStockToReduce {
                current_quantity: verdict.current_quantity,
            });
        }
        let quantity = self.round_quantity(raw_quantity, verdict.current_quantity);
        if quantity == 0 {
            return Err(SkipReason::ZeroQuantity { raw_quantity });
        }

        // 5. 毛利与金额
        let margin = self
            .margins
            .resolve(&verdict.store_code, &verdict.feature_key, Some(&category));
        let unit_cost = price.value * (1.0 - margin.value);
        let units = quantity.unsigned_abs() as f64;

        Ok(QuantityPlan {
            quantity,
            raw_quantity,
            price,
            margin,
            category,
            unit_cost,
            investment_required: units * unit_cost,
            retail_value: units * price.value,
        })
    }

    /// clamp 幅度后取整, 符号保持; 原始值为 0 或非有限时返回 0
    pub fn round_quantity(&self, raw_quantity: f64, current_quantity: f64) -> i64 {
        if !raw_quantity.is_finite() || raw_quantity == 0.0 {
            return 0;
        }
        let lower = self.config.min_quantity_change;
        if raw_quantity < 0.0 {
            let cap = self.decrease_cap(current_quantity);
            let magnitude = raw_quantity.abs().clamp(lower.min(cap), cap).round().min(cap);
            return -(magnitude as i64);
        }
        let upper = if current_quantity > 0.0 {
            self.config
                .max_quantity_change
                .min(current_quantity * self.config.max_change_pct)
        } else {
            self.config.max_quantity_change
        }
        .max(lower);

        raw_quantity.clamp(lower, upper).round() as i64
    }

    /// 可减少的整件数上限 (不超过当前在库)
    fn decrease_cap(&self, current_quantity: f64) -> f64 {
        if current_quantity.is_nan() || current_quantity <= 0.0 {
            return 0.0;
        }
        self.config
            .max_quantity_change
            .min(current_quantity * self.config.max_change_pct)
            .min(current_quantity)
            .floor()
    }
}
