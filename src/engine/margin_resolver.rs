// ==========================================
// 门店集群商品建议系统 - 毛利率解析 (有序回退链)
// ==========================================
// 顺序: (门店, 商品) → (门店, 上级品类) → 门店均值 → 配置默认值
// 约束: 结果 clamp 到 [0, 0.95]
// ==========================================

use crate::config::MAX_MARGIN_RATE;
use crate::domain::sales::{MarginRateEntry, MarginScope};
use crate::domain::types::MarginSource;
use serde::Serialize;
use std::collections::BTreeMap;

/// 已解析毛利率
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedMargin {
    pub source: MarginSource,
    pub value: f64,
}

pub struct MarginResolver {
    by_feature: BTreeMap<(String, String), f64>,
    by_category: BTreeMap<(String, String), f64>,
    store_mean: BTreeMap<String, f64>,
    default_rate: f64,
}

impl MarginResolver {
    /// 构建解析器; 非有限值的行被忽略, 同键多行取均值
    pub fn build(entries: Option<&[MarginRateEntry]>, default_rate: f64) -> Self {
        let mut feature_acc: BTreeMap<(String, String), (f64, usize)> = BTreeMap::new();
        let mut category_acc: BTreeMap<(String, String), (f64, usize)> = BTreeMap::new();
        let mut store_acc: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        for entry in entries.unwrap_or(&[]) {
            if !entry.margin_rate.is_finite() {
                continue;
            }
            let acc = match &entry.scope {
                MarginScope::Feature(key) => feature_acc
                    .entry((entry.store_code.clone(), key.clone()))
                    .or_insert((0.0, 0)),
                MarginScope::Category(key) => category_acc
                    .entry((entry.store_code.clone(), key.clone()))
                    .or_insert((0.0, 0)),
            };
            acc.0 += entry.margin_rate;
            acc.1 += 1;

            let store = store_acc.entry(entry.store_code.clone()).or_insert((0.0, 0));
            store.0 += entry.margin_rate;
            store.1 += 1;
        }

        Self {
            by_feature: average(feature_acc),
            by_category: average(category_acc),
            store_mean: average(store_acc),
            default_rate,
        }
    }

    pub fn resolve(
        &self,
        store_code: &str,
        feature_key: &str,
        category: Option<&str>,
    ) -> ResolvedMargin {
        let (source, raw) = if let Some(v) = self
            .by_feature
            .get(&(store_code.to_string(), feature_key.to_string()))
        {
            (MarginSource::StoreFeature, *v)
        } else if let Some(v) = category.and_then(|c| {
            self.by_category
                .get(&(store_code.to_string(), c.to_string()))
        }) {
            (MarginSource::StoreCategory, *v)
        } else if let Some(v) = self.store_mean.get(store_code) {
            (MarginSource::StoreMean, *v)
        } else {
            (MarginSource::ConfiguredDefault, self.default_rate)
        };

        ResolvedMargin {
            source,
            value: raw.clamp(0.0, MAX_MARGIN_RATE),
        }
    }
}

fn average<K: Ord>(acc: BTreeMap<K, (f64, usize)>) -> BTreeMap<K, f64> {
    acc.into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect()
}
