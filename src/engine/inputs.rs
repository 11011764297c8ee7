// ==========================================
// 门店集群商品建议系统 - 批次输入索引
// ==========================================
// 职责: 把外部协作方提供的原始行整理为有序、类型化的只读索引
// 红线: 全部使用 BTreeMap, 不依赖哈希迭代顺序
// ==========================================

use crate::domain::sales::{FeatureAttributes, MarginRateEntry, QuantityLedgerEntry, SalesRecord};
use crate::domain::store::Store;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// (门店, 商品) 复合键
pub type StoreFeatureKey = (String, String);

// ==========================================
// BatchInputs - 一次批处理的原始输入
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct BatchInputs {
    pub assignments: Vec<Store>,
    pub sales: Vec<SalesRecord>,
    pub ledger: Vec<QuantityLedgerEntry>,
    /// 可选: 未提供时毛利率走配置默认值
    pub margins: Option<Vec<MarginRateEntry>>,
    /// 目标期间; None 表示使用全部销售记录
    pub period_label: Option<String>,
}

// ==========================================
// ClusterIndex - 集群分配索引
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    store_to_cluster: BTreeMap<String, String>,
    members: BTreeMap<String, Vec<String>>,
}

impl ClusterIndex {
    /// 构建集群索引
    ///
    /// - 分配表为空 → DataUnavailable
    /// - 同一门店分配到不同集群 → InconsistentInput
    /// - 完全重复的行被合并
    pub fn build(assignments: &[Store]) -> EngineResult<Self> {
        if assignments.is_empty() {
            return Err(EngineError::data_unavailable(
                "cluster_assignment",
                "集群分配表为空",
            ));
        }

        let mut store_to_cluster: BTreeMap<String, String> = BTreeMap::new();
        for store in assignments {
            let code = store.store_code.trim();
            if code.is_empty() {
                return Err(EngineError::InconsistentInput(
                    "集群分配表存在空门店编码".to_string(),
                ));
            }
            match store_to_cluster.get(code) {
                Some(existing) if existing != &store.cluster_id => {
                    return Err(EngineError::InconsistentInput(format!(
                        "门店 {} 同时属于集群 {} 与 {}",
                        code, existing, store.cluster_id
                    )));
                }
                Some(_) => continue,
                None => {
                    store_to_cluster.insert(code.to_string(), store.cluster_id.clone());
                }
            }
        }

        let mut members: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (store, cluster) in &store_to_cluster {
            members.entry(cluster.clone()).or_default().push(store.clone());
        }

        debug!(
            stores = store_to_cluster.len(),
            clusters = members.len(),
            "集群索引构建完成"
        );

        Ok(Self {
            store_to_cluster,
            members,
        })
    }

    pub fn cluster_of(&self, store_code: &str) -> Option<&str> {
        self.store_to_cluster.get(store_code).map(|s| s.as_str())
    }

    /// 集群成员（按门店编码升序）
    pub fn members(&self, cluster_id: &str) -> &[String] {
        self.members
            .get(cluster_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn cluster_size(&self, cluster_id: &str) -> usize {
        self.members(cluster_id).len()
    }

    /// (门店, 集群) 按门店升序
    pub fn stores(&self) -> impl Iterator<Item = (&str, &str)> {
        self.store_to_cluster
            .iter()
            .map(|(s, c)| (s.as_str(), c.as_str()))
    }
}

// ==========================================
// MetricTable - 目标期间 (门店, 商品) 度量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StoreFeatureMetric {
    pub sales_amount: f64,
    /// 仅在至少一行带数量时存在
    pub quantity: Option<f64>,
}

impl StoreFeatureMetric {
    pub fn is_selling(&self) -> bool {
        self.sales_amount > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricTable {
    values: BTreeMap<StoreFeatureKey, StoreFeatureMetric>,
    ignored_rows: usize,
}

impl MetricTable {
    /// 汇总目标期间的销售记录
    ///
    /// - 不在集群分配表中的门店行被忽略并计数
    /// - 非有限金额的行被忽略并计数
    /// - 过滤后为空 → DataUnavailable
    pub fn build(
        sales: &[SalesRecord],
        clusters: &ClusterIndex,
        period_label: Option<&str>,
    ) -> EngineResult<Self> {
        if sales.is_empty() {
            return Err(EngineError::data_unavailable("sales", "销售记录为空"));
        }

        let mut values: BTreeMap<StoreFeatureKey, StoreFeatureMetric> = BTreeMap::new();
        let mut ignored_rows = 0usize;
        let mut in_period = 0usize;

        for record in sales {
            if let Some(period) = period_label {
                if record.period_label != period {
                    continue;
                }
            }
            in_period += 1;

            if clusters.cluster_of(&record.store_code).is_none()
                || !record.sales_amount.is_finite()
            {
                ignored_rows += 1;
                continue;
            }

            let entry = values
                .entry((record.store_code.clone(), record.feature_key.clone()))
                .or_default();
            entry.sales_amount += record.sales_amount;
            if let Some(q) = record.quantity.filter(|q| q.is_finite()) {
                entry.quantity = Some(entry.quantity.unwrap_or(0.0) + q);
            }
        }

        if values.is_empty() {
            return Err(EngineError::data_unavailable(
                "sales",
                format!(
                    "期间 {} 无可用销售记录 (期间内 {} 行, 忽略 {} 行)",
                    period_label.unwrap_or("ALL"),
                    in_period,
                    ignored_rows
                ),
            ));
        }

        if ignored_rows > 0 {
            warn!(ignored_rows, "部分销售记录不在集群分配表中或金额无效, 已忽略");
        }

        Ok(Self {
            values,
            ignored_rows,
        })
    }

    pub fn get(&self, store_code: &str, feature_key: &str) -> Option<&StoreFeatureMetric> {
        self.values
            .get(&(store_code.to_string(), feature_key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StoreFeatureKey, &StoreFeatureMetric)> {
        self.values.iter()
    }

    pub fn ignored_rows(&self) -> usize {
        self.ignored_rows
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ==========================================
// LedgerIndex - 数量台账索引
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerPosition {
    pub quantity: f64,
    /// Σ quantity × unit_price（仅单价有效的行）
    pub priced_value: f64,
    pub priced_quantity: f64,
    pub price_sum: f64,
    pub priced_rows: usize,
}

impl LedgerPosition {
    /// 门店台账均价: 有数量时按数量加权, 否则取简单均值
    pub fn average_price(&self) -> Option<f64> {
        if self.priced_rows == 0 {
            return None;
        }
        let price = if self.priced_quantity > 0.0 {
            self.priced_value / self.priced_quantity
        } else {
            self.price_sum / self.priced_rows as f64
        };
        if price.is_finite() && price > 0.0 {
            Some(price)
        } else {
            None
        }
    }

    pub fn in_stock(&self) -> bool {
        self.quantity > 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerIndex {
    positions: BTreeMap<StoreFeatureKey, LedgerPosition>,
}

impl LedgerIndex {
    pub fn build(entries: &[QuantityLedgerEntry]) -> Self {
        let mut positions: BTreeMap<StoreFeatureKey, LedgerPosition> = BTreeMap::new();
        for entry in entries {
            let pos = positions
                .entry((entry.store_code.clone(), entry.feature_key.clone()))
                .or_default();
            if entry.quantity.is_finite() {
                pos.quantity += entry.quantity;
            }
            if entry.unit_price.is_finite() && entry.unit_price > 0.0 {
                pos.priced_rows += 1;
                pos.price_sum += entry.unit_price;
                if entry.quantity.is_finite() && entry.quantity > 0.0 {
                    pos.priced_quantity += entry.quantity;
                    pos.priced_value += entry.quantity * entry.unit_price;
                }
            }
        }
        Self { positions }
    }

    pub fn get(&self, store_code: &str, feature_key: &str) -> Option<&LedgerPosition> {
        self.positions
            .get(&(store_code.to_string(), feature_key.to_string()))
    }

    /// 当前在库数量（无台账为 0）
    pub fn quantity(&self, store_code: &str, feature_key: &str) -> f64 {
        self.get(store_code, feature_key)
            .map(|p| p.quantity.max(0.0))
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StoreFeatureKey, &LedgerPosition)> {
        self.positions.iter()
    }
}

// ==========================================
// FeatureCatalog - 商品属性目录
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    attributes: BTreeMap<String, FeatureAttributes>,
}

impl FeatureCatalog {
    /// 从销售记录构建属性目录
    ///
    /// 按 (门店, 期间, 商品) 排序后逐字段取第一个非空值, 与输入行顺序无关
    pub fn build(sales: &[SalesRecord]) -> Self {
        let mut ordered: Vec<&SalesRecord> = sales.iter().collect();
        ordered.sort_by(|a, b| {
            (&a.store_code, &a.period_label, &a.feature_key).cmp(&(
                &b.store_code,
                &b.period_label,
                &b.feature_key,
            ))
        });

        let mut attributes: BTreeMap<String, FeatureAttributes> = BTreeMap::new();
        for record in ordered {
            let entry = attributes.entry(record.feature_key.clone()).or_default();
            merge_field(&mut entry.category, &record.attributes.category);
            merge_field(&mut entry.subcategory, &record.attributes.subcategory);
            merge_field(&mut entry.season, &record.attributes.season);
            merge_field(&mut entry.gender, &record.attributes.gender);
            merge_field(&mut entry.display_location, &record.attributes.display_location);
            merge_field(&mut entry.class, &record.attributes.class);
        }
        Self { attributes }
    }

    pub fn get(&self, feature_key: &str) -> Option<&FeatureAttributes> {
        self.attributes.get(feature_key)
    }

    /// 上级品类标签
    pub fn category(&self, feature_key: &str) -> Option<&str> {
        self.get(feature_key).and_then(|a| a.category.as_deref())
    }

    pub fn season(&self, feature_key: &str) -> Option<&str> {
        self.get(feature_key).and_then(|a| a.season.as_deref())
    }
}

fn merge_field(target: &mut Option<String>, candidate: &Option<String>) {
    if target.is_some() {
        return;
    }
    if let Some(value) = candidate {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            *target = Some(trimmed.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> Vec<Store> {
        vec![
            Store::new("S2", "C1"),
            Store::new("S1", "C1"),
            Store::new("S3", "C2"),
        ]
    }

    #[test]
    fn test_cluster_index_orders_members() {
        let index = ClusterIndex::build(&stores()).unwrap();
        assert_eq!(index.members("C1"), &["S1".to_string(), "S2".to_string()]);
        assert_eq!(index.cluster_size("C2"), 1);
        assert_eq!(index.cluster_of("S3"), Some("C2"));
        assert_eq!(index.cluster_size("UNKNOWN"), 0);
    }

    #[test]
    fn test_cluster_index_rejects_conflicting_assignment() {
        let mut assignments = stores();
        assignments.push(Store::new("S1", "C2"));
        let err = ClusterIndex::build(&assignments).unwrap_err();
        assert!(matches!(err, EngineError::InconsistentInput(_)));
    }

    #[test]
    fn test_empty_assignment_is_data_unavailable() {
        let err = ClusterIndex::build(&[]).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_metric_table_filters_period_and_unknown_stores() {
        let index = ClusterIndex::build(&stores()).unwrap();
        let sales = vec![
            SalesRecord::new("S1", "F1", "2025Q1", 100.0).with_quantity(4.0),
            SalesRecord::new("S1", "F1", "2025Q1", 50.0).with_quantity(1.0),
            SalesRecord::new("S1", "F1", "2024Q4", 999.0),
            SalesRecord::new("S9", "F1", "2025Q1", 10.0),
        ];
        let table = MetricTable::build(&sales, &index, Some("2025Q1")).unwrap();
        let metric = table.get("S1", "F1").unwrap();
        assert_eq!(metric.sales_amount, 150.0);
        assert_eq!(metric.quantity, Some(5.0));
        assert_eq!(table.ignored_rows(), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_metric_table_empty_period_is_data_unavailable() {
        let index = ClusterIndex::build(&stores()).unwrap();
        let sales = vec![SalesRecord::new("S1", "F1", "2025Q1", 100.0)];
        let err = MetricTable::build(&sales, &index, Some("2030Q1")).unwrap_err();
        assert!(err.is_data_unavailable());
    }

    #[test]
    fn test_ledger_average_price_weighted_by_quantity() {
        let ledger = LedgerIndex::build(&[
            QuantityLedgerEntry::new("S1", "F1", 1.0, 10.0),
            QuantityLedgerEntry::new("S1", "F1", 3.0, 20.0),
        ]);
        let pos = ledger.get("S1", "F1").unwrap();
        assert!((pos.average_price().unwrap() - 17.5).abs() < 1e-9);
        assert_eq!(ledger.quantity("S1", "F1"), 4.0);
        assert_eq!(ledger.quantity("S2", "F1"), 0.0);
    }

    #[test]
    fn test_ledger_rejects_non_positive_price() {
        let ledger = LedgerIndex::build(&[QuantityLedgerEntry::new("S1", "F1", 2.0, 0.0)]);
        assert_eq!(ledger.get("S1", "F1").unwrap().average_price(), None);
    }

    #[test]
    fn test_feature_catalog_first_non_empty_wins() {
        let sales = vec![
            SalesRecord::new("S2", "F1", "P", 1.0).with_category("TOPS"),
            SalesRecord::new("S1", "F1", "P", 1.0).with_category("  "),
            SalesRecord::new("S3", "F1", "P", 1.0).with_category("BOTTOMS"),
        ];
        let catalog = FeatureCatalog::build(&sales);
        assert_eq!(catalog.category("F1"), Some("TOPS"));
        assert_eq!(catalog.category("F2"), None);
    }
}
