// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use cluster_merch_advisor::domain::sales::{MarginRateEntry, QuantityLedgerEntry, SalesRecord};
use cluster_merch_advisor::domain::store::Store;
use cluster_merch_advisor::engine::BatchInputs;
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PERIOD: &str = "2025-W01";
pub const DEFAULT_CATEGORY: &str = "TOPS";

// ==========================================
// BatchInputs 构建器
// ==========================================

pub struct BatchBuilder {
    assignments: Vec<Store>,
    sales: Vec<SalesRecord>,
    ledger: Vec<QuantityLedgerEntry>,
    margins: Option<Vec<MarginRateEntry>>,
    categories: BTreeMap<String, String>,
    seasons: BTreeMap<String, String>,
    uncategorized: BTreeSet<String>,
    period_label: Option<String>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self {
            assignments: Vec::new(),
            sales: Vec::new(),
            ledger: Vec::new(),
            margins: None,
            categories: BTreeMap::new(),
            seasons: BTreeMap::new(),
            uncategorized: BTreeSet::new(),
            period_label: None,
        }
    }

    /// 一个集群及其门店
    pub fn cluster(mut self, cluster_id: &str, stores: &[&str]) -> Self {
        for store in stores {
            self.assignments.push(Store::new(*store, cluster_id));
        }
        self
    }

    /// 默认期间的销售记录
    pub fn sale(mut self, store: &str, feature: &str, amount: f64) -> Self {
        self.sales
            .push(SalesRecord::new(store, feature, DEFAULT_PERIOD, amount));
        self
    }

    pub fn sale_in_period(mut self, store: &str, feature: &str, period: &str, amount: f64) -> Self {
        self.sales.push(SalesRecord::new(store, feature, period, amount));
        self
    }

    pub fn sale_with_quantity(mut self, store: &str, feature: &str, amount: f64, quantity: f64) -> Self {
        self.sales.push(
            SalesRecord::new(store, feature, DEFAULT_PERIOD, amount).with_quantity(quantity),
        );
        self
    }

    /// 台账: 在库数量 + 单价
    pub fn stock(mut self, store: &str, feature: &str, quantity: f64, unit_price: f64) -> Self {
        self.ledger
            .push(QuantityLedgerEntry::new(store, feature, quantity, unit_price));
        self
    }

    /// 在库但期间内无销售的商品 (零金额销售行携带类别标签)
    pub fn unsold_stock(self, store: &str, feature: &str, quantity: f64, unit_price: f64) -> Self {
        self.sale(store, feature, 0.0)
            .stock(store, feature, quantity, unit_price)
    }

    pub fn feature_margin(mut self, store: &str, feature: &str, rate: f64) -> Self {
        self.margins
            .get_or_insert_with(Vec::new)
            .push(MarginRateEntry::for_feature(store, feature, rate));
        self
    }

    pub fn category_margin(mut self, store: &str, category: &str, rate: f64) -> Self {
        self.margins
            .get_or_insert_with(Vec::new)
            .push(MarginRateEntry::for_category(store, category, rate));
        self
    }

    /// 商品类别 (未指定时为 DEFAULT_CATEGORY)
    pub fn category(mut self, feature: &str, category: &str) -> Self {
        self.categories
            .insert(feature.to_string(), category.to_string());
        self
    }

    pub fn season(mut self, feature: &str, season: &str) -> Self {
        self.seasons.insert(feature.to_string(), season.to_string());
        self
    }

    /// 该商品的销售记录不带类别标签
    pub fn without_category(mut self, feature: &str) -> Self {
        self.uncategorized.insert(feature.to_string());
        self
    }

    pub fn period(mut self, period_label: &str) -> Self {
        self.period_label = Some(period_label.to_string());
        self
    }

    pub fn build(self) -> BatchInputs {
        let categories = self.categories;
        let seasons = self.seasons;
        let uncategorized = self.uncategorized;

        let sales = self
            .sales
            .into_iter()
            .map(|mut record| {
                if !uncategorized.contains(&record.feature_key) {
                    let category = categories
                        .get(&record.feature_key)
                        .map(|c| c.as_str())
                        .unwrap_or(DEFAULT_CATEGORY);
                    record.attributes.category = Some(category.to_string());
                }
                record.attributes.season = seasons.get(&record.feature_key).cloned();
                record
            })
            .collect();

        BatchInputs {
            assignments: self.assignments,
            sales,
            ledger: self.ledger,
            margins: self.margins,
            period_label: self.period_label,
        }
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 常用场景
// ==========================================

pub fn store_codes(prefix: &str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
}

pub fn as_refs(codes: &[String]) -> Vec<&str> {
    codes.iter().map(|s| s.as_str()).collect()
}

/// 5 店集群, 商品 F 在 S1..S4 各销售 500 (铺货率 0.8, 总额 2000)
///
/// 每店另有一个在库未售商品 X, 使品类售罄率为 50%
pub fn missing_feature_scenario() -> BatchBuilder {
    let stores = store_codes("S", 5);
    let mut builder = BatchBuilder::new().cluster("C1", &as_refs(&stores));
    for store in &stores[..4] {
        builder = builder
            .sale(store, "F", 500.0)
            .stock(store, "F", 10.0, 50.0)
            .unsold_stock(store, "X", 10.0, 40.0);
    }
    builder
}
