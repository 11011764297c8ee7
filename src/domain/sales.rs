// ==========================================
// 门店集群商品建议系统 - 销售/台账/毛利输入
// ==========================================
// 职责: 外部协作方提供的只读输入记录
// 红线: 输入记录不可变, 不含引擎逻辑
// ==========================================

use serde::{Deserialize, Serialize};

/// 商品维度属性（类别/季节/性别/陈列位置/品类级别）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureAttributes {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub display_location: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

/// 销售记录
///
/// feature_key 为子类别名称或 SPU 编码，取决于本批次粒度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub store_code: String,
    pub feature_key: String,
    pub period_label: String,
    pub sales_amount: f64,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub attributes: FeatureAttributes,
}

impl SalesRecord {
    pub fn new(
        store_code: impl Into<String>,
        feature_key: impl Into<String>,
        period_label: impl Into<String>,
        sales_amount: f64,
    ) -> Self {
        Self {
            store_code: store_code.into(),
            feature_key: feature_key.into(),
            period_label: period_label.into(),
            sales_amount,
            quantity: None,
            attributes: FeatureAttributes::default(),
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.attributes.category = Some(category.into());
        self
    }

    pub fn with_attributes(mut self, attributes: FeatureAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// 数量台账（门店在库数量 + 单价）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityLedgerEntry {
    pub store_code: String,
    pub feature_key: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl QuantityLedgerEntry {
    pub fn new(
        store_code: impl Into<String>,
        feature_key: impl Into<String>,
        quantity: f64,
        unit_price: f64,
    ) -> Self {
        Self {
            store_code: store_code.into(),
            feature_key: feature_key.into(),
            quantity,
            unit_price,
        }
    }
}

/// 毛利率适用范围: 单个商品 或 上级品类
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginScope {
    Feature(String),
    Category(String),
}

/// 毛利率表的一行（可选输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginRateEntry {
    pub store_code: String,
    pub scope: MarginScope,
    pub margin_rate: f64,
}

impl MarginRateEntry {
    pub fn for_feature(store_code: impl Into<String>, feature_key: impl Into<String>, margin_rate: f64) -> Self {
        Self {
            store_code: store_code.into(),
            scope: MarginScope::Feature(feature_key.into()),
            margin_rate,
        }
    }

    pub fn for_category(store_code: impl Into<String>, category: impl Into<String>, margin_rate: f64) -> Self {
        Self {
            store_code: store_code.into(),
            scope: MarginScope::Category(category.into()),
            margin_rate,
        }
    }
}
