// ==========================================
// 门店集群商品建议系统 - 门店与集群分配
// ==========================================
// 来源: 外部聚类步骤 (本系统只读)
// 约束: 一店一集群
// ==========================================

use serde::{Deserialize, Serialize};

/// 门店（集群分配表的一行）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub store_code: String,
    pub cluster_id: String,
}

impl Store {
    pub fn new(store_code: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            store_code: store_code.into(),
            cluster_id: cluster_id.into(),
        }
    }
}
