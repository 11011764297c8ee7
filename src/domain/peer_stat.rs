// ==========================================
// 门店集群商品建议系统 - 同组统计实体
// ==========================================
// 约束: 仅当 count ≥ min_cluster_size 时存在
// 约束: std = 0 时 z-score 定义为 0
// ==========================================

use serde::{Deserialize, Serialize};

/// (集群, 商品) 同组统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerGroupStat {
    pub cluster_id: String,
    pub feature_key: String,
    pub count: usize,
    pub mean: f64,
    /// 样本标准差 (ddof=1)
    pub std: f64,
    pub p75: f64,
    pub p80: f64,
    /// 组内合计
    pub total: f64,
}

impl PeerGroupStat {
    /// 计算某个值相对本组的 z-score
    pub fn z_score(&self, value: f64) -> f64 {
        standard_score(value, self.mean, self.std)
    }

    /// 组内是否零方差
    pub fn is_zero_variance(&self) -> bool {
        !(self.std > 0.0 && self.std.is_finite())
    }
}

/// z-score，std 为 0 或非有限时定义为 0
pub fn standard_score(value: f64, mean: f64, std: f64) -> f64 {
    if std > 0.0 && std.is_finite() {
        (value - mean) / std
    } else {
        0.0
    }
}
