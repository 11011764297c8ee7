// ==========================================
// 门店集群商品建议系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 传播策略: 单候选问题不走错误通道 (见 domain::diagnostics),
//           批次级问题在此定义并向调用方传播
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 致命: 计算开始前 =====
    #[error("配置错误 (field={field}): {message}")]
    Configuration { field: String, message: String },

    // ===== 致命: 批次级 =====
    #[error("数据不可用 (table={table}): {message}")]
    DataUnavailable { table: String, message: String },

    #[error("输入不一致: {0}")]
    InconsistentInput(String),

    // ===== 协作方 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        EngineError::Configuration {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn data_unavailable(table: &str, message: impl Into<String>) -> Self {
        EngineError::DataUnavailable {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// 是否为配置类错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, EngineError::Configuration { .. })
    }

    /// 是否为数据缺失类错误
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, EngineError::DataUnavailable { .. })
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
