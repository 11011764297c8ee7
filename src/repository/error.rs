// ==========================================
// 门店集群商品建议系统 - 仓储层错误类型
// ==========================================
// 范围: 外部协作方 (数据源 / 结果落地) 的边界错误
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据源不可用 (source={source_name}): {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("结果持久化失败: {0}")]
    PersistenceError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn source_unavailable(source_name: &str, message: impl Into<String>) -> Self {
        RepositoryError::SourceUnavailable {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
