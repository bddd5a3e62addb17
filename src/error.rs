use std::path::PathBuf;

use thiserror::Error;

/// 集合操作可能出现的错误
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("重复的记录 ID: {0}")]
    DuplicateId(String),
    #[error("记录不存在: {0}")]
    RecordNotFound(String),
    #[error("集合不存在: {0}")]
    CollectionNotFound(String),
    #[error("向量维度不一致: 集合为 {expected}，输入为 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("记录 {0} 既没有 uri 也没有 document")]
    EmptyRecord(String),
    #[error("删除记录时需要指定 ID 或过滤条件")]
    EmptyDelete,
    #[error("无效的过滤条件: {0}")]
    InvalidWhere(String),
    #[error("无法加载图片 {uri}: {source}")]
    Load {
        uri: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库迁移失败: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("向量索引错误: {0}")]
    Index(String),
    #[error("嵌入计算失败: {0}")]
    Embedding(anyhow::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CollectionError> = std::result::Result<T, E>;
