use sqlx::FromRow;

/// 集合记录
#[derive(Debug, Clone, FromRow)]
pub struct CollectionRow {
    pub id: i64,
    /// 集合名称，唯一
    pub name: String,
    /// 距离类型
    pub space: String,
    /// 向量维度，集合为空时可能为 None
    pub dimension: Option<i64>,
}

/// 集合统计
#[derive(Debug, Clone, FromRow)]
pub struct CollectionStatsRow {
    pub name: String,
    pub space: String,
    pub dimension: Option<i64>,
    pub count: i64,
}

/// 数据记录
#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    /// 自增 ID，同时作为向量索引的键
    pub seq_id: i64,
    /// 用户指定的记录 ID
    pub id: String,
    pub uri: Option<String>,
    pub document: Option<String>,
    /// uri 文件的 blake3 哈希
    pub hash: Option<Vec<u8>>,
}

/// 向量记录，f32 按本机字节序存储
#[derive(Debug, Clone, FromRow)]
pub struct EmbeddingRow {
    pub seq_id: i64,
    pub embedding: Vec<u8>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MetadataRow {
    pub seq_id: i64,
    pub key: String,
    pub value: String,
}
