use serde::Serialize;
use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{CollectionRow, CollectionStatsRow, EmbeddingRow, MetadataRow, RecordRow};

/// 根据名称查找集合
pub async fn get_collection(executor: &SqlitePool, name: &str) -> Result<Option<CollectionRow>> {
    sqlx::query_as::<_, CollectionRow>(
        r#"
        SELECT id, name, space, dimension FROM collection WHERE name = ?
        "#,
    )
    .bind(name)
    .fetch_optional(executor)
    .await
}

/// 创建集合
pub async fn add_collection(executor: &SqlitePool, name: &str, space: &str) -> Result<CollectionRow> {
    sqlx::query_as::<_, CollectionRow>(
        r#"
        INSERT INTO collection (name, space)
        VALUES (?, ?)
        RETURNING id, name, space, dimension
        "#,
    )
    .bind(name)
    .bind(space)
    .fetch_one(executor)
    .await
}

/// 列出所有集合及其记录数量
pub async fn list_collections(executor: &SqlitePool) -> Result<Vec<CollectionStatsRow>> {
    sqlx::query_as::<_, CollectionStatsRow>(
        r#"
        SELECT c.name, c.space, c.dimension, COUNT(r.seq_id) as count
        FROM collection c
        LEFT JOIN record r ON r.collection_id = c.id
        GROUP BY c.id
        ORDER BY c.name
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 删除集合，记录和元数据级联删除
pub async fn delete_collection(executor: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM collection WHERE id = ?").bind(id).execute(executor).await?;
    Ok(())
}

/// 设置集合的向量维度
pub async fn set_dimension<'c, E>(executor: E, id: i64, dimension: i64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("UPDATE collection SET dimension = ? WHERE id = ?")
        .bind(dimension)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// 添加记录，返回 seq_id
pub async fn add_record<'c, E>(
    executor: E,
    collection_id: i64,
    id: &str,
    uri: Option<&str>,
    document: Option<&str>,
    hash: Option<&[u8]>,
    embedding: &[u8],
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let (seq_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO record (collection_id, id, uri, document, hash, embedding)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING seq_id
        "#,
    )
    .bind(collection_id)
    .bind(id)
    .bind(uri)
    .bind(document)
    .bind(hash)
    .bind(embedding)
    .fetch_one(executor)
    .await?;

    Ok(seq_id)
}

/// 更新记录内容，seq_id 保持不变，embedding 为 None 时保留原向量
pub async fn update_record<'c, E>(
    executor: E,
    seq_id: i64,
    uri: Option<&str>,
    document: Option<&str>,
    hash: Option<&[u8]>,
    embedding: Option<&[u8]>,
) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE record SET uri = ?, document = ?, hash = ?, embedding = COALESCE(?, embedding)
        WHERE seq_id = ?
        "#,
    )
    .bind(uri)
    .bind(document)
    .bind(hash)
    .bind(embedding)
    .bind(seq_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// 写入一项元数据，已存在的键会被覆盖
pub async fn set_metadata<'c, E>(executor: E, seq_id: i64, key: &str, value: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO metadata (seq_id, key, value)
        VALUES (?, ?, ?)
        ON CONFLICT (seq_id, key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(seq_id)
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}

/// 删除记录
pub async fn delete_record<'c, E>(executor: E, seq_id: i64) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("DELETE FROM record WHERE seq_id = ?").bind(seq_id).execute(executor).await?;
    Ok(())
}

/// 按插入顺序读取集合中的记录
pub async fn get_records(
    executor: &SqlitePool,
    collection_id: i64,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<RecordRow>> {
    // SQLite 中 LIMIT -1 表示不限制
    let limit = limit.map(|n| n as i64).unwrap_or(-1);
    sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT seq_id, id, uri, document, hash FROM record
        WHERE collection_id = ?
        ORDER BY seq_id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(collection_id)
    .bind(limit)
    .bind(offset as i64)
    .fetch_all(executor)
    .await
}

/// 根据用户 ID 批量读取记录，不存在的 ID 会被忽略
pub async fn get_records_by_ids(
    executor: &SqlitePool,
    collection_id: i64,
    ids: &[String],
) -> Result<Vec<RecordRow>> {
    let ids = json_list(ids)?;
    sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT seq_id, id, uri, document, hash FROM record
        WHERE collection_id = ? AND id IN (SELECT value FROM json_each(?))
        ORDER BY seq_id ASC
        "#,
    )
    .bind(collection_id)
    .bind(ids)
    .fetch_all(executor)
    .await
}

/// 根据 seq_id 批量读取记录
pub async fn get_records_by_seq_ids(executor: &SqlitePool, seq_ids: &[i64]) -> Result<Vec<RecordRow>> {
    let seq_ids = json_list(seq_ids)?;
    sqlx::query_as::<_, RecordRow>(
        r#"
        SELECT seq_id, id, uri, document, hash FROM record
        WHERE seq_id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(seq_ids)
    .fetch_all(executor)
    .await
}

/// 读取集合中所有记录的元数据
pub async fn get_all_metadata(executor: &SqlitePool, collection_id: i64) -> Result<Vec<MetadataRow>> {
    sqlx::query_as::<_, MetadataRow>(
        r#"
        SELECT m.seq_id, m.key, m.value
        FROM metadata m
        JOIN record r ON r.seq_id = m.seq_id
        WHERE r.collection_id = ?
        "#,
    )
    .bind(collection_id)
    .fetch_all(executor)
    .await
}

/// 读取指定记录的元数据
pub async fn get_metadata(executor: &SqlitePool, seq_ids: &[i64]) -> Result<Vec<MetadataRow>> {
    let seq_ids = json_list(seq_ids)?;
    sqlx::query_as::<_, MetadataRow>(
        r#"
        SELECT seq_id, key, value FROM metadata
        WHERE seq_id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(seq_ids)
    .fetch_all(executor)
    .await
}

/// 读取集合中所有向量，用于重建索引
pub async fn get_embeddings(executor: &SqlitePool, collection_id: i64) -> Result<Vec<EmbeddingRow>> {
    sqlx::query_as::<_, EmbeddingRow>(
        r#"
        SELECT seq_id, embedding FROM record WHERE collection_id = ?
        "#,
    )
    .bind(collection_id)
    .fetch_all(executor)
    .await
}

/// 读取指定记录的向量
pub async fn get_embeddings_by_seq_ids(
    executor: &SqlitePool,
    seq_ids: &[i64],
) -> Result<Vec<EmbeddingRow>> {
    let seq_ids = json_list(seq_ids)?;
    sqlx::query_as::<_, EmbeddingRow>(
        r#"
        SELECT seq_id, embedding FROM record
        WHERE seq_id IN (SELECT value FROM json_each(?))
        "#,
    )
    .bind(seq_ids)
    .fetch_all(executor)
    .await
}

/// 查询集合中的记录数量
pub async fn count_records(executor: &SqlitePool, collection_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM record WHERE collection_id = ?")
        .bind(collection_id)
        .fetch_one(executor)
        .await?;
    Ok(count)
}

/// 将列表编码为 JSON，配合 `json_each` 实现 IN 查询
fn json_list<T: Serialize>(items: &[T]) -> Result<String> {
    serde_json::to_string(items).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
