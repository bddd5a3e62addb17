use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::task::block_in_place;

use crate::db::{CollectionRow, Database, RecordRow, crud};
use crate::embedding::{Embeddable, Embedding, EmbeddingFunction};
use crate::error::{CollectionError, Result};
use crate::filter::{Where, WhereDocument};
use crate::index::{Neighbor, Space, VectorIndex};
use crate::loader::DataLoader;
use crate::record::{
    GetRequest, Include, Metadata, QueryInput, QueryMatch, QueryRequest, QueryResult, Record,
};
use crate::utils::{decode_embedding, encode_embedding, hash_file};

/// 持久化的向量集合
///
/// 记录和向量保存在 SQLite 中，向量索引保存在单独的 usearch 文件中。
/// 打开集合时如果索引文件缺失或与数据库不一致，会从数据库重建索引。
pub struct Collection {
    db: Database,
    id: i64,
    name: String,
    space: Space,
    dimension: Option<usize>,
    index: Option<VectorIndex>,
    index_path: PathBuf,
    embedding: Arc<dyn EmbeddingFunction>,
    loader: Arc<dyn DataLoader>,
}

/// 写入数据库前准备好的记录
struct PreparedRecord {
    record: Record,
    hash: Option<Vec<u8>>,
    /// 已存在记录的 seq_id，新记录为 None
    seq_id: Option<i64>,
    /// 需要重新计算嵌入时为 Some
    input: Option<Embeddable>,
}

impl Collection {
    pub(crate) async fn open(
        db: Database,
        row: CollectionRow,
        index_path: PathBuf,
        embedding: Arc<dyn EmbeddingFunction>,
        loader: Arc<dyn DataLoader>,
    ) -> Result<Self> {
        let space = row.space.parse()?;
        let mut collection = Self {
            db,
            id: row.id,
            name: row.name,
            space,
            dimension: row.dimension.map(|d| d as usize),
            index: None,
            index_path,
            embedding,
            loader,
        };
        collection.load_index().await?;
        Ok(collection)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> Space {
        self.space
    }

    /// 集合的向量维度，空集合为 None
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(crud::count_records(&self.db, self.id).await? as usize)
    }

    /// 添加记录，任意 ID 已存在时整批失败
    pub async fn add(&mut self, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_unique(&records)?;
        if let Some(id) = self.existing_rows(&records).await?.into_keys().next() {
            return Err(CollectionError::DuplicateId(id));
        }

        let prepared =
            records.into_iter().map(|record| self.prepare_new(record)).collect::<Result<Vec<_>>>()?;
        self.write(prepared).await
    }

    /// 更新已存在的记录，任意 ID 不存在时整批失败
    ///
    /// 元数据按键合并；uri 和 document 为 None 时保留原值。
    /// 只有图片内容或文本发生变化时才会重新计算嵌入。
    pub async fn update(&mut self, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_unique(&records)?;
        let existing = self.existing_rows(&records).await?;
        if let Some(missing) = records.iter().find(|r| !existing.contains_key(&r.id)) {
            return Err(CollectionError::RecordNotFound(missing.id.clone()));
        }

        let prepared = records
            .into_iter()
            .map(|record| {
                let row = &existing[&record.id];
                self.prepare_existing(record, row)
            })
            .collect::<Result<Vec<_>>>()?;
        self.write(prepared).await
    }

    /// 存在的记录执行更新，不存在的记录执行添加，整批在同一事务中写入
    pub async fn upsert(&mut self, records: Vec<Record>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_unique(&records)?;
        let existing = self.existing_rows(&records).await?;

        let prepared = records
            .into_iter()
            .map(|record| match existing.get(&record.id) {
                Some(row) => self.prepare_existing(record, row),
                None => self.prepare_new(record),
            })
            .collect::<Result<Vec<_>>>()?;
        self.write(prepared).await
    }

    /// 读取记录，先按 ID 和过滤条件筛选，再应用 offset 和 limit
    pub async fn get(&self, request: GetRequest) -> Result<Vec<QueryMatch>> {
        let mut rows = match &request.ids {
            Some(ids) => {
                let mut rows = crud::get_records_by_ids(&self.db, self.id, ids).await?;
                let order =
                    ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect::<HashMap<_, _>>();
                rows.sort_by_key(|row| order[row.id.as_str()]);
                rows
            }
            None => crud::get_records(&self.db, self.id, None, 0).await?,
        };

        if request.filter.is_some() || request.document_filter.is_some() {
            let allowed = self
                .filter_seq_ids(request.filter.as_ref(), request.document_filter.as_ref())
                .await?;
            rows.retain(|row| allowed.contains(&(row.seq_id as u64)));
        }

        let rows = rows
            .into_iter()
            .skip(request.offset)
            .take(request.limit.unwrap_or(usize::MAX))
            .map(|row| (row, None))
            .collect::<Vec<_>>();
        self.materialize(rows, &request.include).await
    }

    /// 按插入顺序读取前 `limit` 条记录
    pub async fn peek(&self, limit: usize) -> Result<Vec<QueryMatch>> {
        let request = GetRequest { limit: Some(limit), ..GetRequest::all() };
        self.get(request).await
    }

    /// 删除匹配 ID 和过滤条件的记录，返回删除数量
    pub async fn delete(&mut self, ids: Option<Vec<String>>, filter: Option<Where>) -> Result<usize> {
        if ids.is_none() && filter.is_none() {
            return Err(CollectionError::EmptyDelete);
        }
        let request = GetRequest { ids, filter, include: vec![], ..Default::default() };
        let ids = self.get(request).await?.into_iter().map(|m| m.id).collect::<Vec<_>>();
        if ids.is_empty() {
            return Ok(0);
        }

        let rows = crud::get_records_by_ids(&self.db, self.id, &ids).await?;
        let mut tx = self.db.begin().await?;
        for row in &rows {
            crud::delete_record(&mut *tx, row.seq_id).await?;
        }
        tx.commit().await?;

        if let Some(index) = &self.index {
            let keys = rows.iter().map(|row| row.seq_id as u64).collect::<Vec<_>>();
            index.remove(&keys)?;
            index.save(&self.index_path)?;
        }
        info!("集合 {} 删除了 {} 条记录", self.name, rows.len());
        Ok(rows.len())
    }

    /// 查询最相似的记录，每个输入返回一组按距离升序排列的结果
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResult> {
        if request.input.is_empty() {
            return Ok(vec![]);
        }
        let inputs = match &request.input {
            QueryInput::Texts(texts) => texts.iter().cloned().map(Embeddable::Text).collect(),
            QueryInput::Uris(uris) => uris
                .iter()
                .map(|uri| {
                    self.loader.probe(uri)?;
                    Ok(Embeddable::Image(uri.clone()))
                })
                .collect::<Result<Vec<_>>>()?,
        };

        let Some(index) = &self.index else {
            warn!("集合 {} 为空", self.name);
            return Ok(vec![vec![]; inputs.len()]);
        };

        self.check_dimension_hint()?;
        let start = Instant::now();
        let embeddings = block_in_place(|| self.embedding.embed(&inputs))?;
        self.check_dimension(embeddings.iter())?;

        let allowed = if request.filter.is_some() || request.document_filter.is_some() {
            Some(
                self.filter_seq_ids(request.filter.as_ref(), request.document_filter.as_ref())
                    .await?,
            )
        } else {
            None
        };
        let total = allowed.as_ref().map_or(index.size(), HashSet::len);
        let k = if request.n_results > total {
            warn!("请求的结果数量 {} 大于可用记录数量 {}，返回全部记录", request.n_results, total);
            total
        } else {
            request.n_results
        };

        let neighbors = block_in_place(|| {
            embeddings
                .iter()
                .map(|embedding| match &allowed {
                    Some(allowed) => index.filtered_search(embedding, k, |key| allowed.contains(&key)),
                    None => index.search(embedding, k),
                })
                .collect::<Result<Vec<_>>>()
        })?;
        debug!("searched {} queries in {:.2}s", inputs.len(), start.elapsed().as_secs_f32());

        let seq_ids = neighbors.iter().flatten().map(|n| n.key as i64).collect::<HashSet<_>>();
        let rows = crud::get_records_by_seq_ids(&self.db, &seq_ids.into_iter().collect::<Vec<_>>())
            .await?
            .into_iter()
            .map(|row| (row.seq_id as u64, row))
            .collect::<HashMap<_, _>>();

        let include_distance = request.include.contains(&Include::Distances);
        let mut result = vec![];
        for neighbors in neighbors {
            let ranked = neighbors
                .into_iter()
                .filter_map(|Neighbor { key, distance }| {
                    let row = rows.get(&key)?.clone();
                    Some((row, include_distance.then_some(distance)))
                })
                .collect();
            result.push(self.materialize(ranked, &request.include).await?);
        }
        Ok(result)
    }

    /// 返回满足过滤条件的 seq_id 集合
    async fn filter_seq_ids(
        &self,
        filter: Option<&Where>,
        document_filter: Option<&WhereDocument>,
    ) -> Result<HashSet<u64>> {
        let rows = crud::get_records(&self.db, self.id, None, 0).await?;
        let mut metadata = HashMap::<i64, Metadata>::new();
        if filter.is_some() {
            for row in crud::get_all_metadata(&self.db, self.id).await? {
                metadata.entry(row.seq_id).or_default().insert(row.key, row.value);
            }
        }

        let empty = Metadata::new();
        Ok(rows
            .into_iter()
            .filter(|row| {
                filter.is_none_or(|f| f.matches(metadata.get(&row.seq_id).unwrap_or(&empty)))
                    && document_filter.is_none_or(|f| f.matches(row.document.as_deref()))
            })
            .map(|row| row.seq_id as u64)
            .collect())
    }

    /// 根据 include 填充结果字段，保持输入顺序
    async fn materialize(
        &self,
        rows: Vec<(RecordRow, Option<f32>)>,
        include: &[Include],
    ) -> Result<Vec<QueryMatch>> {
        let seq_ids = rows.iter().map(|(row, _)| row.seq_id).collect::<Vec<_>>();

        let mut metadata = HashMap::<i64, Metadata>::new();
        if include.contains(&Include::Metadatas) {
            for row in crud::get_metadata(&self.db, &seq_ids).await? {
                metadata.entry(row.seq_id).or_default().insert(row.key, row.value);
            }
        }
        let mut embeddings = HashMap::new();
        if include.contains(&Include::Embeddings) {
            for row in crud::get_embeddings_by_seq_ids(&self.db, &seq_ids).await? {
                embeddings.insert(row.seq_id, decode_embedding(&row.embedding));
            }
        }

        let mut matches = vec![];
        for (row, distance) in rows {
            let uri = row.uri.map(PathBuf::from);
            let data = match (&uri, include.contains(&Include::Data)) {
                (Some(uri), true) => Some(block_in_place(|| self.loader.load(uri))?),
                _ => None,
            };
            matches.push(QueryMatch {
                distance,
                metadata: include
                    .contains(&Include::Metadatas)
                    .then(|| metadata.remove(&row.seq_id).unwrap_or_default()),
                document: row.document.filter(|_| include.contains(&Include::Documents)),
                uri: uri.filter(|_| include.contains(&Include::Uris)),
                data,
                embedding: embeddings.remove(&row.seq_id),
                id: row.id,
            });
        }
        Ok(matches)
    }

    /// 读取批次中已存在的记录，ID => 记录
    async fn existing_rows(&self, records: &[Record]) -> Result<HashMap<String, RecordRow>> {
        let ids = records.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        Ok(crud::get_records_by_ids(&self.db, self.id, &ids)
            .await?
            .into_iter()
            .map(|row| (row.id.clone(), row))
            .collect())
    }

    fn prepare_new(&self, record: Record) -> Result<PreparedRecord> {
        let (hash, input) = self.prepare_input(&record)?;
        Ok(PreparedRecord { record, hash, seq_id: None, input: Some(input) })
    }

    /// 合并旧记录的 uri 和 document，内容未变化时不重新计算嵌入
    fn prepare_existing(&self, mut record: Record, row: &RecordRow) -> Result<PreparedRecord> {
        if record.uri.is_none() {
            record.uri = row.uri.as_ref().map(PathBuf::from);
        }
        let document_changed = record.document.is_some() && record.document != row.document;
        if record.document.is_none() {
            record.document = row.document.clone();
        }

        let (hash, input) = self.prepare_input(&record)?;
        let changed = match record.uri {
            Some(_) => hash != row.hash,
            None => document_changed,
        };
        Ok(PreparedRecord { record, hash, seq_id: Some(row.seq_id), input: changed.then_some(input) })
    }

    /// 计算嵌入后在一个事务中写入整批记录，最后更新索引
    async fn write(&mut self, prepared: Vec<PreparedRecord>) -> Result<()> {
        let embeddings = self.embed(&prepared)?;
        let dimension = self.check_dimension(embeddings.values())?;

        let mut tx = self.db.begin().await?;
        let mut vectors = vec![];
        let mut added = 0;
        for item in &prepared {
            let record = &item.record;
            let uri = record.uri.as_deref().map(path_str);
            let embedding = embeddings.get(&record.id);
            let seq_id = match item.seq_id {
                Some(seq_id) => {
                    crud::update_record(
                        &mut *tx,
                        seq_id,
                        uri.as_deref(),
                        record.document.as_deref(),
                        item.hash.as_deref(),
                        embedding.map(|e| encode_embedding(e)).as_deref(),
                    )
                    .await?;
                    seq_id
                }
                None => {
                    let embedding = embedding.ok_or_else(|| {
                        CollectionError::Embedding(anyhow::anyhow!("记录 {} 没有嵌入向量", record.id))
                    })?;
                    added += 1;
                    crud::add_record(
                        &mut *tx,
                        self.id,
                        &record.id,
                        uri.as_deref(),
                        record.document.as_deref(),
                        item.hash.as_deref(),
                        &encode_embedding(embedding),
                    )
                    .await?
                }
            };
            for (key, value) in &record.metadata {
                crud::set_metadata(&mut *tx, seq_id, key, value).await?;
            }
            if let Some(embedding) = embedding {
                vectors.push((seq_id as u64, embedding.as_slice()));
            }
        }
        if self.dimension.is_none() {
            if let Some(dimension) = dimension {
                crud::set_dimension(&mut *tx, self.id, dimension as i64).await?;
            }
        }
        tx.commit().await?;

        info!(
            "集合 {} 添加了 {} 条记录，更新了 {} 条",
            self.name,
            added,
            prepared.len() - added
        );
        debug!("embedded {} of {} records", vectors.len(), prepared.len());
        self.index_vectors(dimension, &vectors)
    }

    /// 校验记录并确定嵌入输入，图片优先于文本
    fn prepare_input(&self, record: &Record) -> Result<(Option<Vec<u8>>, Embeddable)> {
        match (&record.uri, &record.document) {
            (Some(uri), _) => {
                self.loader.probe(uri)?;
                Ok((Some(hash_file(uri)?), Embeddable::Image(uri.clone())))
            }
            (None, Some(document)) => Ok((None, Embeddable::Text(document.clone()))),
            (None, None) => Err(CollectionError::EmptyRecord(record.id.clone())),
        }
    }

    /// 批量计算需要更新的嵌入，返回 ID => 向量
    fn embed(&self, prepared: &[PreparedRecord]) -> Result<HashMap<String, Embedding>> {
        let (ids, inputs): (Vec<_>, Vec<_>) = prepared
            .iter()
            .filter_map(|p| p.input.clone().map(|input| (p.record.id.clone(), input)))
            .unzip();
        if inputs.is_empty() {
            return Ok(HashMap::new());
        }
        self.check_dimension_hint()?;
        let embeddings = block_in_place(|| self.embedding.embed(&inputs))?;
        Ok(ids.into_iter().zip(embeddings).collect())
    }

    /// 嵌入函数的维度已知且与集合不一致时提前失败
    fn check_dimension_hint(&self) -> Result<()> {
        match (self.dimension, self.embedding.dimension_hint()) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(CollectionError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// 检查向量维度一致，返回集合维度
    fn check_dimension<'a>(
        &self,
        embeddings: impl Iterator<Item = &'a Embedding>,
    ) -> Result<Option<usize>> {
        let mut dimension = self.dimension;
        for embedding in embeddings {
            match dimension {
                Some(expected) if expected != embedding.len() => {
                    return Err(CollectionError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(embedding.len()),
            }
        }
        Ok(dimension)
    }

    /// 将向量写入索引并保存索引文件
    fn index_vectors(&mut self, dimension: Option<usize>, vectors: &[(u64, &[f32])]) -> Result<()> {
        if vectors.is_empty() {
            return Ok(());
        }
        if self.index.is_none() {
            let dimension = dimension.unwrap_or(vectors[0].1.len());
            self.dimension = Some(dimension);
            self.index = Some(VectorIndex::create(dimension, self.space)?);
        }
        if let Some(index) = &self.index {
            block_in_place(|| index.add(vectors))?;
            index.save(&self.index_path)?;
        }
        Ok(())
    }

    /// 加载索引文件，缺失或与数据库不一致时重建
    async fn load_index(&mut self) -> Result<()> {
        let Some(dimension) = self.dimension else {
            return Ok(());
        };
        let count = self.count().await?;

        if self.index_path.exists() {
            match VectorIndex::open(&self.index_path, dimension, self.space) {
                Ok(index) if index.size() == count => {
                    self.index = Some(index);
                    return Ok(());
                }
                Ok(index) => warn!(
                    "索引文件大小 {} 与记录数量 {} 不一致，重建索引",
                    index.size(),
                    count
                ),
                Err(e) => warn!("索引文件加载失败，重建索引: {}", e),
            }
        }

        let start = Instant::now();
        let rows = crud::get_embeddings(&self.db, self.id).await?;
        let vectors = rows
            .iter()
            .map(|row| (row.seq_id as u64, decode_embedding(&row.embedding)))
            .collect::<Vec<_>>();
        let vectors = vectors.iter().map(|(key, v)| (*key, v.as_slice())).collect::<Vec<_>>();

        let index = VectorIndex::create(dimension, self.space)?;
        block_in_place(|| index.add(&vectors))?;
        index.save(&self.index_path)?;
        info!(
            "重建索引 {} 完成，共 {} 个向量，耗时 {:.2}s",
            self.index_path.display(),
            index.size(),
            start.elapsed().as_secs_f32()
        );
        self.index = Some(index);
        Ok(())
    }
}

fn check_unique(records: &[Record]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(CollectionError::DuplicateId(record.id.clone()));
        }
    }
    Ok(())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
