use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::collection::Collection;
use crate::config::StoreDir;
use crate::db::{self, CollectionRow, Database, crud};
use crate::embedding::{ClipEmbedding, EmbeddingFunction, ModelKind};
use crate::error::{CollectionError, Result};
use crate::index::Space;
use crate::loader::{DataLoader, ImageLoader};

pub struct ClientBuilder {
    store: StoreDir,
    embedding: Option<Arc<dyn EmbeddingFunction>>,
    loader: Option<Arc<dyn DataLoader>>,
}

impl ClientBuilder {
    pub fn new(store: StoreDir) -> Self {
        Self { store, embedding: None, loader: None }
    }

    /// 设置嵌入函数，默认在数据目录下缓存 CLIP 模型
    pub fn embedding(mut self, embedding: Arc<dyn EmbeddingFunction>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// 设置数据加载器，默认为 [`ImageLoader`]
    pub fn loader(mut self, loader: Arc<dyn DataLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub async fn open(self) -> Result<PersistentClient> {
        std::fs::create_dir_all(self.store.path())?;
        let db = db::init_db(&self.store).await?;
        let embedding = self.embedding.unwrap_or_else(|| {
            Arc::new(ClipEmbedding::new(
                ModelKind::ClipVitB32,
                self.store.path().join("models"),
                None,
            ))
        });
        let loader = self.loader.unwrap_or_else(|| Arc::new(ImageLoader::new()));
        Ok(PersistentClient { store: self.store, db, embedding, loader })
    }
}

/// 集合概要
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub space: String,
    pub dimension: Option<usize>,
    pub count: usize,
}

/// 基于本地目录的向量数据库
pub struct PersistentClient {
    store: StoreDir,
    db: Database,
    embedding: Arc<dyn EmbeddingFunction>,
    loader: Arc<dyn DataLoader>,
}

impl PersistentClient {
    /// 打开集合，不存在时使用 `space` 创建
    pub async fn get_or_create_collection(&self, name: &str, space: Space) -> Result<Collection> {
        let row = match crud::get_collection(&self.db, name).await? {
            Some(row) => {
                if row.space != space.as_str() {
                    warn!("集合 {} 已使用 {} 距离创建，忽略 {}", name, row.space, space);
                }
                row
            }
            None => {
                info!("创建集合 {} ({})", name, space);
                crud::add_collection(&self.db, name, space.as_str()).await?
            }
        };
        self.open_collection(row).await
    }

    /// 打开已存在的集合
    pub async fn get_collection(&self, name: &str) -> Result<Collection> {
        let row = crud::get_collection(&self.db, name)
            .await?
            .ok_or_else(|| CollectionError::CollectionNotFound(name.to_string()))?;
        self.open_collection(row).await
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        Ok(crud::list_collections(&self.db)
            .await?
            .into_iter()
            .map(|row| CollectionInfo {
                name: row.name,
                space: row.space,
                dimension: row.dimension.map(|d| d as usize),
                count: row.count as usize,
            })
            .collect())
    }

    /// 删除集合及其索引文件
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let row = crud::get_collection(&self.db, name)
            .await?
            .ok_or_else(|| CollectionError::CollectionNotFound(name.to_string()))?;
        crud::delete_collection(&self.db, row.id).await?;
        let index = self.store.index(row.id);
        if index.exists() {
            std::fs::remove_file(index)?;
        }
        info!("已删除集合 {}", name);
        Ok(())
    }

    async fn open_collection(&self, row: CollectionRow) -> Result<Collection> {
        let index_path = self.store.index(row.id);
        Collection::open(
            self.db.clone(),
            row,
            index_path,
            self.embedding.clone(),
            self.loader.clone(),
        )
        .await
    }
}
