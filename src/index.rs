use std::fmt;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use log::debug;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::{CollectionError, Result};

/// 向量距离的计算方式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    /// 欧氏距离的平方
    #[default]
    L2,
    /// 1 - 余弦相似度
    Cosine,
    /// 1 - 内积
    Ip,
}

impl Space {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::Ip => "ip",
        }
    }

    fn metric(&self) -> MetricKind {
        match self {
            Self::L2 => MetricKind::L2sq,
            Self::Cosine => MetricKind::Cos,
            Self::Ip => MetricKind::IP,
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "l2" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            "ip" => Ok(Self::Ip),
            _ => Err(CollectionError::Index(format!("未知的距离类型: {s}"))),
        }
    }
}

/// 一条近邻搜索结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub key: u64,
    pub distance: f32,
}

/// usearch HNSW 索引，键为记录的 seq_id
pub struct VectorIndex {
    index: Index,
    dimension: usize,
}

impl VectorIndex {
    pub fn create(dimension: usize, space: Space) -> Result<Self> {
        let options = IndexOptions {
            dimensions: dimension,
            metric: space.metric(),
            quantization: ScalarKind::F32,
            // usearch 默认参数
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
            ..Default::default()
        };
        let index = Index::new(&options).map_err(index_error)?;
        Ok(Self { index, dimension })
    }

    /// 从文件加载索引
    pub fn open(path: impl AsRef<Path>, dimension: usize, space: Space) -> Result<Self> {
        let path = path.as_ref();
        let s = Self::create(dimension, space)?;
        s.index.load(&path.to_string_lossy()).map_err(index_error)?;
        if s.index.dimensions() != dimension {
            return Err(CollectionError::DimensionMismatch {
                expected: dimension,
                actual: s.index.dimensions(),
            });
        }
        debug!("loaded {} vectors from {}", s.size(), path.display());
        Ok(s)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.index.save(&path.as_ref().to_string_lossy()).map_err(index_error)
    }

    pub fn size(&self) -> usize {
        self.index.size()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.index.contains(key)
    }

    /// 添加一组向量，已存在的键会被覆盖
    pub fn add(&self, items: &[(u64, &[f32])]) -> Result<()> {
        for (_, vector) in items {
            self.check_dimension(vector)?;
        }
        let needed = self.index.size() + items.len();
        if needed > self.index.capacity() {
            self.index.reserve(needed.next_power_of_two()).map_err(index_error)?;
        }
        for (key, vector) in items {
            if self.index.contains(*key) {
                self.index.remove(*key).map_err(index_error)?;
            }
            self.index.add(*key, *vector).map_err(index_error)?;
        }
        Ok(())
    }

    pub fn remove(&self, keys: &[u64]) -> Result<()> {
        for key in keys {
            self.index.remove(*key).map_err(index_error)?;
        }
        Ok(())
    }

    /// 搜索最接近的 k 个向量，按距离升序返回
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(query)?;
        if k == 0 || self.size() == 0 {
            return Ok(vec![]);
        }
        let matches = self.index.search(query, k).map_err(index_error)?;
        Ok(to_neighbors(matches.keys, matches.distances))
    }

    /// 只在 `filter` 返回 true 的键中搜索
    pub fn filtered_search<F>(&self, query: &[f32], k: usize, filter: F) -> Result<Vec<Neighbor>>
    where
        F: Fn(u64) -> bool,
    {
        self.check_dimension(query)?;
        if k == 0 || self.size() == 0 {
            return Ok(vec![]);
        }
        let matches = self.index.filtered_search(query, k, filter).map_err(index_error)?;
        Ok(to_neighbors(matches.keys, matches.distances))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(CollectionError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn to_neighbors(keys: Vec<u64>, distances: Vec<f32>) -> Vec<Neighbor> {
    let mut neighbors = keys
        .into_iter()
        .zip(distances)
        .map(|(key, distance)| Neighbor { key, distance })
        .collect::<Vec<_>>();
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    neighbors
}

fn index_error(err: impl fmt::Display) -> CollectionError {
    CollectionError::Index(err.to_string())
}
