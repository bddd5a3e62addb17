use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::ValueEnum;
use image::DynamicImage;
use serde::Serialize;

use crate::embedding::Embedding;
use crate::filter::{Where, WhereDocument};

/// 记录的元数据，键和值均为字符串
pub type Metadata = BTreeMap<String, String>;

/// 集合中的一条记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// 集合内唯一的记录 ID
    pub id: String,
    /// 图片路径，存在时使用图片计算嵌入
    pub uri: Option<PathBuf>,
    /// 文本内容，没有 uri 时使用文本计算嵌入
    pub document: Option<String>,
    /// 元数据
    pub metadata: Metadata,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_uri(mut self, uri: impl Into<PathBuf>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_metadata<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// 查询和读取时需要返回的字段
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Include {
    Distances,
    Metadatas,
    Documents,
    Uris,
    Data,
    Embeddings,
}

impl Include {
    /// 查询时默认返回的字段
    pub const QUERY_DEFAULT: &'static [Include] =
        &[Include::Distances, Include::Metadatas, Include::Documents];
    /// 读取时默认返回的字段
    pub const GET_DEFAULT: &'static [Include] = &[Include::Metadatas, Include::Documents];
}

/// 查询输入，文本或图片路径
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Texts(Vec<String>),
    Uris(Vec<PathBuf>),
}

impl QueryInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Texts(texts) => texts.len(),
            Self::Uris(uris) => uris.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 用于展示的查询描述
    pub fn labels(&self) -> Vec<String> {
        match self {
            Self::Texts(texts) => texts.clone(),
            Self::Uris(uris) => uris.iter().map(|uri| uri.display().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub input: QueryInput,
    pub n_results: usize,
    pub include: Vec<Include>,
    pub filter: Option<Where>,
    pub document_filter: Option<WhereDocument>,
}

impl QueryRequest {
    pub fn texts<S: Into<String>>(texts: impl IntoIterator<Item = S>, n_results: usize) -> Self {
        Self {
            input: QueryInput::Texts(texts.into_iter().map(Into::into).collect()),
            n_results,
            include: Include::QUERY_DEFAULT.to_vec(),
            filter: None,
            document_filter: None,
        }
    }

    pub fn uris<P: Into<PathBuf>>(uris: impl IntoIterator<Item = P>, n_results: usize) -> Self {
        Self {
            input: QueryInput::Uris(uris.into_iter().map(Into::into).collect()),
            ..Self::texts(Vec::<String>::new(), n_results)
        }
    }

    pub fn include(mut self, include: &[Include]) -> Self {
        self.include = include.to_vec();
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn document_filter(mut self, filter: WhereDocument) -> Self {
        self.document_filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    pub ids: Option<Vec<String>>,
    pub filter: Option<Where>,
    pub document_filter: Option<WhereDocument>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub include: Vec<Include>,
}

impl GetRequest {
    pub fn all() -> Self {
        Self { include: Include::GET_DEFAULT.to_vec(), ..Default::default() }
    }

    pub fn ids<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self { ids: Some(ids.into_iter().map(Into::into).collect()), ..Self::all() }
    }
}

/// 查询或读取返回的一条结果，未包含的字段为 None
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<PathBuf>,
    #[serde(skip)]
    pub data: Option<DynamicImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

/// 每个查询输入对应一组按距离升序排列的结果
pub type QueryResult = Vec<Vec<QueryMatch>>;
