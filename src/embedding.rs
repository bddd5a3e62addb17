use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use clap::ValueEnum;
use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use log::{debug, info};

use crate::error::{CollectionError, Result};

pub type Embedding = Vec<f32>;

/// 可以计算嵌入向量的输入
#[derive(Debug, Clone, PartialEq)]
pub enum Embeddable {
    Text(String),
    Image(PathBuf),
}

/// 将文本或图片转换为同一向量空间中的向量
pub trait EmbeddingFunction: Send + Sync {
    /// 不计算嵌入时已知的向量维度
    fn dimension_hint(&self) -> Option<usize> {
        None
    }

    /// 按输入顺序返回嵌入向量
    fn embed(&self, inputs: &[Embeddable]) -> Result<Vec<Embedding>>;
}

/// 一对共享向量空间的文本、图片模型
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// CLIP ViT-B/32
    ClipVitB32,
    /// nomic-embed-text/vision v1.5
    NomicV15,
}

impl ModelKind {
    fn text_model(self) -> EmbeddingModel {
        match self {
            Self::ClipVitB32 => EmbeddingModel::ClipVitB32,
            Self::NomicV15 => EmbeddingModel::NomicEmbedTextV15,
        }
    }

    fn dimension(self) -> usize {
        match self {
            Self::ClipVitB32 => 512,
            Self::NomicV15 => 768,
        }
    }

    fn image_model(self) -> ImageEmbeddingModel {
        match self {
            Self::ClipVitB32 => ImageEmbeddingModel::ClipVitB32,
            Self::NomicV15 => ImageEmbeddingModel::NomicEmbedVisionV15,
        }
    }
}

/// 基于 fastembed 的多模态嵌入函数
///
/// 模型在第一次计算时才会加载（必要时下载），只读取数据的命令不会触发下载。
pub struct ClipEmbedding {
    kind: ModelKind,
    cache_dir: PathBuf,
    batch_size: Option<usize>,
    text: OnceLock<TextEmbedding>,
    image: OnceLock<ImageEmbedding>,
}

impl ClipEmbedding {
    pub fn new(kind: ModelKind, cache_dir: impl AsRef<Path>, batch_size: Option<usize>) -> Self {
        Self {
            kind,
            cache_dir: cache_dir.as_ref().to_path_buf(),
            batch_size,
            text: OnceLock::new(),
            image: OnceLock::new(),
        }
    }

    fn text_model(&self) -> Result<&TextEmbedding> {
        if let Some(model) = self.text.get() {
            return Ok(model);
        }
        info!("加载文本模型: {:?}", self.kind);
        let options = InitOptions::new(self.kind.text_model())
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(true);
        let model = TextEmbedding::try_new(options).map_err(CollectionError::Embedding)?;
        Ok(self.text.get_or_init(|| model))
    }

    fn image_model(&self) -> Result<&ImageEmbedding> {
        if let Some(model) = self.image.get() {
            return Ok(model);
        }
        info!("加载图片模型: {:?}", self.kind);
        let options = ImageInitOptions::new(self.kind.image_model())
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(true);
        let model = ImageEmbedding::try_new(options).map_err(CollectionError::Embedding)?;
        Ok(self.image.get_or_init(|| model))
    }
}

impl EmbeddingFunction for ClipEmbedding {
    fn dimension_hint(&self) -> Option<usize> {
        Some(self.kind.dimension())
    }

    fn embed(&self, inputs: &[Embeddable]) -> Result<Vec<Embedding>> {
        let start = Instant::now();

        // 文本和图片分开批量计算，再按原顺序合并
        let mut texts = vec![];
        let mut images = vec![];
        for (i, input) in inputs.iter().enumerate() {
            match input {
                Embeddable::Text(text) => texts.push((i, text.as_str())),
                Embeddable::Image(path) => images.push((i, path.as_path())),
            }
        }

        let mut output = vec![Embedding::new(); inputs.len()];
        if !texts.is_empty() {
            let batch = texts.iter().map(|(_, text)| *text).collect::<Vec<_>>();
            let vectors =
                self.text_model()?.embed(batch, self.batch_size).map_err(CollectionError::Embedding)?;
            for ((i, _), vector) in texts.iter().zip(vectors) {
                output[*i] = vector;
            }
        }
        if !images.is_empty() {
            let batch = images.iter().map(|(_, path)| *path).collect::<Vec<_>>();
            let vectors = self
                .image_model()?
                .embed(batch, self.batch_size)
                .map_err(CollectionError::Embedding)?;
            for ((i, _), vector) in images.iter().zip(vectors) {
                output[*i] = vector;
            }
        }

        debug!(
            "embedded {} texts, {} images in {:.2}s",
            texts.len(),
            images.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(output)
    }
}
