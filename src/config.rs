use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::embedding::ModelKind;
use crate::index::Space;

static CACHE_DIR: LazyLock<String> = LazyLock::new(|| {
    ProjectDirs::from("", "mmsearch", "mmsearch")
        .map(|dirs| dirs.cache_dir().join("models"))
        .unwrap_or_else(|| PathBuf::from(".fastembed_cache"))
        .to_string_lossy()
        .into_owned()
});

fn default_cache_dir() -> &'static str {
    CACHE_DIR.as_str()
}

#[derive(Parser, Debug, Clone)]
pub struct EmbeddingOptions {
    /// 嵌入模型，文本和图片使用同一向量空间
    #[arg(long, global = true, value_enum, default_value_t = ModelKind::ClipVitB32)]
    pub model: ModelKind,
    /// 模型下载和缓存目录
    #[arg(long, global = true, value_name = "DIR", default_value = default_cache_dir())]
    pub model_cache: PathBuf,
    /// 每批计算嵌入的数量
    #[arg(long, global = true, value_name = "SIZE")]
    pub batch_size: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mmsearch", version, about = "多模态（图片 + 文本）向量集合")]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 数据目录
    #[arg(short, long, global = true, default_value = "./data/mmsearch")]
    pub path: StoreDir,
    /// 集合名称
    #[arg(short, long, global = true, default_value = "multimodal_collection")]
    pub collection: String,
    /// 新建集合时使用的距离类型
    #[arg(long, global = true, value_enum, default_value_t = Space::L2)]
    pub space: Space,
    /// 读取图片数据时的最大边长，宽高均超过时等比缩小
    #[arg(long, global = true, value_name = "PX", default_value_t = 1024)]
    pub max_image_size: u32,
    #[command(flatten)]
    pub embedding: EmbeddingOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 写入内置的示例数据
    Seed(SeedCommand),
    /// 添加一条记录
    Add(AddCommand),
    /// 添加目录中的所有图片，文件名作为 ID
    AddDir(AddDirCommand),
    /// 更新已存在的记录
    Update(UpdateCommand),
    /// 更新或添加记录
    Upsert(UpsertCommand),
    /// 按文本或图片查询相似记录
    Query(QueryCommand),
    /// 按 ID 或元数据读取记录
    Get(GetCommand),
    /// 查看集合中的前几条记录
    Peek(PeekCommand),
    /// 删除记录
    Delete(DeleteCommand),
    /// 统计集合中的记录数量
    Count,
    /// 列出所有集合
    List,
    /// 删除整个集合
    Drop(DropCommand),
}

/// 数据目录，所有文件路径由此派生
#[derive(Debug, Clone)]
pub struct StoreDir {
    path: PathBuf,
}

impl StoreDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回数据库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("mmsearch.db")
    }

    /// 返回集合索引文件的路径
    pub fn index(&self, collection_id: i64) -> PathBuf {
        self.path.join(format!("collection-{collection_id}.usearch"))
    }
}

impl FromStr for StoreDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}
