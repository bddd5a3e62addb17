mod add;
mod collection;
mod delete;
mod get;
mod query;
mod seed;
mod update;

use std::sync::Arc;

pub use add::*;
pub use collection::*;
pub use delete::*;
pub use get::*;
pub use query::*;
pub use seed::*;
pub use update::*;

use crate::config::Opts;
use crate::embedding::ClipEmbedding;
use crate::loader::ImageLoader;
use crate::{ClientBuilder, PersistentClient};

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 按命令行参数打开数据目录
pub async fn open_client(opts: &Opts) -> anyhow::Result<PersistentClient> {
    let embedding = ClipEmbedding::new(
        opts.embedding.model,
        &opts.embedding.model_cache,
        opts.embedding.batch_size,
    );
    let loader = ImageLoader::new().max_size(opts.max_image_size, opts.max_image_size);
    let client = ClientBuilder::new(opts.path.clone())
        .embedding(Arc::new(embedding))
        .loader(Arc::new(loader))
        .open()
        .await?;
    Ok(client)
}
