use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;

/// 打印集合中的记录数量，集合不存在时创建
pub async fn count(opts: &Opts) -> Result<()> {
    let client = open_client(opts).await?;
    let collection = client.get_or_create_collection(&opts.collection, opts.space).await?;
    println!("{}", collection.count().await?);
    Ok(())
}

/// 列出所有集合
pub async fn list(opts: &Opts) -> Result<()> {
    let client = open_client(opts).await?;
    for info in client.list_collections().await? {
        let dimension = info.dimension.map_or_else(|| "-".to_string(), |d| d.to_string());
        println!("{}\t{}\t{}\t{}", info.name, info.space, dimension, info.count);
    }
    Ok(())
}

#[derive(Parser, Debug, Clone)]
pub struct DropCommand {
    /// 集合名称
    pub name: String,
}

impl SubCommandExtend for DropCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let client = open_client(opts).await?;
        client.delete_collection(&self.name).await?;
        println!("[OK] Drop {}", self.name);
        Ok(())
    }
}
