use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser};

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::record::Record;
use crate::utils::{parse_metadata_pair, to_metadata};

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// 记录 ID
    pub id: String,
    /// 新的图片路径
    #[arg(short, long)]
    pub uri: Option<PathBuf>,
    /// 新的文本内容
    #[arg(short, long)]
    pub document: Option<String>,
    /// 需要修改的元数据，未指定的键保持不变
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_metadata_pair)]
    pub metadata: Vec<(String, String)>,
}

impl RecordArgs {
    fn to_record(&self) -> Record {
        Record {
            id: self.id.clone(),
            uri: self.uri.clone(),
            document: self.document.clone(),
            metadata: to_metadata(&self.metadata),
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct UpdateCommand {
    #[command(flatten)]
    pub record: RecordArgs,
}

impl SubCommandExtend for UpdateCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let client = open_client(opts).await?;
        let mut collection = client.get_collection(&opts.collection).await?;
        collection.update(vec![self.record.to_record()]).await?;
        println!("[OK] Update {}", self.record.id);
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct UpsertCommand {
    #[command(flatten)]
    pub record: RecordArgs,
}

impl SubCommandExtend for UpsertCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let client = open_client(opts).await?;
        let mut collection = client.get_or_create_collection(&opts.collection, opts.space).await?;
        collection.upsert(vec![self.record.to_record()]).await?;
        println!("[OK] Upsert {}", self.record.id);
        Ok(())
    }
}
