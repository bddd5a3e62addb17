use anyhow::{Result, anyhow};
use clap::Parser;

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::filter::Where;

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// 需要删除的记录 ID
    pub ids: Vec<String>,
    /// 删除满足元数据过滤条件的记录
    #[arg(short = 'w', long = "where", value_name = "JSON")]
    pub filter: Option<Where>,
}

impl SubCommandExtend for DeleteCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        if self.ids.is_empty() && self.filter.is_none() {
            return Err(anyhow!("需要指定 ID 或 --where"));
        }
        let client = open_client(opts).await?;
        let mut collection = client.get_collection(&opts.collection).await?;
        let ids = (!self.ids.is_empty()).then(|| self.ids.clone());
        let deleted = collection.delete(ids, self.filter.clone()).await?;
        println!("[OK] Delete {}", deleted);
        Ok(())
    }
}
