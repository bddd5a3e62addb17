use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::{info, warn};

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::display::{OutputFormat, print_query_results, save_images};
use crate::seed;

#[derive(Parser, Debug, Clone)]
pub struct SeedCommand {
    /// 示例图片所在目录
    #[arg(long, value_name = "DIR", default_value = "./images")]
    pub images: PathBuf,
    /// 记录已存在时覆盖，而不是报错
    #[arg(long)]
    pub upsert: bool,
    /// 写入后不执行示例查询
    #[arg(long)]
    pub no_query: bool,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// 将示例查询结果的缩略图保存到目录
    #[arg(long, value_name = "DIR")]
    pub save_images: Option<PathBuf>,
}

impl SubCommandExtend for SeedCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let missing = seed::image_files()
            .filter(|file| !self.images.join(file).is_file())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            bail!("{} 中缺少示例图片: {}", self.images.display(), missing.join(", "));
        }

        let client = open_client(opts).await?;
        let mut collection = client.get_or_create_collection(&opts.collection, opts.space).await?;

        for batch in [seed::initial_records(&self.images), seed::catalog_records(&self.images)] {
            if self.upsert {
                collection.upsert(batch).await?;
            } else {
                collection.add(batch).await?;
            }
        }
        info!("集合 {} 中共有 {} 条记录", collection.name(), collection.count().await?);

        if self.no_query {
            return Ok(());
        }
        let request = seed::default_query();
        let labels = request.input.labels();
        let include = request.include.clone();
        let result = collection.query(request).await?;
        if result.iter().all(|matches| matches.is_empty()) {
            warn!("示例查询没有结果");
        }
        print_query_results(&labels, &result, &include, self.format)?;
        if let Some(dir) = &self.save_images {
            let written = save_images(dir, &result)?;
            info!("已保存 {} 张图片到 {}", written.len(), dir.display());
        }
        Ok(())
    }
}
