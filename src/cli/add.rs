use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use regex::Regex;
use walkdir::WalkDir;

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::record::Record;
use crate::utils::{parse_metadata_pair, pb_style, to_metadata};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 记录 ID
    pub id: String,
    /// 图片路径
    pub uri: Option<PathBuf>,
    /// 文本内容，没有图片时使用文本计算嵌入
    #[arg(short, long)]
    pub document: Option<String>,
    /// 元数据，可重复指定
    /// 例：-m category=animal -m item_name=Lion
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_metadata_pair, verbatim_doc_comment)]
    pub metadata: Vec<(String, String)>,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        if self.uri.is_none() && self.document.is_none() {
            return Err(anyhow!("需要指定图片路径或 --document"));
        }
        let client = open_client(opts).await?;
        let mut collection = client.get_or_create_collection(&opts.collection, opts.space).await?;

        let record = Record {
            id: self.id.clone(),
            uri: self.uri.clone(),
            document: self.document.clone(),
            metadata: to_metadata(&self.metadata),
        };
        collection.add(vec![record]).await?;
        println!("[OK] Add {}", self.id);
        Ok(())
    }
}

#[derive(Parser, Debug, Clone)]
pub struct AddDirCommand {
    /// 图片所在目录
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp")]
    pub suffix: String,
    /// 所有图片共用的元数据，可重复指定
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_metadata_pair)]
    pub metadata: Vec<(String, String)>,
    /// 每批添加的图片数量
    #[arg(short, long, default_value_t = 32)]
    pub batch: usize,
    /// 如果 ID 已存在，是否覆盖旧的记录
    #[arg(long)]
    pub overwrite: bool,
}

impl SubCommandExtend for AddDirCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = format!("(?i)^({})$", self.suffix.replace(',', "|"));
        let re_suf = Regex::new(&re_suf).context("无效的后缀名")?;

        info!("开始扫描目录: {}", self.dir.display());
        let mut records = WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.into_path();
                let ext = path.extension()?.to_string_lossy().into_owned();
                if !re_suf.is_match(&ext) {
                    return None;
                }
                let id = path.file_stem()?.to_string_lossy().into_owned();
                Some(Record { id, uri: Some(path), metadata: to_metadata(&self.metadata), ..Default::default() })
            })
            .collect::<Vec<_>>();
        records.sort_by(|a, b| a.uri.cmp(&b.uri));
        info!("扫描完成，共 {} 张图片", records.len());

        let client = open_client(opts).await?;
        let mut collection = client.get_or_create_collection(&opts.collection, opts.space).await?;

        let pb = ProgressBar::new(records.len() as u64).with_style(pb_style());
        for chunk in records.chunks(self.batch.max(1)) {
            if self.overwrite {
                collection.upsert(chunk.to_vec()).await?;
            } else {
                collection.add(chunk.to_vec()).await?;
            }
            pb.set_message(chunk[chunk.len() - 1].id.clone());
            pb.inc(chunk.len() as u64);
        }
        pb.finish_with_message("图片添加完成");

        println!("{}", collection.count().await?);
        Ok(())
    }
}
