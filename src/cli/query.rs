use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::display::{OutputFormat, print_query_results, save_images};
use crate::filter::{Where, WhereDocument};
use crate::record::{Include, QueryInput, QueryRequest};

#[derive(Parser, Debug, Clone)]
pub struct QueryCommand {
    /// 查询文本，可以同时查询多条
    pub texts: Vec<String>,
    /// 使用图片查询，可重复指定，不能与文本同时使用
    #[arg(long = "uri", value_name = "IMAGE")]
    pub uris: Vec<PathBuf>,
    /// 每条查询返回的结果数量
    #[arg(short, long, value_name = "N", default_value_t = 10)]
    pub n_results: usize,
    /// 返回的字段
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [Include::Distances, Include::Metadatas, Include::Documents, Include::Uris])]
    pub include: Vec<Include>,
    /// 元数据过滤条件，例：'{"category": "animal"}'
    #[arg(short = 'w', long = "where", value_name = "JSON")]
    pub filter: Option<Where>,
    /// 文本过滤条件，例：'{"$contains": "tofu"}'
    #[arg(long = "where-document", value_name = "JSON")]
    pub document_filter: Option<WhereDocument>,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// 将结果图片的缩略图保存到目录
    #[arg(long, value_name = "DIR")]
    pub save_images: Option<PathBuf>,
}

impl QueryCommand {
    fn request(&self) -> Result<QueryRequest> {
        let input = match (self.texts.is_empty(), self.uris.is_empty()) {
            (false, true) => QueryInput::Texts(self.texts.clone()),
            (true, false) => QueryInput::Uris(self.uris.clone()),
            (true, true) => return Err(anyhow!("需要指定查询文本或 --uri")),
            (false, false) => return Err(anyhow!("查询文本和 --uri 不能同时使用")),
        };
        let mut include = self.include.clone();
        if self.save_images.is_some() && !include.contains(&Include::Data) {
            include.push(Include::Data);
        }
        Ok(QueryRequest {
            input,
            n_results: self.n_results,
            include,
            filter: self.filter.clone(),
            document_filter: self.document_filter.clone(),
        })
    }
}

impl SubCommandExtend for QueryCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let request = self.request()?;
        let labels = request.input.labels();
        let include = request.include.clone();

        let client = open_client(opts).await?;
        let collection = client.get_collection(&opts.collection).await?;
        let result = collection.query(request).await?;

        print_query_results(&labels, &result, &include, self.format)?;
        if let Some(dir) = &self.save_images {
            let written = save_images(dir, &result)?;
            info!("已保存 {} 张图片到 {}", written.len(), dir.display());
        }
        Ok(())
    }
}
