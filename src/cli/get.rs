use anyhow::Result;
use clap::Parser;

use crate::cli::{SubCommandExtend, open_client};
use crate::config::Opts;
use crate::display::{OutputFormat, print_records};
use crate::filter::{Where, WhereDocument};
use crate::record::{GetRequest, Include};

#[derive(Parser, Debug, Clone)]
pub struct GetCommand {
    /// 记录 ID，不指定时读取全部
    pub ids: Vec<String>,
    /// 元数据过滤条件
    #[arg(short = 'w', long = "where", value_name = "JSON")]
    pub filter: Option<Where>,
    /// 文本过滤条件
    #[arg(long = "where-document", value_name = "JSON")]
    pub document_filter: Option<WhereDocument>,
    /// 最多返回的记录数量
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
    /// 跳过的记录数量
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub offset: usize,
    /// 返回的字段
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [Include::Metadatas, Include::Documents, Include::Uris])]
    pub include: Vec<Include>,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl SubCommandExtend for GetCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let client = open_client(opts).await?;
        let collection = client.get_collection(&opts.collection).await?;
        let request = GetRequest {
            ids: (!self.ids.is_empty()).then(|| self.ids.clone()),
            filter: self.filter.clone(),
            document_filter: self.document_filter.clone(),
            limit: self.limit,
            offset: self.offset,
            include: self.include.clone(),
        };
        let records = collection.get(request).await?;
        print_records(&records, &self.include, self.format)
    }
}

#[derive(Parser, Debug, Clone)]
pub struct PeekCommand {
    /// 记录数量
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl SubCommandExtend for PeekCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let client = open_client(opts).await?;
        let collection = client.get_collection(&opts.collection).await?;
        let records = collection.peek(self.limit).await?;
        print_records(&records, Include::GET_DEFAULT, self.format)
    }
}
