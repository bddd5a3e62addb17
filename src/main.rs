use clap::Parser;
use log::debug;

use mmsearch::Opts;
use mmsearch::cli::{self, SubCommandExtend};
use mmsearch::config::SubCommand;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opts = Opts::parse();
    debug!("{:?}", opts);

    match &opts.subcmd {
        SubCommand::Seed(config) => config.run(&opts).await,
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::AddDir(config) => config.run(&opts).await,
        SubCommand::Update(config) => config.run(&opts).await,
        SubCommand::Upsert(config) => config.run(&opts).await,
        SubCommand::Query(config) => config.run(&opts).await,
        SubCommand::Get(config) => config.run(&opts).await,
        SubCommand::Peek(config) => config.run(&opts).await,
        SubCommand::Delete(config) => config.run(&opts).await,
        SubCommand::Count => cli::count(&opts).await,
        SubCommand::List => cli::list(&opts).await,
        SubCommand::Drop(config) => config.run(&opts).await,
    }
}
