use std::time::Duration;

use log::{debug, info};
use sqlx::{SqlitePool, sqlite::*};

use crate::config::StoreDir;
use crate::error::Result;

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 打开数据目录中的数据库，必要时创建并执行迁移
///
/// 记录和元数据通过外键级联删除，每个连接都开启 `foreign_keys`。
pub async fn init_db(store: &StoreDir) -> Result<Database> {
    let filename = store.database();
    info!("打开数据目录: {}", store.path().display());

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .filename(&filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    debug!("检查数据库迁移: {}", filename.display());
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}
