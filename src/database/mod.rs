//! ドキュメントストア
//!
//! 4つの論理コレクション（チャンネル、統計履歴、配信、視聴者数系列）を
//! SQLiteのJSONドキュメントとして保持する

pub mod channels;
pub mod filter;
pub mod registry;
pub mod streams;
pub mod viewers;

pub use filter::RecordFilter;
pub use registry::{ChannelRegistry, StreamRegistry, ViewerSeriesStore, WriteReport};

use anyhow::Result;
use directories::ProjectDirs;
use std::path::Path;
use std::path::PathBuf;

/// vtrack用データベース接続管理
pub struct TrackerDatabase {
    pub connection: rusqlite::Connection,
    pub schema_version: u32,
}

impl TrackerDatabase {
    /// 新しいデータベース接続を作成
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let connection = rusqlite::Connection::open(db_path)?;
        let mut db = Self {
            connection,
            schema_version: 1,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// インメモリデータベースを作成（テスト用）
    pub fn new_in_memory() -> Result<Self> {
        let connection = rusqlite::Connection::open_in_memory()?;
        let mut db = Self {
            connection,
            schema_version: 1,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// データベーススキーマを初期化
    fn initialize_schema(&mut self) -> Result<()> {
        self.connection.execute_batch(include_str!("schema.sql"))?;
        tracing::info!("Database schema initialized successfully");
        Ok(())
    }
}

/// XDGデータディレクトリからデータベースパスを取得
pub fn get_database_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("dev", "sifyfy", "vtrack")
        .ok_or_else(|| anyhow::anyhow!("Failed to get project directories"))?;

    let data_dir = project_dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;

    Ok(data_dir.join("vtrack.db"))
}
