//! ログ初期化
//!
//! 標準エラーへのコンパクト出力と、日次ローテーションのファイル出力。
//! `RUST_LOG`が設定されていれば設定ファイルのレベルより優先する

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "vtrack.log";

/// ログディレクトリ（設定が無ければXDGデータディレクトリ配下）
pub fn log_directory(config: &LogConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.log_dir {
        return Ok(dir.clone());
    }

    let project_dirs = ProjectDirs::from("dev", "sifyfy", "vtrack")
        .context("Failed to get project directories")?;
    Ok(project_dirs.data_dir().join("logs"))
}

/// ロガーを初期化する。戻り値のガードはプロセス終了まで保持すること
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let (file_layer, guard) = if config.enable_file_logging {
        let dir = log_directory(config)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some((layer, dir)), Some(guard))
    } else {
        (None, None)
    };

    let log_dir = file_layer.as_ref().map(|(_, dir)| dir.clone());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer.map(|(layer, _)| layer))
        .try_init()?;

    if let Some(dir) = log_dir {
        tracing::info!("📝 Logging to {}", dir.display());
        match cleanup_old_logs(&dir, config.max_log_files as usize) {
            Ok(0) => {}
            Ok(removed) => tracing::info!("🧹 Removed {} old log files", removed),
            Err(e) => tracing::warn!("⚠️ Failed to clean up old logs: {}", e),
        }
    }

    Ok(guard)
}

/// 新しい方から`keep`個を残して古いログファイルを削除する
pub fn cleanup_old_logs(dir: &Path, keep: usize) -> Result<usize> {
    let pattern = dir.join(format!("{}.*", LOG_FILE_PREFIX));
    let pattern = pattern
        .to_str()
        .context("Log directory is not valid UTF-8")?;

    // 日付サフィックス（YYYY-MM-DD）なので名前順 = 時系列順
    let mut files: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let excess = files.len().saturating_sub(keep);
    let mut removed = 0;
    for path in files.into_iter().take(excess) {
        std::fs::remove_file(&path)
            .with_context(|| format!("Failed to remove log file: {}", path.display()))?;
        removed += 1;
    }

    Ok(removed)
}
