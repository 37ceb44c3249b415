use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use vtrack::{
    config::ConfigManager,
    database::{get_database_path, TrackerDatabase},
    logging,
    platforms::build_platforms,
    scheduler::tracker_scheduler,
    TaskContext, TaskKind, TrackerConfig,
};

/// 配信・チャンネル統計トラッカー
#[derive(Parser, Debug)]
#[command(name = "vtrack")]
#[command(about = "Tracks live streams and channel statistics across platforms")]
#[command(version)]
struct Args {
    /// 設定ファイル（省略時はXDG設定ディレクトリのconfig.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// スケジューラーを起動（Ctrl+Cで終了）
    Run,
    /// 指定タスクを1回だけ実行
    Once {
        #[arg(value_enum)]
        task: TaskKind,
    },
    /// 設定ファイルのパスを表示
    ConfigPath,
}

fn config_manager(args: &Args) -> Result<ConfigManager> {
    match &args.config {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    }
}

fn open_database(config: &TrackerConfig) -> Result<TrackerDatabase> {
    let path = match &config.database.path {
        Some(path) => path.clone(),
        None => get_database_path()?,
    };
    tracing::info!("🗄️ Database: {}", path.display());
    TrackerDatabase::new(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let manager = config_manager(&args)?;

    if let Command::ConfigPath = args.command {
        println!("{}", manager.config_path().display());
        return Ok(());
    }

    let config = manager.load_config()?;

    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = logging::init_logging(&config.log)?;

    config.validate().context("Invalid configuration")?;
    tracing::info!(
        "🎬 Starting vtrack ({} channels on {:?})",
        config.channels.len(),
        config.tracked_platforms()
    );

    let db = Arc::new(Mutex::new(open_database(&config)?));
    let platforms = build_platforms(&config)?;
    let ctx = Arc::new(TaskContext::new(db, platforms, &config));

    match args.command {
        Command::Once { task } => {
            let summary = ctx.run(task).await;
            tracing::info!("✅ {} finished: {}", task, summary);
            println!("{}: {}", task, summary);
        }
        Command::Run => {
            let scheduler = tracker_scheduler(ctx, &config);
            scheduler
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("❌ Failed to listen for Ctrl+C: {}", e);
                    }
                    tracing::info!("🛑 Received shutdown signal");
                })
                .await;
        }
        Command::ConfigPath => {}
    }

    tracing::info!("👋 vtrack shutting down");
    Ok(())
}
