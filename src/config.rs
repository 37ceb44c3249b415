//! 設定管理モジュール
//!
//! XDGディレクトリ（または`--config`で指定したパス）のTOMLファイルを読み込む。
//! ファイルが無ければデフォルト設定で起動する

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{ApiKey, ApiKeyRotator};
use crate::engine::ReconcilePolicy;
use crate::error::{TrackerError, TrackerResult};
use crate::models::{Platform, TrackedChannel};

/// データベース設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Noneの場合はXDGデータディレクトリ
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// ログ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ログレベル (trace/debug/info/warn/error)
    pub log_level: String,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
    /// 保存するログファイル数上限
    pub max_log_files: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            log_level: "info".to_string(),
            enable_file_logging: true,
            max_log_files: 30,
        }
    }
}

/// 突き合わせ設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// 何回連続で見えなければ終了扱いにするか（1 = 即時）
    pub missing_polls_before_past: u32,
    /// 予定時刻からこの秒数を過ぎた予定枠は期限切れ
    pub upcoming_expiry_secs: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let policy = ReconcilePolicy::default();
        Self {
            missing_polls_before_past: policy.missing_polls_before_past,
            upcoming_expiry_secs: policy.upcoming_expiry_secs,
        }
    }
}

impl From<&ReconcileConfig> for ReconcilePolicy {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            missing_polls_before_past: config.missing_polls_before_past,
            upcoming_expiry_secs: config.upcoming_expiry_secs,
        }
    }
}

/// スケジューラー設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// ロック取得を諦めずにスキップする回数（超えたら強制取得）
    pub lock_max_retries: u32,
    /// ファンアウト時の開始間隔
    pub pacing_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_max_retries: 3,
            pacing_delay_ms: 250,
            request_timeout_secs: 15,
        }
    }
}

/// タスクごとの実行間隔（秒）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub heartbeat_secs: u64,
    pub discovery_secs: u64,
    pub channel_stats_secs: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 60,
            discovery_secs: 180,
            channel_stats_secs: 3600,
        }
    }
}

/// プラットフォームの認証情報
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// APIキー/アクセストークン（複数ならローテーション）
    pub api_keys: Vec<String>,
    /// TwitchのClient-Id
    pub client_id: Option<String>,
    pub key_rotate_secs: u64,
    /// 強制ローテーションの最短間隔
    pub force_rotate_debounce_secs: u64,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            client_id: None,
            key_rotate_secs: 3600,
            force_rotate_debounce_secs: 30,
        }
    }
}

impl Credentials {
    pub fn rotator(&self) -> TrackerResult<ApiKeyRotator> {
        if self.api_keys.is_empty() {
            return Err(TrackerError::config("api_keys must not be empty"));
        }
        Ok(ApiKeyRotator::new(
            self.api_keys.iter().map(ApiKey::new).collect(),
            Duration::from_secs(self.key_rotate_secs),
            Duration::from_secs(self.force_rotate_debounce_secs),
        ))
    }

    pub fn require_client_id(&self) -> TrackerResult<String> {
        self.client_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TrackerError::config("client_id is required"))
    }
}

/// トラッカー設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub intervals: IntervalConfig,

    #[serde(default)]
    pub youtube: Credentials,

    #[serde(default)]
    pub twitch: Credentials,

    #[serde(default)]
    pub twitcasting: Credentials,

    #[serde(default)]
    pub twitter: Credentials,

    /// 監視対象チャンネル
    #[serde(default)]
    pub channels: Vec<TrackedChannel>,
}

impl TrackerConfig {
    /// 監視対象があるプラットフォームの認証情報と間隔を検証する
    pub fn validate(&self) -> TrackerResult<()> {
        let intervals = [
            ("heartbeat_secs", self.intervals.heartbeat_secs),
            ("discovery_secs", self.intervals.discovery_secs),
            ("channel_stats_secs", self.intervals.channel_stats_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(TrackerError::config(format!(
                "intervals.{} must be greater than 0",
                name
            )));
        }

        for platform in self.tracked_platforms() {
            let credentials = match platform {
                Platform::Youtube => &self.youtube,
                Platform::Twitch => &self.twitch,
                Platform::Twitcasting => &self.twitcasting,
                Platform::Twitter => &self.twitter,
                Platform::Bilibili | Platform::Mildom => continue,
            };
            if credentials.api_keys.is_empty() {
                return Err(TrackerError::config(format!(
                    "[{}] api_keys must not be empty",
                    platform
                )));
            }
            if platform == Platform::Twitch {
                credentials.require_client_id()?;
            }
        }

        let mut seen = std::collections::HashSet::new();
        for channel in &self.channels {
            if channel.id.trim().is_empty() || channel.group.trim().is_empty() {
                return Err(TrackerError::config(format!(
                    "[{}] channel id and group must not be empty",
                    channel.platform
                )));
            }
            if !seen.insert((channel.platform, channel.id.clone())) {
                return Err(TrackerError::config(format!(
                    "[{}] duplicate channel '{}'",
                    channel.platform, channel.id
                )));
            }
        }

        Ok(())
    }

    /// 監視対象のあるプラットフォーム（`Platform::ALL`の順）
    pub fn tracked_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.channels.iter().any(|c| c.platform == *p))
            .collect()
    }

    /// Twitchのログイン名は小文字で比較される
    fn normalize(&mut self) {
        for channel in &mut self.channels {
            if channel.platform == Platform::Twitch {
                channel.id = channel.id.to_lowercase();
            }
        }
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDGディレクトリの設定ファイルを使う
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        // 設定ディレクトリを作成（存在しない場合）
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(Self { config_path })
    }

    /// 指定したファイルを使う（`--config`）
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "sifyfy", "vtrack")
            .context("Failed to get project directories")?;

        let config_file = project_dirs.config_dir().join("config.toml");
        debug!("Config file path: {}", config_file.display());

        Ok(config_file)
    }

    /// 設定を読み込み
    pub fn load_config(&self) -> Result<TrackerConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(TrackerConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let mut config: TrackerConfig = toml::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;
        config.normalize();

        info!(
            "✅ Configuration loaded from: {} ({} channels)",
            self.config_path.display(),
            config.channels.len()
        );

        Ok(config)
    }

    /// 設定を保存
    pub fn save_config(&self, config: &TrackerConfig) -> Result<()> {
        let config_content =
            toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());
        Ok(())
    }

    /// 設定ファイルパスを取得
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}
