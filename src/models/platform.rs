use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 監視対象プラットフォーム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Twitch,
    Bilibili,
    Twitcasting,
    Mildom,
    Twitter,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Youtube,
        Platform::Twitch,
        Platform::Bilibili,
        Platform::Twitcasting,
        Platform::Mildom,
        Platform::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitch => "twitch",
            Platform::Bilibili => "bilibili",
            Platform::Twitcasting => "twitcasting",
            Platform::Mildom => "mildom",
            Platform::Twitter => "twitter",
        }
    }

    /// 合成IDに使うプレフィックス（`"<prefix><roomId>_<epoch>"`）
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Platform::Youtube => "yt",
            Platform::Twitch => "ttv",
            Platform::Bilibili => "bl",
            Platform::Twitcasting => "tc",
            Platform::Mildom => "md",
            Platform::Twitter => "tw",
        }
    }

    /// ルーム/ユーザーIDと開始時刻から配信IDを合成
    pub fn synthesize_stream_id(&self, room_id: &str, start_epoch: i64) -> String {
        format!("{}{}_{}", self.id_prefix(), room_id, start_epoch)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trips_through_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
        assert!("niconico".parse::<Platform>().is_err());
    }

    #[test]
    fn test_synthesized_ids() {
        assert_eq!(
            Platform::Bilibili.synthesize_stream_id("21434", 1_700_000_000),
            "bl21434_1700000000"
        );
        assert_eq!(
            Platform::Mildom.synthesize_stream_id("10038", 42),
            "md10038_42"
        );
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Twitcasting).unwrap();
        assert_eq!(json, "\"twitcasting\"");
    }
}
