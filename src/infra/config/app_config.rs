use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub realtime: RealtimeConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// When set, logs go to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_owned(),
            access_token: None,
            timeout_ms: 15_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Default TTL per cache key class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    pub conversations_ttl_secs: u64,
    pub conversation_ttl_secs: u64,
    pub messages_ttl_secs: u64,
    pub users_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            conversations_ttl_secs: 120,
            conversation_ttl_secs: 120,
            messages_ttl_secs: 60,
            users_ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn conversations_ttl(&self) -> Duration {
        Duration::from_secs(self.conversations_ttl_secs)
    }

    pub fn conversation_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_ttl_secs)
    }

    pub fn messages_ttl(&self) -> Duration {
        Duration::from_secs(self.messages_ttl_secs)
    }

    pub fn users_ttl(&self) -> Duration {
        Duration::from_secs(self.users_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Quiet period after the last keystroke before typing-stop is published.
    pub typing_debounce_ms: u64,
    /// How long a remote typing indicator survives without a refresh.
    pub typing_expiry_ms: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            typing_debounce_ms: 3_000,
            typing_expiry_ms: 3_000,
        }
    }
}

impl RealtimeConfig {
    pub fn typing_debounce(&self) -> Duration {
        Duration::from_millis(self.typing_debounce_ms)
    }

    pub fn typing_expiry(&self) -> Duration {
        Duration::from_millis(self.typing_expiry_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}
