use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{
    ApiConfig, AppConfig, CacheConfig, LogConfig, RealtimeConfig, SessionConfig,
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub api: Option<FileApiConfig>,
    pub cache: Option<FileCacheConfig>,
    pub realtime: Option<FileRealtimeConfig>,
    pub session: Option<FileSessionConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(api) = self.api {
            api.merge_into(&mut config.api);
        }

        if let Some(cache) = self.cache {
            cache.merge_into(&mut config.cache);
        }

        if let Some(realtime) = self.realtime {
            realtime.merge_into(&mut config.realtime);
        }

        if let Some(session) = self.session {
            session.merge_into(&mut config.session);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileApiConfig {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl FileApiConfig {
    fn merge_into(self, config: &mut ApiConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(access_token) = self.access_token {
            config.access_token = Some(access_token);
        }

        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileCacheConfig {
    pub conversations_ttl_secs: Option<u64>,
    pub conversation_ttl_secs: Option<u64>,
    pub messages_ttl_secs: Option<u64>,
    pub users_ttl_secs: Option<u64>,
}

impl FileCacheConfig {
    fn merge_into(self, config: &mut CacheConfig) {
        if let Some(secs) = self.conversations_ttl_secs {
            config.conversations_ttl_secs = secs;
        }

        if let Some(secs) = self.conversation_ttl_secs {
            config.conversation_ttl_secs = secs;
        }

        if let Some(secs) = self.messages_ttl_secs {
            config.messages_ttl_secs = secs;
        }

        if let Some(secs) = self.users_ttl_secs {
            config.users_ttl_secs = secs;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileRealtimeConfig {
    pub typing_debounce_ms: Option<u64>,
    pub typing_expiry_ms: Option<u64>,
}

impl FileRealtimeConfig {
    fn merge_into(self, config: &mut RealtimeConfig) {
        if let Some(ms) = self.typing_debounce_ms {
            config.typing_debounce_ms = ms;
        }

        if let Some(ms) = self.typing_expiry_ms {
            config.typing_expiry_ms = ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSessionConfig {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

impl FileSessionConfig {
    fn merge_into(self, config: &mut SessionConfig) {
        if let Some(user_id) = self.user_id {
            config.user_id = Some(user_id);
        }

        if let Some(user_name) = self.user_name {
            config.user_name = Some(user_name);
        }
    }
}
