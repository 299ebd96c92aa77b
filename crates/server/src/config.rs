use adapter::{RemoteConfig, StoreConfig};
use config::ConfigError;
use serde::Deserialize;
use std::{collections::HashMap, time::Duration};

const ENV_PREFIX: &str = "QUILL_";

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    pub comments: CommentSettings,
}

#[derive(Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: String,
    // 等待写 worker 返回结果的上限
    pub submit_timeout_secs: u64,
}

#[derive(Deserialize, Clone)]
pub struct CommentSettings {
    /// 评论集合所在的 blob key
    pub key: String,
}

#[derive(Deserialize, Clone)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StoreSettings {
    Sqlite { url: String },
    File { dir: String },
    Remote {
        base_url: String,
        token: String,
        #[serde(default = "default_remote_timeout_secs")]
        timeout_secs: u64,
    },
    Memory,
}

// 一次提交最多三个请求（list、下载、上传），默认值保证落在默认提交超时之内
fn default_remote_timeout_secs() -> u64 {
    3
}

impl From<StoreSettings> for StoreConfig {
    fn from(s: StoreSettings) -> Self {
        match s {
            StoreSettings::Sqlite { url } => StoreConfig::Sqlite { url },
            StoreSettings::File { dir } => StoreConfig::File { dir: dir.into() },
            StoreSettings::Remote {
                base_url,
                token,
                timeout_secs,
            } => StoreConfig::Remote(RemoteConfig {
                base_url,
                token,
                timeout: Duration::from_secs(timeout_secs),
            }),
            StoreSettings::Memory => StoreConfig::Memory,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        let env_map = collect_env_vars(std::env::vars());
        let env_json =
            serde_json::to_string(&env_map).map_err(|e| ConfigError::Foreign(Box::new(e)))?;

        let s = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.cors_origins", "*")?
            .set_default("server.submit_timeout_secs", 10)?
            .set_default("store.mode", "sqlite")?
            .set_default("store.url", "sqlite://data/quill.db")?
            .set_default("comments.key", storage::DEFAULT_COMMENTS_KEY)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false))
            .add_source(config::File::from_str(&env_json, config::FileFormat::Json))
            .build()?;

        s.try_deserialize()
    }
}

/// `QUILL_STORE__MODE=file` → `store.mode = "file"`
fn collect_env_vars(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
    vars.filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .map(|(k, v)| {
            let new_key = k
                .trim_start_matches(ENV_PREFIX)
                .replace("__", ".")
                .to_lowercase();
            (new_key, v)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_prefixed_env_vars_to_dotted_keys() {
        let vars = vec![
            ("QUILL_STORE__MODE".to_string(), "file".to_string()),
            ("QUILL_SERVER__PORT".to_string(), "8080".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let map = collect_env_vars(vars.into_iter());
        assert_eq!(map.len(), 2);
        assert_eq!(map["store.mode"], "file");
        assert_eq!(map["server.port"], "8080");
    }

    #[test]
    fn store_mode_selects_backend() {
        let remote: StoreSettings = serde_json::from_value(serde_json::json!({
            "mode": "remote",
            "base_url": "https://blob.example.com",
            "token": "t",
            "url": "sqlite://ignored.db",
        }))
        .unwrap();
        assert!(matches!(
            StoreConfig::from(remote),
            StoreConfig::Remote(RemoteConfig { ref base_url, timeout, .. })
                if base_url == "https://blob.example.com" && timeout == Duration::from_secs(3)
        ));

        let file: StoreSettings =
            serde_json::from_value(serde_json::json!({ "mode": "file", "dir": "data/blobs" }))
                .unwrap();
        assert!(matches!(StoreConfig::from(file), StoreConfig::File { .. }));
    }
}
