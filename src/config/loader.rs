use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment as ConfigEnvironment, File};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::types::ApplicationConfig;
use crate::config::validation::Validator;

/// 環境變數前綴
pub const ENV_PREFIX: &str = "RESTAURANT";

/// 環境類型枚舉
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// 從環境變數取得當前環境設定
    ///
    /// 優先讀取 `RESTAURANT_ENV`，其次 `NODE_ENV`，預設為開發環境。
    pub fn from_env() -> Self {
        let name = env::var("RESTAURANT_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_else(|_| "development".into());
        Self::from_name(&name)
    }

    /// 從名稱解析
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    /// 轉換為配置文件名
    pub fn as_filename(&self) -> &'static str {
        match self {
            Environment::Development => "development.toml",
            Environment::Production => "production.toml",
        }
    }

    /// 是否為生產類環境
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// 配置加載器，負責根據環境加載適當的配置
///
/// 優先級由低到高：內建預設值、環境配置文件、`RESTAURANT__` 前綴的環境變數、
/// 單名環境變數（`MONGO_URI`、`MONGO_TIMEOUT_MS`、`MONGO_POOL`、`PORT`）。
pub struct ConfigLoader;

impl ConfigLoader {
    /// 配置目錄，來自 `CONFIG_DIR`，預設為 `config`
    pub fn config_dir() -> PathBuf {
        PathBuf::from(env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into()))
    }

    /// 從指定目錄載入配置
    pub fn load_from(config_dir: &Path, env: Environment) -> Result<Config, ConfigError> {
        let config_path = config_dir.join(env.as_filename());

        let mut config_builder = Self::with_defaults(Config::builder(), env)?;

        // 加載環境特定配置，文件不存在時只使用預設值
        config_builder = config_builder.add_source(File::from(config_path).required(false));

        // 從環境變數加載配置（優先級高於文件配置）
        config_builder = config_builder.add_source(
            ConfigEnvironment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        config_builder = Self::with_legacy_overrides(config_builder)?;

        // 構建最終配置
        config_builder.build()
    }

    fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
        env: Environment,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000_i64)?
            .set_default("server.drain_timeout_ms", 10_000_i64)?
            .set_default("store.server_selection_timeout_ms", 8_000_i64)?
            .set_default("store.connect_timeout_ms", 20_000_i64)?
            .set_default("store.socket_timeout_ms", 20_000_i64)?
            .set_default("store.max_pool_size", 10_i64)?
            .set_default("store.auto_index", !env.is_production())?
            .set_default("store.join_timeout_ms", 5_000_i64)?
            .set_default("store.shutdown_timeout_ms", 10_000_i64)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")
    }

    fn with_legacy_overrides(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_override_option("store.uri", env::var("MONGO_URI").ok())?
            .set_override_option("store.server_selection_timeout_ms", numeric_var("MONGO_TIMEOUT_MS"))?
            .set_override_option("store.max_pool_size", numeric_var("MONGO_POOL"))?
            .set_override_option("server.port", numeric_var("PORT"))
    }
}

fn numeric_var(name: &str) -> Option<i64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("環境變數 {} 不是有效數字，已忽略: {}", name, raw);
            None
        }
    }
}

/// ApplicationConfig 加載方法實現
impl ApplicationConfig {
    /// 從指定環境加載配置
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        Self::load_from(&ConfigLoader::config_dir(), env)
    }

    /// 從指定目錄與環境加載配置
    pub fn load_from(config_dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        let config_source = ConfigLoader::load_from(config_dir, env)?;

        // 使用 serde 反序列化配置
        let app_config: ApplicationConfig = config_source.try_deserialize()?;

        // 驗證失敗只記錄警告
        if let Err(err) = app_config.validate() {
            warn!("配置驗證失敗: {}", err);
        } else {
            debug!("配置驗證通過");
        }

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const LEGACY_VARS: [&str; 5] = ["MONGO_URI", "MONGO_TIMEOUT_MS", "MONGO_POOL", "PORT", "RESTAURANT__STORE__DATABASE"];

    fn clear_env() {
        for name in LEGACY_VARS {
            env::remove_var(name);
        }
        env::remove_var("RESTAURANT_ENV");
        env::remove_var("NODE_ENV");
        env::remove_var("CONFIG_DIR");
    }

    #[test]
    #[serial]
    fn test_environment_from_env() {
        clear_env();
        assert_eq!(Environment::from_env(), Environment::Development);

        env::set_var("NODE_ENV", "production");
        assert_eq!(Environment::from_env(), Environment::Production);

        env::set_var("RESTAURANT_ENV", "development");
        assert_eq!(Environment::from_env(), Environment::Development);

        clear_env();
    }

    #[test]
    fn test_environment_as_filename() {
        assert_eq!(Environment::Development.as_filename(), "development.toml");
        assert_eq!(Environment::Production.as_filename(), "production.toml");
    }

    #[test]
    #[serial]
    fn test_defaults_without_config_file() {
        clear_env();
        let dir = TempDir::new().unwrap();

        let config = ApplicationConfig::load_from(dir.path(), Environment::Development).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.store.uri.is_none());
        assert!(config.store.auto_index);
        assert_eq!(config.store.join_timeout_ms, 5_000);
        assert_eq!(config.log.level, "info");

        let config = ApplicationConfig::load_from(dir.path(), Environment::Production).unwrap();
        assert!(!config.store.auto_index);
    }

    #[test]
    #[serial]
    fn test_file_then_env_overrides() {
        clear_env();
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("development.toml"),
            r#"
[server]
port = 4100

[store]
uri = "mongodb://file:pw@localhost:27017/menu"
max_pool_size = 4
"#,
        )
        .unwrap();

        let config = ApplicationConfig::load_from(dir.path(), Environment::Development).unwrap();
        assert_eq!(config.server.port, 4100);
        assert_eq!(config.store.max_pool_size, 4);
        assert_eq!(
            config.store.uri.as_deref(),
            Some("mongodb://file:pw@localhost:27017/menu")
        );

        env::set_var("MONGO_URI", "mongodb://env:pw@db:27017/menu");
        env::set_var("MONGO_POOL", "12");
        env::set_var("MONGO_TIMEOUT_MS", "6000");
        env::set_var("PORT", "8080");
        env::set_var("RESTAURANT__STORE__DATABASE", "orders");

        let config = ApplicationConfig::load_from(dir.path(), Environment::Development).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.max_pool_size, 12);
        assert_eq!(config.store.server_selection_timeout_ms, 6000);
        assert_eq!(config.store.uri.as_deref(), Some("mongodb://env:pw@db:27017/menu"));
        assert_eq!(config.store.database.as_deref(), Some("orders"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_uses_config_dir_from_env() {
        clear_env();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("production.toml"), "[server]\nport = 4200\n").unwrap();
        env::set_var("CONFIG_DIR", dir.path());

        let config = ApplicationConfig::load(Environment::Production).unwrap();
        assert_eq!(config.server.port, 4200);
        assert!(!config.store.auto_index);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_numeric_override_is_ignored() {
        clear_env();
        let dir = TempDir::new().unwrap();
        env::set_var("MONGO_POOL", "many");

        let config = ApplicationConfig::load_from(dir.path(), Environment::Development).unwrap();
        assert_eq!(config.store.max_pool_size, 10);

        clear_env();
    }
}
