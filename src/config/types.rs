use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::validation::{ValidationError, ValidationUtils, Validator};
use crate::store::ConnectOptions;

/// 應用程序配置結構
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub log: LogConfig,
}

impl Validator for ApplicationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證各個部分的配置
        self.server.validate()?;
        self.store.validate()?;
        self.log.validate()?;

        Ok(())
    }
}

/// 伺服器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 收到關閉信號後等待進行中請求完成的時間上限（毫秒）
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            drain_timeout_ms: 10_000,
        }
    }
}

impl Validator for ServerConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.host, "server.host")?;
        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ValidationError::InvalidValue(format!(
                "server.host 不是有效的 IP 位址: {}",
                self.host
            )));
        }
        ValidationUtils::in_range(self.drain_timeout_ms, 100, 300_000, "server.drain_timeout_ms")?;

        Ok(())
    }
}

impl ServerConfig {
    /// 等待請求完成的時間上限
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// 資料庫配置
///
/// 未設定 `uri` 時服務以降級模式運行，使用本地檔案儲存。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub server_selection_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    pub max_pool_size: u32,
    pub auto_index: bool,
    /// 加入進行中撥號時的等待預算（毫秒），與撥號超時互相獨立
    pub join_timeout_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: None,
            database: None,
            server_selection_timeout_ms: 8_000,
            connect_timeout_ms: 20_000,
            socket_timeout_ms: 20_000,
            max_pool_size: 10,
            auto_index: true,
            join_timeout_ms: 5_000,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl Validator for StoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(uri) = &self.uri {
            if !uri.trim().is_empty()
                && !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://"))
            {
                return Err(ValidationError::InvalidValue(
                    "store.uri 必須以 mongodb:// 或 mongodb+srv:// 開頭".to_string(),
                ));
            }
        }
        ValidationUtils::in_range(
            self.server_selection_timeout_ms,
            100,
            120_000,
            "store.server_selection_timeout_ms",
        )?;
        ValidationUtils::in_range(self.connect_timeout_ms, 100, 120_000, "store.connect_timeout_ms")?;
        ValidationUtils::in_range(self.socket_timeout_ms, 100, 600_000, "store.socket_timeout_ms")?;
        ValidationUtils::in_range(self.max_pool_size, 1, 500, "store.max_pool_size")?;
        ValidationUtils::in_range(self.join_timeout_ms, 100, 60_000, "store.join_timeout_ms")?;
        ValidationUtils::in_range(self.shutdown_timeout_ms, 100, 120_000, "store.shutdown_timeout_ms")?;

        Ok(())
    }
}

impl StoreConfig {
    /// 是否已配置連接字串
    pub fn is_configured(&self) -> bool {
        self.uri.as_deref().is_some_and(|uri| !uri.trim().is_empty())
    }

    /// 轉換為撥號選項
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::default()
            .with_server_selection_timeout(Duration::from_millis(self.server_selection_timeout_ms))
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .with_socket_timeout(Duration::from_millis(self.socket_timeout_ms))
            .with_max_pool_size(self.max_pool_size)
            .with_auto_index(self.auto_index)
    }

    /// 加入進行中撥號的等待預算
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// 關閉連接的時間上限
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
    /// 設定後額外輸出按日輪替的日誌檔
    pub directory: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
        }
    }
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證日誌級別
        ValidationUtils::one_of(
            &self.level.to_lowercase(),
            &["trace", "debug", "info", "warn", "error"].iter().map(|s| s.to_string()).collect::<Vec<String>>(),
            "log.level"
        )?;

        // 驗證日誌格式
        ValidationUtils::one_of(
            &self.format.to_lowercase(),
            &["pretty", "json"].iter().map(|s| s.to_string()).collect::<Vec<String>>(),
            "log.format"
        )?;

        Ok(())
    }
}
