// monitor/logger.rs - 日誌系統初始化

use std::path::Path;

use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogConfig;
use crate::monitor::{MonitorError, MonitorResult};

/// 日誌檔名前綴
pub const LOG_FILE_PREFIX: &str = "restaurant_server.log";

/// 日誌守衛
///
/// 持有檔案輸出的背景寫入器，丟棄後未寫出的日誌會被刷新。
#[must_use = "dropping the guard stops the file writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// 解析日誌級別，未知值視為 INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // 默認為INFO
    }
}

/// 初始化日誌系統
///
/// `RUST_LOG` 存在時優先使用，否則使用配置的級別。
pub fn init_logging(log_config: &LogConfig) -> MonitorResult<LogGuard> {
    let level = parse_level(&log_config.level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let json = log_config.format.eq_ignore_ascii_case("json");
    let pretty_layer = (!json).then(|| fmt::layer().with_target(true));
    let json_layer = json.then(|| fmt::layer().json().with_current_span(false));

    let (file_layer, file_guard) = match log_config.directory.as_deref() {
        Some(dir) if !dir.trim().is_empty() => {
            std::fs::create_dir_all(Path::new(dir)).map_err(|e| {
                MonitorError::LoggerError(format!("無法創建日誌目錄 {}: {}", dir, e))
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MonitorError::InitializationError(format!("設置日誌系統失敗: {}", e)))?;

    info!(level = %level, format = %log_config.format, "日誌系統初始化完成");
    Ok(LogGuard { _file: file_guard })
}
