// monitor.rs - 監控系統模組

pub mod logger;
pub mod metrics;

// 重新導出常用元素，使其可直接從 monitor 模組使用
pub use logger::{init_logging, LogGuard};
pub use self::metrics::install_recorder;

/// 監控系統錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 指標收集錯誤
    #[error("Metrics error: {0}")]
    MetricsError(String),

    /// 日誌記錄錯誤
    #[error("Logger error: {0}")]
    LoggerError(String),

    /// 初始化錯誤
    #[error("Initialization error: {0}")]
    InitializationError(String),
}

/// 監控結果類型
pub type MonitorResult<T> = Result<T, MonitorError>;
