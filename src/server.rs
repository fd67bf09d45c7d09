// server.rs - 伺服器核心組件，宣告子模組
//
// 伺服器模組負責啟動順序與優雅關閉：
// - 先嘗試連接資料庫，無論結果如何再開始接受請求
// - 收到終止信號後停止接受新請求，在期限內等待進行中的請求
// - 最後關閉資料庫連接

/// 伺服器構建器實現
pub mod builder;
/// 伺服器級別錯誤處理
pub mod error;
/// 終止信號
pub mod signal;

// 重新導出核心組件，簡化外部使用
pub use crate::config::types::ServerConfig;
pub use builder::{BoundServer, Server, ServerBuilder};
pub use error::{ServerError, ServerResult};
pub use signal::shutdown_signal;

/// 伺服器狀態枚舉
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// 正在連接資料庫
    Initializing,
    /// 正在接受請求
    Running,
    /// 正在關閉
    ShuttingDown,
    /// 已停止
    Stopped,
}
