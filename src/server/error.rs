use std::net::SocketAddr;

use thiserror::Error;

/// 伺服器錯誤類型
#[derive(Error, Debug)]
pub enum ServerError {
    /// 配置錯誤
    #[error("配置錯誤: {0}")]
    Config(String),

    /// 無法綁定監聽位址
    #[error("無法綁定 {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// IO 錯誤
    #[error("IO 錯誤: {0}")]
    Io(#[from] std::io::Error),

    /// 運行時錯誤
    #[error("運行時錯誤: {0}")]
    Runtime(String),
}

/// 伺服器結果類型別名
pub type ServerResult<T> = Result<T, ServerError>;
