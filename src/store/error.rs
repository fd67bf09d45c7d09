use thiserror::Error;

/// 資料庫連接錯誤
///
/// 這些錯誤都由生命週期管理器在本地處理，轉換為 `Disconnected` 狀態
/// 加上記錄的最近錯誤，不會以 `Err` 形式傳給呼叫者。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// 撥號超過配置的超時時間
    #[error("連接超時: {elapsed_ms}ms 內未能連上資料庫")]
    DialTimeout { elapsed_ms: u64 },

    /// 網路、認證或驅動錯誤
    #[error("無法連接資料庫: {0}")]
    Unreachable(String),

    /// 連接字串無法解析
    #[error("無效的連接字串: {0}")]
    InvalidUri(String),

    /// 等待他人撥號的時間超過預算
    #[error("等待進行中的連接超時: {waited_ms}ms")]
    WaitBudgetExceeded { waited_ms: u64 },

    /// 釋放連接時出錯
    #[error("關閉連接失敗: {0}")]
    Teardown(String),
}

impl ConnectionError {
    /// 建立無法連接錯誤
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    /// 建立無效連接字串錯誤
    pub fn invalid_uri(message: impl Into<String>) -> Self {
        Self::InvalidUri(message.into())
    }

    /// 建立關閉失敗錯誤
    pub fn teardown(message: impl Into<String>) -> Self {
        Self::Teardown(message.into())
    }

    /// 錯誤種類，用於日誌欄位與指標標籤
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DialTimeout { .. } => "dial_timeout",
            Self::Unreachable(_) => "unreachable",
            Self::InvalidUri(_) => "invalid_uri",
            Self::WaitBudgetExceeded { .. } => "wait_budget_exceeded",
            Self::Teardown(_) => "teardown",
        }
    }

    /// 是否為超時類錯誤
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::DialTimeout { .. } | Self::WaitBudgetExceeded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(ConnectionError::DialTimeout { elapsed_ms: 10 }.kind(), "dial_timeout");
        assert_eq!(ConnectionError::unreachable("x").kind(), "unreachable");
        assert_eq!(ConnectionError::invalid_uri("x").kind(), "invalid_uri");
        assert_eq!(ConnectionError::teardown("x").kind(), "teardown");
    }

    #[test]
    fn test_is_timeout() {
        assert!(ConnectionError::DialTimeout { elapsed_ms: 5000 }.is_timeout());
        assert!(ConnectionError::WaitBudgetExceeded { waited_ms: 5000 }.is_timeout());
        assert!(!ConnectionError::unreachable("refused").is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = ConnectionError::DialTimeout { elapsed_ms: 8000 };
        assert!(err.to_string().contains("8000ms"));
    }
}
