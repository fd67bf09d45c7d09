use std::time::Duration;

/// 預設伺服器選擇超時
pub const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_millis(8000);
/// 預設 TCP/握手超時
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(20000);
/// 預設閒置 socket 超時
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(20000);
/// 預設連接池上限
pub const DEFAULT_MAX_POOL_SIZE: u32 = 10;

/// 撥號選項
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// 等待資料庫可被選擇的時間上限
    pub server_selection_timeout: Duration,
    /// 已建立 socket 的閒置時間上限
    pub socket_timeout: Duration,
    /// TCP 連接與握手時間上限
    pub connect_timeout: Duration,
    /// 實體連接數上限
    pub max_pool_size: u32,
    /// 是否在連接後立即建立索引（生產環境關閉）
    pub auto_index: bool,
    /// 應用名稱（顯示於資料庫伺服器日誌）
    pub app_name: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            server_selection_timeout: DEFAULT_SERVER_SELECTION_TIMEOUT,
            socket_timeout: DEFAULT_SOCKET_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            auto_index: true,
            app_name: Some(env!("CARGO_PKG_NAME").to_string()),
        }
    }
}

impl ConnectOptions {
    /// 設置伺服器選擇超時
    pub fn with_server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.server_selection_timeout = timeout;
        self
    }

    /// 設置連接超時
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 設置 socket 閒置超時
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// 設置連接池大小
    pub fn with_max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = size;
        self
    }

    /// 設置是否自動建立索引
    pub fn with_auto_index(mut self, enabled: bool) -> Self {
        self.auto_index = enabled;
        self
    }

    /// 一次撥號的總期限
    ///
    /// 驅動先等伺服器可選，再做握手，兩段超時相加即為外層期限。
    pub fn dial_deadline(&self) -> Duration {
        self.server_selection_timeout + self.connect_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConnectOptions::default();
        assert_eq!(options.server_selection_timeout, Duration::from_millis(8000));
        assert_eq!(options.connect_timeout, Duration::from_millis(20000));
        assert_eq!(options.socket_timeout, Duration::from_millis(20000));
        assert_eq!(options.max_pool_size, 10);
        assert!(options.auto_index);
    }

    #[test]
    fn test_dial_deadline() {
        let options = ConnectOptions::default()
            .with_server_selection_timeout(Duration::from_millis(50))
            .with_connect_timeout(Duration::from_millis(100));
        assert_eq!(options.dial_deadline(), Duration::from_millis(150));
    }
}
