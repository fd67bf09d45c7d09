use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::store::error::ConnectionError;

/// 資料庫連接狀態
///
/// 任何時刻只會處於其中一個狀態，是就緒查詢的唯一依據。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// 未連接
    #[default]
    Disconnected,
    /// 連接中（已有擁有者正在撥號）
    Connecting,
    /// 已連接
    Connected,
    /// 斷開中
    Disconnecting,
}

impl ConnectionState {
    /// 狀態的可讀名稱
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }

    /// 狀態代碼，用於監控指標
    pub fn code(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connected => 1,
            ConnectionState::Connecting => 2,
            ConnectionState::Disconnecting => 3,
        }
    }

    /// 是否可以開始新的撥號
    pub fn can_dial(&self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Disconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 儲存模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// 使用遠端資料庫
    Store,
    /// 降級模式，使用本地檔案儲存
    Fallback,
}

/// 狀態槽：狀態、連接句柄與撥號輪次一起提交
///
/// 句柄僅在 `Connected` 時存在。
#[derive(Debug)]
pub(crate) struct StateSlot<C> {
    pub(crate) state: ConnectionState,
    pub(crate) handle: Option<Arc<C>>,
    pub(crate) episode: u64,
}

impl<C> StateSlot<C> {
    pub(crate) fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            handle: None,
            episode: 0,
        }
    }
}

/// 最近一次錯誤，直到下一次成功連接前保留
#[derive(Debug, Default)]
pub(crate) struct LastError {
    inner: std::sync::RwLock<Option<ConnectionError>>,
}

impl LastError {
    pub(crate) fn get(&self) -> Option<ConnectionError> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn set(&self, error: ConnectionError) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(error),
            Err(poisoned) => *poisoned.into_inner() = Some(error),
        }
    }

    pub(crate) fn clear(&self) {
        match self.inner.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConnectionState::Disconnected, "disconnected")]
    #[case(ConnectionState::Connecting, "connecting")]
    #[case(ConnectionState::Connected, "connected")]
    #[case(ConnectionState::Disconnecting, "disconnecting")]
    fn test_state_label(#[case] state: ConnectionState, #[case] label: &str) {
        assert_eq!(state.label(), label);
        assert_eq!(state.to_string(), label);
    }

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectionState::default().label(), "disconnected");
    }

    #[rstest]
    #[case(ConnectionState::Disconnected, 0)]
    #[case(ConnectionState::Connected, 1)]
    #[case(ConnectionState::Connecting, 2)]
    #[case(ConnectionState::Disconnecting, 3)]
    fn test_state_code(#[case] state: ConnectionState, #[case] code: u8) {
        assert_eq!(state.code(), code);
    }

    #[test]
    fn test_can_dial() {
        assert!(ConnectionState::Disconnected.can_dial());
        assert!(ConnectionState::Disconnecting.can_dial());
        assert!(!ConnectionState::Connecting.can_dial());
        assert!(!ConnectionState::Connected.can_dial());
    }

    #[test]
    fn test_last_error_set_and_clear() {
        let last = LastError::default();
        assert!(last.get().is_none());

        last.set(ConnectionError::unreachable("connection refused"));
        assert!(last.get().is_some());

        last.clear();
        assert!(last.get().is_none());
    }
}
