// store.rs - 資料庫連接模組，宣告子模組
//
// 負責遠端資料庫連接的完整生命週期：
// - 連接狀態與就緒查詢
// - 併發撥號協調與有限等待
// - 連接字串密碼遮蔽
// - 連接事件通知

/// 撥號接口
pub mod dialer;
/// 連接錯誤
pub mod error;
/// 連接事件通知
pub mod events;
/// 生命週期管理器
pub mod lifecycle;
/// MongoDB 撥號實現
pub mod mongo;
/// 撥號選項
pub mod options;
/// 密碼遮蔽
pub mod redact;
/// 連接狀態
pub mod state;

pub use dialer::Dialer;
pub use error::ConnectionError;
pub use events::{ConnectionEvent, EventSink};
pub use lifecycle::{ConnectionHandle, ConnectionManager, ConnectionManagerBuilder};
pub use mongo::{IndexDefinition, MongoConnection, MongoDialer};
pub use options::ConnectOptions;
pub use redact::redact;
pub use state::{ConnectionState, StorageMode};

/// 就緒狀態查詢接口
///
/// 提供給路由層使用，讀取不會阻塞也不會改變狀態。
pub trait Readiness: Send + Sync + 'static {
    /// 當前連接狀態
    fn state(&self) -> ConnectionState;

    /// 是否已連接
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// 當前狀態名稱
    fn state_label(&self) -> &'static str {
        self.state().label()
    }
}
