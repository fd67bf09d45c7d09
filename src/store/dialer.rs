use async_trait::async_trait;

use crate::store::error::ConnectionError;
use crate::store::events::EventSink;
use crate::store::options::ConnectOptions;

/// 資料庫撥號接口
///
/// 負責建立與釋放實體連接。生命週期管理器保證同一時間最多只有一個
/// `dial` 在進行，並在外層加上撥號期限。
#[cfg_attr(test, mockall::automock(type Connection = String;))]
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// 連接句柄類型
    type Connection: Send + Sync + 'static;

    /// 建立實體連接
    ///
    /// 驅動層的錯誤、斷線與重連通知應送到 `events`。
    async fn dial(
        &self,
        uri: &str,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Result<Self::Connection, ConnectionError>;

    /// 釋放實體連接
    async fn release(&self, connection: &Self::Connection) -> Result<(), ConnectionError>;
}
