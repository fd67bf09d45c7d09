//! 連接事件通知
//!
//! 驅動層的錯誤、斷線與重連通知統一送入一個有界通道，
//! 由管理器建構時啟動的唯一監聽任務消費。監聽任務只更新最近錯誤與日誌，
//! 不會驅動狀態轉換。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::store::error::ConnectionError;
use crate::store::state::LastError;

/// 通知通道容量
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 連接事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// 已連接
    Connected { target: String },
    /// 連接錯誤
    Error(ConnectionError),
    /// 連接已斷開
    Disconnected,
    /// 斷線後重新連上
    Reconnected,
}

/// 事件發送端
///
/// 通道滿時丟棄事件並記錄日誌，發送方永遠不會被阻塞。
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ConnectionEvent>,
}

impl EventSink {
    /// 建立通道，返回發送端與接收端
    pub fn channel() -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// 發送事件
    pub fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.tx.try_send(event) {
            debug!("連接事件未送達: {}", e);
        }
    }
}

/// 啟動事件監聽任務
///
/// 所有發送端被丟棄後任務自然結束。
pub(crate) fn spawn_listener(
    mut rx: mpsc::Receiver<ConnectionEvent>,
    last_error: Arc<LastError>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ConnectionEvent::Connected { target } => {
                    info!(uri = %target, "資料庫已連接");
                }
                ConnectionEvent::Error(err) => {
                    error!(kind = err.kind(), "資料庫錯誤: {}", err);
                    last_error.set(err);
                }
                ConnectionEvent::Disconnected => {
                    warn!("資料庫連接已斷開");
                }
                ConnectionEvent::Reconnected => {
                    info!("資料庫已重新連接");
                }
            }
        }
        debug!("連接事件監聽任務結束");
    })
}
