//! 資料庫連接生命週期管理
//!
//! 管理器持有連接狀態與連接句柄，是唯一可以改變狀態的組件：
//!
//! ```text
//! Disconnected --connect(成功)--> Connecting --> Connected
//! Disconnected --connect(失敗)--> Connecting --> Disconnected（記錄錯誤）
//! Connected    --close()--------> Disconnecting --> Disconnected
//! ```
//!
//! 每次 `Disconnected -> Connecting` 開啟一個新的撥號輪次，同一輪次只有一個
//! 撥號擁有者；其他呼叫者在有限時間內等待該輪次的結果。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::monitor::metrics as store_metrics;
use crate::store::dialer::Dialer;
use crate::store::error::ConnectionError;
use crate::store::events::{self, ConnectionEvent, EventSink};
use crate::store::options::ConnectOptions;
use crate::store::redact::redact;
use crate::store::state::{ConnectionState, LastError, StateSlot, StorageMode};
use crate::store::Readiness;

/// 加入進行中撥號時的預設等待預算
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(5000);
/// 關閉連接的預設時間上限
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(10000);

/// 連接句柄
pub type ConnectionHandle<D> = Arc<<D as Dialer>::Connection>;

/// 呼叫者在 `connect` 時扮演的角色
enum Role<C> {
    /// 已連接，直接返回現有句柄
    Ready(Option<Arc<C>>),
    /// 其他呼叫者正在撥號
    Waiter,
    /// 本次呼叫負責撥號
    Owner(u64),
}

/// 撥號輪次守衛
///
/// 擁有者的 future 在提交結果前被丟棄時，把該輪次退回 `Disconnected`，
/// 避免狀態永遠停在 `Connecting`。
struct EpisodeGuard<'a, C> {
    slot: &'a watch::Sender<StateSlot<C>>,
    episode: u64,
    armed: bool,
}

impl<C> EpisodeGuard<'_, C> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C> Drop for EpisodeGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let episode = self.episode;
        let reset = self.slot.send_if_modified(|slot| {
            if slot.state == ConnectionState::Connecting && slot.episode == episode {
                slot.state = ConnectionState::Disconnected;
                slot.handle = None;
                true
            } else {
                false
            }
        });
        if reset {
            warn!(episode, "撥號在完成前被取消，狀態退回未連接");
            store_metrics::record_state(ConnectionState::Disconnected);
        }
    }
}

/// 連接生命週期管理器
pub struct ConnectionManager<D: Dialer> {
    dialer: D,
    uri: Option<String>,
    options: ConnectOptions,
    join_timeout: Duration,
    shutdown_timeout: Duration,
    slot: watch::Sender<StateSlot<D::Connection>>,
    last_error: Arc<LastError>,
    events: EventSink,
    dial_attempts: AtomicU64,
    listener: JoinHandle<()>,
}

impl<D: Dialer> ConnectionManager<D> {
    /// 以預設設定建立管理器
    ///
    /// 必須在 tokio 執行環境中呼叫，事件監聽任務在此時啟動且只啟動一次。
    pub fn new(dialer: D) -> Self {
        ConnectionManagerBuilder::new(dialer).build()
    }

    /// 建立構建器
    pub fn builder(dialer: D) -> ConnectionManagerBuilder<D> {
        ConnectionManagerBuilder::new(dialer)
    }

    /// 使用建構時配置的連接字串與選項連接
    pub async fn connect_configured(&self) -> Option<ConnectionHandle<D>> {
        self.connect(self.uri.as_deref(), None).await
    }

    /// 連接資料庫
    ///
    /// 永遠不會返回錯誤：失敗時狀態回到 `Disconnected`，錯誤記錄在
    /// [`last_error`](Self::last_error)，並返回 `None`。
    /// 未提供連接字串時視為降級模式，不撥號也不記錄錯誤。
    pub async fn connect(
        &self,
        uri: Option<&str>,
        options: Option<&ConnectOptions>,
    ) -> Option<ConnectionHandle<D>> {
        let uri = match uri.map(str::trim).filter(|u| !u.is_empty()) {
            Some(uri) => uri,
            None => {
                warn!("未設定資料庫連接字串，以無資料庫模式啟動（使用檔案降級儲存）");
                return None;
            }
        };
        let options = options.unwrap_or(&self.options);

        let mut role = Role::Waiter;
        let transitioned = self.slot.send_if_modified(|slot| {
            if slot.state.can_dial() {
                slot.state = ConnectionState::Connecting;
                slot.episode += 1;
                role = Role::Owner(slot.episode);
                true
            } else {
                if slot.state == ConnectionState::Connected {
                    role = Role::Ready(slot.handle.clone());
                }
                false
            }
        });
        if transitioned {
            store_metrics::record_state(ConnectionState::Connecting);
        }

        match role {
            Role::Ready(handle) => {
                debug!("已連接資料庫，沿用現有連接");
                handle
            }
            Role::Waiter => self.join_in_flight().await,
            Role::Owner(episode) => self.dial(uri, options, episode).await,
        }
    }

    /// 等待進行中的撥號
    async fn join_in_flight(&self) -> Option<ConnectionHandle<D>> {
        info!("資料庫連接進行中，等待結果...");
        let mut rx = self.slot.subscribe();
        let started = Instant::now();

        let outcome = match timeout(
            self.join_timeout,
            rx.wait_for(|slot| slot.state != ConnectionState::Connecting),
        )
        .await
        {
            Ok(Ok(slot)) => slot.handle.clone(),
            Ok(Err(_)) => None,
            Err(_) => {
                let err = ConnectionError::WaitBudgetExceeded {
                    waited_ms: started.elapsed().as_millis() as u64,
                };
                warn!(kind = err.kind(), "{}", err);
                None
            }
        };
        outcome
    }

    /// 作為擁有者撥號並提交結果
    async fn dial(
        &self,
        uri: &str,
        options: &ConnectOptions,
        episode: u64,
    ) -> Option<ConnectionHandle<D>> {
        let mut guard = EpisodeGuard {
            slot: &self.slot,
            episode,
            armed: true,
        };
        let redacted = redact(uri);
        self.dial_attempts.fetch_add(1, Ordering::SeqCst);
        store_metrics::record_dial_attempt();
        info!(uri = %redacted, episode, "連接資料庫");

        let started = Instant::now();
        let deadline = options.dial_deadline();
        let outcome = match timeout(deadline, self.dialer.dial(uri, options, self.events.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::DialTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        };
        guard.disarm();

        match outcome {
            Ok(connection) => {
                let handle = Arc::new(connection);
                let last_error = &self.last_error;
                let committed = self.slot.send_if_modified(|slot| {
                    if slot.state == ConnectionState::Connecting && slot.episode == episode {
                        last_error.clear();
                        slot.state = ConnectionState::Connected;
                        slot.handle = Some(handle.clone());
                        true
                    } else {
                        false
                    }
                });

                if committed {
                    store_metrics::record_state(ConnectionState::Connected);
                    info!(
                        uri = %redacted,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "資料庫連接成功 (state={})",
                        ConnectionState::Connected
                    );
                    self.events.emit(ConnectionEvent::Connected { target: redacted });
                    Some(handle)
                } else {
                    warn!(uri = %redacted, "撥號完成時連接已被關閉，釋放新建立的連接");
                    if let Err(e) = self.dialer.release(&handle).await {
                        warn!("釋放多餘連接失敗: {}", e);
                    }
                    None
                }
            }
            Err(err) => {
                let last_error = &self.last_error;
                let recorded = err.clone();
                let reverted = self.slot.send_if_modified(|slot| {
                    if slot.state == ConnectionState::Connecting && slot.episode == episode {
                        last_error.set(recorded);
                        slot.state = ConnectionState::Disconnected;
                        slot.handle = None;
                        true
                    } else {
                        false
                    }
                });
                if reverted {
                    store_metrics::record_state(ConnectionState::Disconnected);
                } else {
                    self.last_error.set(err.clone());
                }
                store_metrics::record_dial_failure(err.kind());

                error!(uri = %redacted, kind = err.kind(), "連接資料庫失敗: {}", err);
                warn!("繼續以無資料庫模式運行（使用檔案降級儲存）");
                None
            }
        }
    }

    /// 關閉連接
    ///
    /// 已經是未連接時不做任何事。關閉失敗只記錄日誌，不會阻止行程退出。
    pub async fn close(&self) {
        let mut taken = None;
        let closing = self.slot.send_if_modified(|slot| match slot.state {
            ConnectionState::Connected | ConnectionState::Connecting => {
                slot.state = ConnectionState::Disconnecting;
                taken = slot.handle.take();
                true
            }
            ConnectionState::Disconnected | ConnectionState::Disconnecting => false,
        });
        if !closing {
            debug!("資料庫未連接，略過關閉");
            return;
        }
        store_metrics::record_state(ConnectionState::Disconnecting);

        if let Some(handle) = taken {
            match timeout(self.shutdown_timeout, self.dialer.release(&handle)).await {
                Ok(Ok(())) => info!("資料庫連接已關閉"),
                Ok(Err(e)) => {
                    error!(kind = e.kind(), "關閉資料庫連接失敗: {}", e);
                    self.last_error.set(e);
                }
                Err(_) => {
                    let e = ConnectionError::teardown(format!(
                        "{}ms 內未完成",
                        self.shutdown_timeout.as_millis()
                    ));
                    warn!("關閉資料庫連接超時: {}", e);
                    self.last_error.set(e);
                }
            }
        }

        let finished = self.slot.send_if_modified(|slot| {
            if slot.state == ConnectionState::Disconnecting {
                slot.state = ConnectionState::Disconnected;
                true
            } else {
                false
            }
        });
        if finished {
            store_metrics::record_state(ConnectionState::Disconnected);
        }
        self.events.emit(ConnectionEvent::Disconnected);
    }

    /// 當前狀態
    pub fn state(&self) -> ConnectionState {
        self.slot.borrow().state
    }

    /// 是否已連接
    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// 當前狀態名稱
    pub fn state_label(&self) -> &'static str {
        self.state().label()
    }

    /// 當前連接句柄，僅在已連接時存在
    pub fn handle(&self) -> Option<ConnectionHandle<D>> {
        self.slot.borrow().handle.clone()
    }

    /// 最近一次錯誤
    pub fn last_error(&self) -> Option<ConnectionError> {
        self.last_error.get()
    }

    /// 已開始的實體撥號次數
    pub fn dial_attempts(&self) -> u64 {
        self.dial_attempts.load(Ordering::SeqCst)
    }

    /// 目前的儲存模式
    pub fn storage_mode(&self) -> StorageMode {
        if self.is_ready() {
            StorageMode::Store
        } else {
            StorageMode::Fallback
        }
    }

    /// 訂閱狀態變化
    ///
    /// 轉發任務在返回的接收端被丟棄或管理器被丟棄時結束。
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        let (tx, rx) = watch::channel(self.state());
        let mut source = self.slot.subscribe();
        tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    _ = tx.closed() => false,
                    result = source.changed() => result.is_ok(),
                };
                if !changed {
                    break;
                }
                let state = source.borrow_and_update().state;
                tx.send_if_modified(|current| {
                    if *current == state {
                        false
                    } else {
                        *current = state;
                        true
                    }
                });
            }
        });
        rx
    }

    /// 建構時配置的連接字串（已遮蔽密碼）
    pub fn redacted_uri(&self) -> Option<String> {
        self.uri.as_deref().map(redact)
    }

    /// 撥號器
    pub fn dialer(&self) -> &D {
        &self.dialer
    }
}

impl<D: Dialer> Readiness for ConnectionManager<D> {
    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }
}

impl<D: Dialer> Drop for ConnectionManager<D> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// 管理器構建器
pub struct ConnectionManagerBuilder<D: Dialer> {
    dialer: D,
    uri: Option<String>,
    options: ConnectOptions,
    join_timeout: Duration,
    shutdown_timeout: Duration,
}

impl<D: Dialer> ConnectionManagerBuilder<D> {
    /// 創建新的構建器
    pub fn new(dialer: D) -> Self {
        Self {
            dialer,
            uri: None,
            options: ConnectOptions::default(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// 設置連接字串，空白字串視為未設定
    pub fn uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri.filter(|u| !u.trim().is_empty());
        self
    }

    /// 設置撥號選項
    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// 設置加入進行中撥號的等待預算
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// 設置關閉連接的時間上限
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// 構建管理器並啟動事件監聽任務
    pub fn build(self) -> ConnectionManager<D> {
        let (slot, _) = watch::channel(StateSlot::new());
        let last_error = Arc::new(LastError::default());
        let (sink, rx) = EventSink::channel();
        let listener = events::spawn_listener(rx, last_error.clone());
        store_metrics::record_state(ConnectionState::Disconnected);

        ConnectionManager {
            dialer: self.dialer,
            uri: self.uri,
            options: self.options,
            join_timeout: self.join_timeout,
            shutdown_timeout: self.shutdown_timeout,
            slot,
            last_error,
            events: sink,
            dial_attempts: AtomicU64::new(0),
            listener,
        }
    }
}
