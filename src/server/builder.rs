use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api::{rest::build_app, AppState};
use crate::config::types::ServerConfig;
use crate::server::{ServerError, ServerResult, ServerState};
use crate::store::{ConnectionManager, Dialer};

/// 伺服器實例
///
/// 尚未監聽任何埠，需透過 [`Server::bind`] 完成啟動順序。
pub struct Server<D: Dialer> {
    /// 伺服器狀態
    state: Arc<RwLock<ServerState>>,
    /// 監聽位址
    addr: SocketAddr,
    /// 等待進行中請求的期限
    drain_timeout: Duration,
    /// 資料庫連接管理器
    manager: Arc<ConnectionManager<D>>,
    /// HTTP 應用
    app: Router,
}

impl<D: Dialer> Server<D> {
    /// 獲取伺服器狀態句柄
    pub fn state_handle(&self) -> Arc<RwLock<ServerState>> {
        self.state.clone()
    }

    /// 設定的監聽位址
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// 連接資料庫後綁定監聽埠
    ///
    /// 連接失敗不會中止啟動，伺服器以降級模式繼續運行。
    pub async fn bind(self) -> ServerResult<BoundServer<D>> {
        info!("啟動伺服器...");
        *self.state.write().await = ServerState::Initializing;

        match self.manager.connect_configured().await {
            Some(_) => info!("資料庫已就緒"),
            None => warn!(
                state = self.manager.state_label(),
                "資料庫不可用，以降級模式啟動"
            ),
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        *self.state.write().await = ServerState::Running;
        info!("伺服器正在監聽 {}", local_addr);

        Ok(BoundServer {
            state: self.state,
            listener,
            local_addr,
            drain_timeout: self.drain_timeout,
            manager: self.manager,
            app: self.app,
        })
    }
}

/// 已綁定監聽埠的伺服器
pub struct BoundServer<D: Dialer> {
    state: Arc<RwLock<ServerState>>,
    listener: TcpListener,
    local_addr: SocketAddr,
    drain_timeout: Duration,
    manager: Arc<ConnectionManager<D>>,
    app: Router,
}

impl<D: Dialer> BoundServer<D> {
    /// 實際監聽位址
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 獲取伺服器狀態句柄
    pub fn state_handle(&self) -> Arc<RwLock<ServerState>> {
        self.state.clone()
    }

    /// 資料庫連接管理器
    pub fn manager(&self) -> &Arc<ConnectionManager<D>> {
        &self.manager
    }

    /// 接受請求直到 `shutdown` 完成，然後優雅關閉
    ///
    /// 關閉順序：停止接受新連接，在 `drain_timeout` 內等待進行中的請求，
    /// 最後關閉資料庫連接。
    pub async fn serve_until<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let BoundServer {
            state,
            listener,
            drain_timeout,
            manager,
            app,
            ..
        } = self;

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut serving = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let exited_early = tokio::select! {
            result = &mut serving => Some(result),
            _ = shutdown => None,
        };

        *state.write().await = ServerState::ShuttingDown;

        let outcome = match exited_early {
            Some(result) => {
                error!("HTTP 服務意外結束");
                flatten(result)
            }
            None => {
                info!("正在關閉伺服器...");
                let _ = stop_tx.send(());
                drain(serving, drain_timeout).await
            }
        };

        manager.close().await;

        *state.write().await = ServerState::Stopped;
        info!("伺服器已關閉");

        outcome
    }
}

/// 在期限內等待進行中的請求完成，超時則強制中止
async fn drain(
    mut serving: JoinHandle<std::io::Result<()>>,
    drain_timeout: Duration,
) -> ServerResult<()> {
    match tokio::time::timeout(drain_timeout, &mut serving).await {
        Ok(result) => flatten(result),
        Err(_) => {
            warn!(
                timeout_ms = drain_timeout.as_millis() as u64,
                "等待進行中請求超時，強制關閉"
            );
            serving.abort();
            Ok(())
        }
    }
}

fn flatten(result: Result<std::io::Result<()>, tokio::task::JoinError>) -> ServerResult<()> {
    match result {
        Ok(inner) => inner.map_err(ServerError::from),
        Err(e) => Err(ServerError::Runtime(format!("HTTP 服務任務失敗: {}", e))),
    }
}

/// 伺服器構建器
pub struct ServerBuilder<D: Dialer> {
    /// 伺服器配置
    server_config: Option<ServerConfig>,
    /// 資料庫連接管理器
    manager: Option<Arc<ConnectionManager<D>>>,
    /// 外部資源路由
    routes: Router<AppState>,
    /// 指標輸出句柄
    metrics: Option<PrometheusHandle>,
}

impl<D: Dialer> Default for ServerBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Dialer> ServerBuilder<D> {
    /// 創建新的伺服器構建器
    pub fn new() -> Self {
        Self {
            server_config: None,
            manager: None,
            routes: Router::new(),
            metrics: None,
        }
    }

    /// 設置伺服器配置
    pub fn with_server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = Some(config);
        self
    }

    /// 設置資料庫連接管理器
    pub fn with_manager(mut self, manager: Arc<ConnectionManager<D>>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// 合併外部資源路由
    pub fn with_routes(mut self, routes: Router<AppState>) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// 設置指標輸出句柄
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// 構建伺服器實例
    pub fn build(self) -> ServerResult<Server<D>> {
        let config = self.server_config.unwrap_or_default();
        let manager = self
            .manager
            .ok_or_else(|| ServerError::Config("未設置資料庫連接管理器".to_string()))?;

        let host: IpAddr = config
            .host
            .parse()
            .map_err(|e| ServerError::Config(format!("無效的主機位址 {}: {}", config.host, e)))?;
        let addr = SocketAddr::new(host, config.port);

        let state = AppState::new(manager.clone()).with_metrics(self.metrics);
        let app = build_app(state, self.routes);

        Ok(Server {
            state: Arc::new(RwLock::new(ServerState::Initializing)),
            addr,
            drain_timeout: config.drain_timeout(),
            manager,
            app,
        })
    }
}
