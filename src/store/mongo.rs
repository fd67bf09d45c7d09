//! MongoDB 撥號實現
//!
//! 使用官方驅動建立客戶端，撥號完成前以 `ping` 確認伺服器可用。
//! 連接建立後啟動心跳任務，把斷線與重連轉換為連接事件。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::error::{Error as DriverError, ErrorKind};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::dialer::Dialer;
use crate::store::error::ConnectionError;
use crate::store::events::{ConnectionEvent, EventSink};
use crate::store::options::ConnectOptions;
use crate::store::redact::redact;

/// 連接字串未指定資料庫時使用的名稱
pub const DEFAULT_DATABASE: &str = "restaurant";
/// 預設心跳間隔
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// 索引定義
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    /// 集合名稱
    pub collection: String,
    /// 索引鍵
    pub keys: Document,
    /// 是否唯一
    pub unique: bool,
}

impl IndexDefinition {
    /// 建立索引定義
    pub fn new(collection: impl Into<String>, keys: Document) -> Self {
        Self {
            collection: collection.into(),
            keys,
            unique: false,
        }
    }

    /// 設為唯一索引
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// 已建立的 MongoDB 連接
///
/// 驅動自帶連接池，句柄以唯讀方式共享給所有請求處理器。
pub struct MongoConnection {
    client: Client,
    database: Database,
    heartbeat: JoinHandle<()>,
}

impl MongoConnection {
    /// 底層客戶端
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// 目前使用的資料庫
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// 資料庫名稱
    pub fn database_name(&self) -> &str {
        self.database.name()
    }

    /// 取得型別化集合
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.database.collection(name)
    }

    /// ping 伺服器
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        let started = Instant::now();
        ping(&self.database).await.map_err(|e| classify(e, started))
    }
}

impl Drop for MongoConnection {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

/// MongoDB 撥號器
#[derive(Debug, Clone)]
pub struct MongoDialer {
    database: Option<String>,
    indexes: Vec<IndexDefinition>,
    heartbeat_interval: Duration,
}

impl Default for MongoDialer {
    fn default() -> Self {
        Self::new()
    }
}

impl MongoDialer {
    /// 創建新的撥號器
    pub fn new() -> Self {
        Self {
            database: None,
            indexes: Vec::new(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// 指定資料庫名稱，覆蓋連接字串中的預設資料庫
    pub fn with_database(mut self, database: Option<String>) -> Self {
        self.database = database.filter(|d| !d.trim().is_empty());
        self
    }

    /// 註冊連接後需要建立的索引
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// 設置心跳間隔
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// 已註冊的索引
    pub fn indexes(&self) -> &[IndexDefinition] {
        &self.indexes
    }

    /// 把撥號選項套用到驅動選項
    fn apply_options(&self, client_options: &mut ClientOptions, options: &ConnectOptions) {
        client_options.server_selection_timeout = Some(options.server_selection_timeout);
        client_options.connect_timeout = Some(options.connect_timeout);
        // mongodb 2.x 沒有 socket 超時選項，以連接池閒置上限代替
        client_options.max_idle_time = Some(options.socket_timeout);
        client_options.max_pool_size = Some(options.max_pool_size);
        if client_options.app_name.is_none() {
            client_options.app_name = options.app_name.clone();
        }
    }

    /// 選擇資料庫
    fn select_database(&self, client: &Client) -> Database {
        match &self.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        }
    }

    /// 建立已註冊的索引，失敗不影響連接
    async fn build_indexes(&self, database: &Database) {
        for index in &self.indexes {
            let options = IndexOptions::builder().unique(index.unique).build();
            let model = IndexModel::builder()
                .keys(index.keys.clone())
                .options(options)
                .build();

            match database
                .collection::<Document>(&index.collection)
                .create_index(model, None)
                .await
            {
                Ok(result) => debug!(
                    collection = %index.collection,
                    index = %result.index_name,
                    "索引已建立"
                ),
                Err(e) => warn!(
                    collection = %index.collection,
                    "建立索引失敗: {}",
                    redact(&e.to_string())
                ),
            }
        }
    }
}

#[async_trait]
impl Dialer for MongoDialer {
    type Connection = MongoConnection;

    async fn dial(
        &self,
        uri: &str,
        options: &ConnectOptions,
        events: EventSink,
    ) -> Result<MongoConnection, ConnectionError> {
        let started = Instant::now();
        let mut client_options = ClientOptions::parse(uri)
            .await
            .map_err(|e| ConnectionError::invalid_uri(redact(&e.to_string())))?;
        self.apply_options(&mut client_options, options);

        let client = Client::with_options(client_options)
            .map_err(|e| classify(e, started))?;
        let database = self.select_database(&client);

        if let Err(e) = ping(&database).await {
            let err = classify(e, started);
            client.shutdown().await;
            return Err(err);
        }

        if options.auto_index && !self.indexes.is_empty() {
            info!(count = self.indexes.len(), "建立資料庫索引");
            self.build_indexes(&database).await;
        }

        let heartbeat = spawn_heartbeat(database.clone(), events, self.heartbeat_interval);

        Ok(MongoConnection {
            client,
            database,
            heartbeat,
        })
    }

    async fn release(&self, connection: &MongoConnection) -> Result<(), ConnectionError> {
        connection.heartbeat.abort();
        connection.client.clone().shutdown().await;
        Ok(())
    }
}

async fn ping(database: &Database) -> Result<(), DriverError> {
    database
        .run_command(doc! { "ping": 1 }, None)
        .await
        .map(|_| ())
}

/// 把驅動錯誤轉換為連接錯誤
fn classify(err: DriverError, started: Instant) -> ConnectionError {
    match *err.kind {
        ErrorKind::ServerSelection { .. } => ConnectionError::DialTimeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        },
        ErrorKind::InvalidArgument { .. } => ConnectionError::invalid_uri(redact(&err.to_string())),
        _ => ConnectionError::unreachable(redact(&err.to_string())),
    }
}

/// 啟動心跳任務
///
/// 只在健康狀態改變時發出事件：失敗時發出 `Error` 與 `Disconnected`，
/// 恢復時發出 `Reconnected`。
fn spawn_heartbeat(database: Database, events: EventSink, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let mut healthy = true;
        loop {
            ticker.tick().await;
            match ping(&database).await.map_err(|e| classify(e, Instant::now())) {
                Ok(()) if !healthy => {
                    healthy = true;
                    events.emit(ConnectionEvent::Reconnected);
                }
                Ok(()) => {}
                Err(e) if healthy => {
                    healthy = false;
                    events.emit(ConnectionEvent::Error(e));
                    events.emit(ConnectionEvent::Disconnected);
                }
                Err(e) => debug!("心跳仍失敗: {}", e),
            }
        }
    })
}
