use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bson::doc;
use clap::Parser;
use tracing::{info, warn};

use restaurant_server::config::{ApplicationConfig, Environment};
use restaurant_server::monitor::{init_logging, install_recorder};
use restaurant_server::server::{shutdown_signal, ServerBuilder};
use restaurant_server::store::{redact, ConnectionManager, IndexDefinition, MongoDialer};

/// 餐廳服務
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// 配置檔案目錄
    #[arg(long, env = "CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// 運行環境（development 或 production）
    #[arg(long)]
    env: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化配置
    let env = args
        .env
        .as_deref()
        .map(Environment::from_name)
        .unwrap_or_else(Environment::from_env);
    let app_config = match args.config_dir.as_deref() {
        Some(dir) => ApplicationConfig::load_from(dir, env),
        None => ApplicationConfig::load(env),
    }
    .map_err(|e| anyhow!("無法載入配置: {}", e))?;

    // 初始化日誌系統，guard 需存活至程式結束
    let _log_guard = init_logging(&app_config.log)?;
    info!("配置載入完成，環境: {:?}", env);

    let metrics = match install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("無法安裝指標記錄器: {}", e);
            None
        }
    };

    let store = &app_config.store;
    if let Some(uri) = store.uri.as_deref() {
        info!("資料庫連接字串: {}", redact(uri));
    }

    let dialer = MongoDialer::new()
        .with_database(store.database.clone())
        .with_index(IndexDefinition::new("users", doc! { "email": 1 }).unique());

    let manager = Arc::new(
        ConnectionManager::builder(dialer)
            .uri(store.uri.clone())
            .options(store.connect_options())
            .join_timeout(store.join_timeout())
            .shutdown_timeout(store.shutdown_timeout())
            .build(),
    );

    let server = ServerBuilder::new()
        .with_server_config(app_config.server.clone())
        .with_manager(manager)
        .with_metrics(metrics)
        .build()?;

    let bound = server.bind().await?;
    info!("伺服器初始化完成，等待請求...");

    bound.serve_until(shutdown_signal()).await?;
    Ok(())
}
