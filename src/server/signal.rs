use tokio::signal;
use tracing::{error, info};

/// 等待終止信號（Ctrl-C 或 SIGTERM）
///
/// 信號處理器無法註冊時，該來源永遠不會觸發。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("無法監聽 Ctrl-C 信號: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("無法監聽 SIGTERM 信號: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("接收到 Ctrl-C，正在退出..."),
        _ = terminate => info!("接收到 SIGTERM，正在退出..."),
    }
}
