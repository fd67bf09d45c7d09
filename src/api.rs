// api.rs - API服務模組，宣告子模組
//
// 只包含啟動層需要的接口：
// - 健康檢查（就緒與存活探針）
// - 監控指標輸出
// 資源路由由外部路由層提供，透過 `ServerBuilder::with_routes` 合併。

/// HTTP 應用構建
pub mod rest;
/// API路由定義
pub mod routes;
/// API處理器模組
pub mod handlers;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::store::{Readiness, StorageMode};

/// 路由共享狀態
#[derive(Clone)]
pub struct AppState {
    readiness: Arc<dyn Readiness>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// 創建新的共享狀態
    pub fn new(readiness: Arc<dyn Readiness>) -> Self {
        Self {
            readiness,
            metrics: None,
        }
    }

    /// 設置指標輸出句柄
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// 資料庫就緒狀態
    pub fn readiness(&self) -> &dyn Readiness {
        self.readiness.as_ref()
    }

    /// 目前的儲存模式，路由層據此決定是否走降級路徑
    pub fn storage_mode(&self) -> StorageMode {
        if self.readiness.is_ready() {
            StorageMode::Store
        } else {
            StorageMode::Fallback
        }
    }

    /// 指標輸出句柄
    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }
}
