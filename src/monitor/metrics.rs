// monitor/metrics.rs - 連接相關監控指標

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::monitor::{MonitorError, MonitorResult};
use crate::store::ConnectionState;

/// 實體撥號次數
pub const DIAL_ATTEMPTS_TOTAL: &str = "store_dial_attempts_total";
/// 撥號失敗次數，以錯誤種類為標籤
pub const DIAL_FAILURES_TOTAL: &str = "store_dial_failures_total";
/// 連接狀態代碼（0 未連接、1 已連接、2 連接中、3 斷開中）
pub const CONNECTION_STATE: &str = "store_connection_state";

/// 安裝 Prometheus 記錄器並註冊指標說明
pub fn install_recorder() -> MonitorResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MonitorError::MetricsError(format!("無法安裝指標記錄器: {}", e)))?;
    describe_metrics();
    Ok(handle)
}

/// 註冊指標說明
pub fn describe_metrics() {
    describe_counter!(DIAL_ATTEMPTS_TOTAL, "Number of physical store dials started");
    describe_counter!(DIAL_FAILURES_TOTAL, "Number of failed store dials by kind");
    describe_gauge!(CONNECTION_STATE, "Current store connection state code");
}

/// 記錄一次撥號
pub fn record_dial_attempt() {
    counter!(DIAL_ATTEMPTS_TOTAL).increment(1);
}

/// 記錄一次撥號失敗
pub fn record_dial_failure(kind: &'static str) {
    counter!(DIAL_FAILURES_TOTAL, "kind" => kind).increment(1);
}

/// 記錄當前連接狀態
pub fn record_state(state: ConnectionState) {
    gauge!(CONNECTION_STATE).set(f64::from(state.code()));
}
