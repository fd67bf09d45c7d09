/// 系統處理器（健康檢查、指標）
pub mod system;
