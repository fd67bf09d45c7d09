// 模組定義
pub mod api;
pub mod config;
pub mod monitor;
pub mod server;
pub mod store;
