/// 配置管理模組
///
/// 本模組負責加載與驗證系統配置。
/// 支持從開發與生產兩種環境中加載不同的配置，並允許環境變數覆蓋。
// 宣告子模組
pub mod loader;
pub mod types;
pub mod validation;

// 重新導出常用組件
pub use loader::{ConfigLoader, Environment};
pub use types::*;
pub use validation::{ValidationError, ValidationUtils, Validator};
