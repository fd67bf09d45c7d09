use thiserror::Error;

/// 配置驗證錯誤
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("缺少必要配置項: {0}")]
    MissingField(String),

    #[error("無效的配置值: {0}")]
    InvalidValue(String),

    #[error("配置範圍錯誤: {field} 的值 {value} 不在範圍 {min}..={max} 內")]
    RangeError {
        field: String,
        value: String,
        min: String,
        max: String,
    },
}

/// 配置驗證器trait
pub trait Validator {
    /// 驗證配置
    fn validate(&self) -> Result<(), ValidationError>;
}

/// 驗證工具函數
pub struct ValidationUtils;

impl ValidationUtils {
    /// 驗證配置值是否在指定範圍內（含上下限）
    pub fn in_range<T>(value: T, min: T, max: T, field_name: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + ToString,
    {
        if value < min || value > max {
            return Err(ValidationError::RangeError {
                field: field_name.to_string(),
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }

    /// 驗證一個選項是否為某些值中的一個
    pub fn one_of<T>(value: &T, options: &[T], field_name: &str) -> Result<(), ValidationError>
    where
        T: PartialEq + ToString,
    {
        if !options.contains(value) {
            return Err(ValidationError::InvalidValue(format!(
                "{} 的值 {} 不是有效選項: {:?}",
                field_name,
                value.to_string(),
                options.iter().map(ToString::to_string).collect::<Vec<_>>()
            )));
        }
        Ok(())
    }

    /// 檢查必要的字串欄位是否有值
    pub fn not_empty(value: &str, field_name: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field_name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range() {
        assert!(ValidationUtils::in_range(5_000u64, 100, 60_000, "store.join_timeout_ms").is_ok());
        assert!(ValidationUtils::in_range(100u64, 100, 60_000, "store.join_timeout_ms").is_ok());

        let err = ValidationUtils::in_range(0u32, 1, 500, "store.max_pool_size").unwrap_err();
        assert_eq!(
            err,
            ValidationError::RangeError {
                field: "store.max_pool_size".to_string(),
                value: "0".to_string(),
                min: "1".to_string(),
                max: "500".to_string(),
            }
        );
    }

    #[test]
    fn test_one_of() {
        let formats = vec!["pretty".to_string(), "json".to_string()];
        assert!(ValidationUtils::one_of(&"json".to_string(), &formats, "log.format").is_ok());
        assert!(ValidationUtils::one_of(&"xml".to_string(), &formats, "log.format").is_err());
    }

    #[test]
    fn test_not_empty() {
        assert!(ValidationUtils::not_empty("0.0.0.0", "server.host").is_ok());
        assert_eq!(
            ValidationUtils::not_empty("   ", "server.host"),
            Err(ValidationError::MissingField("server.host".to_string()))
        );
    }
}
