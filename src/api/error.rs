// ==========================================
// 物料产出测算系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换下层错误为用户可读的错误消息
// 展示层只接收 ErrorResponse { code, message }
// ==========================================

use crate::config::ConfigError;
use crate::importer::ImportError;
use crate::repository::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入与配置错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// 稳定的错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::ImportError(_) => "IMPORT_ERROR",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Database(e) => ApiError::from(RepositoryError::from(e)),
            other => ApiError::ConfigError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// ErrorResponse - 展示层错误响应
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        ErrorResponse::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_keeps_field_name() {
        let api_err: ApiError = RepositoryError::FieldValueError {
            field: "unit_price".to_string(),
            message: "不能为负数".to_string(),
        }
        .into();
        let response = ErrorResponse::from(api_err);
        assert_eq!(response.code, "INVALID_INPUT");
        assert!(response.message.contains("unit_price"));
    }

    #[test]
    fn test_not_found_mapping() {
        let api_err: ApiError = RepositoryError::not_found("Material", 42).into();
        assert_eq!(api_err.code(), "NOT_FOUND");
        assert!(api_err.to_string().contains("42"));
    }

    #[test]
    fn test_import_error_mapping_keeps_storage_codes() {
        let tx_err: ApiError =
            ImportError::DatabaseTransactionError("cannot commit".to_string()).into();
        assert_eq!(tx_err.code(), "DATABASE_TRANSACTION_ERROR");

        let lock_err: ApiError =
            ImportError::Repository(RepositoryError::LockError("poisoned".to_string())).into();
        assert_eq!(lock_err.code(), "DATABASE_CONNECTION_ERROR");

        let parse_err: ApiError = ImportError::CsvParseError("bad quote".to_string()).into();
        assert_eq!(parse_err.code(), "IMPORT_ERROR");
    }

    #[test]
    fn test_import_file_error_mapping() {
        let api_err: ApiError = ImportError::FileNotFound("a.xlsx".to_string()).into();
        assert_eq!(api_err.code(), "IMPORT_ERROR");
    }
}
