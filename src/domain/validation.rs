// ==========================================
// 物料产出测算系统 - 写入值校验
// ==========================================
// 职责: 写入前的值约束校验，错误中必须指明违反的字段
// 说明: 与表上的 CHECK 约束一致；数据库约束作为最后一道防线
// ==========================================

use thiserror::Error;

/// 字段值校验错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("字段 {field} 校验失败: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// 写入草稿的校验接口
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// 文本必填（去除首尾空白后不能为空）
pub fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "不能为空"));
    }
    Ok(())
}

/// 实数必须为有限值（拒绝 NaN / inf）
pub fn require_finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new(field, format!("必须为有限数值，实际 {}", value)));
    }
    Ok(())
}

/// 实数必须为有限值且 >= 0
pub fn require_non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::new(field, format!("不能为负数，实际 {}", value)));
    }
    Ok(())
}
