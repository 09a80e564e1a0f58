// ==========================================
// 物料产出测算系统 - 物料领域模型
// ==========================================
// 对齐: MaterialTypes / Materials 表
// ==========================================

use crate::domain::validation::{
    require_finite, require_non_negative, require_text, Validate, ValidationError,
};
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialType - 物料类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialType {
    pub id: i64,
    pub name: String,
    pub loss_percentage: f64, // 加工损耗百分比（不强制 [0,100]）
}

/// 新建物料类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterialType {
    pub name: String,
    pub loss_percentage: f64,
}

impl Validate for NewMaterialType {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_finite("loss_percentage", self.loss_percentage)?;
        Ok(())
    }
}

/// 物料类型下拉选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialTypeOption {
    pub id: i64,
    pub name: String,
}

// ==========================================
// MaterialFields - 物料可变字段（新增/修改共用）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialFields {
    pub name: String,
    pub type_id: Option<i64>,    // 可为空：物料可以没有类型
    pub unit_price: f64,         // 单价，>= 0
    pub stock_quantity: f64,     // 库存数量（单位见 unit_of_measure）
    pub min_quantity: f64,       // 最低库存，>= 0
    pub package_quantity: f64,   // 每包装数量
    pub unit_of_measure: String, // 计量单位，如 "kg"、"m"
}

impl Validate for MaterialFields {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_non_negative("unit_price", self.unit_price)?;
        require_finite("stock_quantity", self.stock_quantity)?;
        require_non_negative("min_quantity", self.min_quantity)?;
        require_finite("package_quantity", self.package_quantity)?;
        require_text("unit_of_measure", &self.unit_of_measure)?;
        Ok(())
    }
}

// ==========================================
// Material - 物料完整记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub name: String,
    pub type_id: Option<i64>,
    pub unit_price: f64,
    pub stock_quantity: f64,
    pub min_quantity: f64,
    pub package_quantity: f64,
    pub unit_of_measure: String,
}

impl Material {
    /// 拆出可变字段（用于编辑回填）
    pub fn fields(&self) -> MaterialFields {
        MaterialFields {
            name: self.name.clone(),
            type_id: self.type_id,
            unit_price: self.unit_price,
            stock_quantity: self.stock_quantity,
            min_quantity: self.min_quantity,
            package_quantity: self.package_quantity,
            unit_of_measure: self.unit_of_measure.clone(),
        }
    }
}

// ==========================================
// MaterialSummary - 物料列表行（含汇总需求量）
// ==========================================
/// 用于列表展示与测算入口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSummary {
    pub id: i64,
    pub name: String,
    pub type_name: Option<String>,
    pub stock_quantity: f64,
    pub min_quantity: f64,
    pub required_quantity: f64, // 所有产品配方中该物料需求量之和（无配方为 0）
    pub type_id: Option<i64>,
    pub below_minimum: bool, // stock_quantity < min_quantity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> MaterialFields {
        MaterialFields {
            name: "Глина красная".to_string(),
            type_id: Some(1),
            unit_price: 12.5,
            stock_quantity: 300.0,
            min_quantity: 50.0,
            package_quantity: 25.0,
            unit_of_measure: "кг".to_string(),
        }
    }

    #[test]
    fn test_valid_fields() {
        assert!(sample_fields().validate().is_ok());
    }

    #[test]
    fn test_negative_price_names_field() {
        let mut fields = sample_fields();
        fields.unit_price = -1.0;
        assert_eq!(fields.validate().unwrap_err().field, "unit_price");
    }

    #[test]
    fn test_negative_min_quantity_names_field() {
        let mut fields = sample_fields();
        fields.min_quantity = -5.0;
        assert_eq!(fields.validate().unwrap_err().field, "min_quantity");
    }

    #[test]
    fn test_blank_unit_rejected() {
        let mut fields = sample_fields();
        fields.unit_of_measure = " ".to_string();
        assert_eq!(fields.validate().unwrap_err().field, "unit_of_measure");
    }

    #[test]
    fn test_negative_stock_allowed() {
        // 库存只要求有限值（盘亏场景）
        let mut fields = sample_fields();
        fields.stock_quantity = -3.0;
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn test_loss_percentage_out_of_range_allowed() {
        let t = NewMaterialType {
            name: "Пигмент".to_string(),
            loss_percentage: 120.0,
        };
        assert!(t.validate().is_ok());
    }
}
