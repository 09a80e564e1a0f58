// ==========================================
// 物料产出测算系统 - 产品与配方领域模型
// ==========================================
// 对齐: ProductTypes / Products / ProductMaterials 表
// 关系: Product N↔N Material，边上携带单位产品需求量
// ==========================================

use crate::domain::validation::{require_finite, require_text, Validate, ValidationError};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductType - 产品类型
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductType {
    pub id: i64,
    pub name: String,
    pub coefficient: f64, // 产品类型系数
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductType {
    pub name: String,
    pub coefficient: f64,
}

impl Validate for NewProductType {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_finite("coefficient", self.coefficient)?;
        Ok(())
    }
}

// ==========================================
// Product - 产品
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub article: String, // 货号，全局唯一
    pub min_partner_price: f64,
    pub type_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub article: String,
    pub min_partner_price: f64,
    pub type_id: Option<i64>,
}

impl Validate for NewProduct {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("article", &self.article)?;
        require_finite("min_partner_price", self.min_partner_price)?;
        Ok(())
    }
}

// ==========================================
// ProductMaterial - 配方边
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMaterial {
    pub product_id: i64,
    pub material_id: i64,
    pub required_quantity: f64, // 单位产品所需该物料数量
}

impl Validate for ProductMaterial {
    fn validate(&self) -> Result<(), ValidationError> {
        require_finite("required_quantity", self.required_quantity)
    }
}

// ==========================================
// ProductUsage - 消耗某物料的产品（Product ⨝ ProductMaterials ⨝ ProductTypes）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUsage {
    pub product_id: i64,
    pub product_name: String,
    pub product_type_id: i64,
    pub required_quantity: f64,
    pub coefficient: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_article_rejected() {
        let p = NewProduct {
            name: "Плитка".to_string(),
            article: "".to_string(),
            min_partner_price: 100.0,
            type_id: None,
        };
        assert_eq!(p.validate().unwrap_err().field, "article");
    }

    #[test]
    fn test_nan_required_quantity_rejected() {
        let edge = ProductMaterial {
            product_id: 1,
            material_id: 1,
            required_quantity: f64::NAN,
        };
        assert_eq!(edge.validate().unwrap_err().field, "required_quantity");
    }
}
