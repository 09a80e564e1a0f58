// ==========================================
// 物料产出测算系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体与写入校验
// 红线: 不含数据访问逻辑,不含计算逻辑
// ==========================================

pub mod material;
pub mod product;
pub mod validation;

// 重导出核心类型
pub use material::{
    Material, MaterialFields, MaterialSummary, MaterialType, MaterialTypeOption, NewMaterialType,
};
pub use product::{NewProduct, NewProductType, Product, ProductMaterial, ProductType, ProductUsage};
pub use validation::{Validate, ValidationError};
