// ==========================================
// 物料产出测算系统 - 可生产数量测算引擎
// ==========================================
// 输入: 产品类型 id、物料类型 id、可用原料数量、两个缩放参数
// 输出: 可生产的整件数（向下取整），或不可计算的原因
// ==========================================
// 公式:
//   raw_per_unit  = param1 * param2 * coefficient
//   effective_raw = raw_quantity * (1 - loss_percentage / 100)
//   quantity      = floor(effective_raw / raw_per_unit)
// ==========================================
// 红线: 不写库，只读取系数；结果仅用于展示
// ==========================================

use crate::repository::{MaterialTypeRepository, ProductTypeRepository, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// 旧接口中"不可计算"的哨兵值
pub const NOT_COMPUTABLE: i64 = -1;

// ==========================================
// YieldFactorSource - 测算系数来源
// ==========================================
/// 产品类型系数与物料类型损耗率的读取接口
///
/// 返回 Ok(None) 表示 id 不存在。
pub trait YieldFactorSource {
    fn product_type_coefficient(&self, product_type_id: i64) -> RepositoryResult<Option<f64>>;

    fn material_type_loss_percentage(&self, material_type_id: i64)
        -> RepositoryResult<Option<f64>>;
}

/// 基于 SQLite 仓储的系数来源
pub struct SqliteFactorSource {
    product_types: Arc<ProductTypeRepository>,
    material_types: Arc<MaterialTypeRepository>,
}

impl SqliteFactorSource {
    pub fn new(
        product_types: Arc<ProductTypeRepository>,
        material_types: Arc<MaterialTypeRepository>,
    ) -> Self {
        Self {
            product_types,
            material_types,
        }
    }
}

impl YieldFactorSource for SqliteFactorSource {
    fn product_type_coefficient(&self, product_type_id: i64) -> RepositoryResult<Option<f64>> {
        self.product_types.find_coefficient(product_type_id)
    }

    fn material_type_loss_percentage(
        &self,
        material_type_id: i64,
    ) -> RepositoryResult<Option<f64>> {
        self.material_types.find_loss_percentage(material_type_id)
    }
}

// ==========================================
// 请求与错误
// ==========================================

/// 单次测算请求
///
/// 类型 id 可为空（物料/产品允许没有类型），为空时按"未找到"处理。
/// param1/param2 为调用方给定的通用乘数，不假定物理含义。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldRequest {
    pub product_type_id: Option<i64>,
    pub material_type_id: Option<i64>,
    pub raw_quantity: f64,
    pub param1: f64,
    pub param2: f64,
}

/// 不可计算的原因
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YieldError {
    #[error("产品类型不存在: {product_type_id:?}")]
    ProductTypeNotFound { product_type_id: Option<i64> },

    #[error("物料类型不存在: {material_type_id:?}")]
    MaterialTypeNotFound { material_type_id: Option<i64> },

    #[error("单位产品原料消耗为 0（param1 / param2 / 系数之一为 0）")]
    DivisionByZero,

    #[error("计算结果为负: {value}")]
    NegativeResult { value: f64 },

    #[error("计算结果不是有限数值")]
    NonFinite,

    #[error("系数读取失败: {message}")]
    Storage { message: String },
}

impl YieldError {
    /// 稳定的错误代码（供展示层使用）
    pub fn code(&self) -> &'static str {
        match self {
            YieldError::ProductTypeNotFound { .. } => "PRODUCT_TYPE_NOT_FOUND",
            YieldError::MaterialTypeNotFound { .. } => "MATERIAL_TYPE_NOT_FOUND",
            YieldError::DivisionByZero => "DIVISION_BY_ZERO",
            YieldError::NegativeResult { .. } => "NEGATIVE_RESULT",
            YieldError::NonFinite => "NON_FINITE",
            YieldError::Storage { .. } => "STORAGE",
        }
    }
}

/// 纯计算部分（系数已取得）
pub fn compute_units(
    coefficient: f64,
    loss_percentage: f64,
    raw_quantity: f64,
    param1: f64,
    param2: f64,
) -> Result<u64, YieldError> {
    let raw_per_unit = param1 * param2 * coefficient;
    if raw_per_unit == 0.0 {
        return Err(YieldError::DivisionByZero);
    }

    let effective_raw = raw_quantity * (1.0 - loss_percentage / 100.0);
    let quantity = effective_raw / raw_per_unit;

    if !quantity.is_finite() {
        return Err(YieldError::NonFinite);
    }
    if quantity < 0.0 {
        return Err(YieldError::NegativeResult { value: quantity });
    }

    // 部分成品不可生产/销售：向下取整
    Ok(quantity.floor() as u64)
}

// ==========================================
// YieldCalculator - 测算引擎
// ==========================================
pub struct YieldCalculator<S>
where
    S: YieldFactorSource,
{
    source: S,
}

impl<S> YieldCalculator<S>
where
    S: YieldFactorSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// 测算可生产的整件数
    ///
    /// 先查产品类型系数，再查物料类型损耗率；任一不存在即返回对应的 NotFound。
    #[instrument(skip(self), level = "debug")]
    pub fn compute(&self, request: &YieldRequest) -> Result<u64, YieldError> {
        let coefficient = match request.product_type_id {
            Some(id) => self
                .source
                .product_type_coefficient(id)
                .map_err(|e| YieldError::Storage {
                    message: e.to_string(),
                })?,
            None => None,
        }
        .ok_or(YieldError::ProductTypeNotFound {
            product_type_id: request.product_type_id,
        })?;

        let loss_percentage = match request.material_type_id {
            Some(id) => self
                .source
                .material_type_loss_percentage(id)
                .map_err(|e| YieldError::Storage {
                    message: e.to_string(),
                })?,
            None => None,
        }
        .ok_or(YieldError::MaterialTypeNotFound {
            material_type_id: request.material_type_id,
        })?;

        let result = compute_units(
            coefficient,
            loss_percentage,
            request.raw_quantity,
            request.param1,
            request.param2,
        );

        match &result {
            Ok(units) => debug!(units, coefficient, loss_percentage, "测算完成"),
            Err(e) => debug!(code = e.code(), reason = %e, "不可计算"),
        }
        result
    }

    /// 旧接口: 成功返回件数，任何失败返回 -1
    pub fn compute_sentinel(&self, request: &YieldRequest) -> i64 {
        match self.compute(request) {
            Ok(units) => i64::try_from(units).unwrap_or(i64::MAX),
            Err(_) => NOT_COMPUTABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryError;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeFactors {
        coefficients: HashMap<i64, f64>,
        losses: HashMap<i64, f64>,
        broken: bool,
    }

    impl YieldFactorSource for FakeFactors {
        fn product_type_coefficient(&self, id: i64) -> RepositoryResult<Option<f64>> {
            if self.broken {
                return Err(RepositoryError::DatabaseQueryError("disk I/O error".to_string()));
            }
            Ok(self.coefficients.get(&id).copied())
        }

        fn material_type_loss_percentage(&self, id: i64) -> RepositoryResult<Option<f64>> {
            Ok(self.losses.get(&id).copied())
        }
    }

    fn calculator(coefficient: f64, loss: f64) -> YieldCalculator<FakeFactors> {
        let mut factors = FakeFactors::default();
        factors.coefficients.insert(1, coefficient);
        factors.losses.insert(2, loss);
        YieldCalculator::new(factors)
    }

    fn request(raw_quantity: f64, param1: f64, param2: f64) -> YieldRequest {
        YieldRequest {
            product_type_id: Some(1),
            material_type_id: Some(2),
            raw_quantity,
            param1,
            param2,
        }
    }

    #[test]
    fn test_reference_case() {
        // 2*1*5 = 10; 100*0.8 = 80; 80/10 = 8
        let calc = calculator(5.0, 20.0);
        assert_eq!(calc.compute(&request(100.0, 2.0, 1.0)), Ok(8));
        assert_eq!(calc.compute_sentinel(&request(100.0, 2.0, 1.0)), 8);
    }

    #[test]
    fn test_zero_raw_quantity_is_zero_not_sentinel() {
        let calc = calculator(5.0, 0.0);
        assert_eq!(calc.compute(&request(0.0, 2.0, 1.0)), Ok(0));
        assert_eq!(calc.compute_sentinel(&request(0.0, 2.0, 1.0)), 0);
    }

    #[test]
    fn test_truncates_partial_units() {
        // 99*0.8 = 79.2; 79.2/10 = 7.92 -> 7
        let calc = calculator(5.0, 20.0);
        assert_eq!(calc.compute(&request(99.0, 2.0, 1.0)), Ok(7));
    }

    #[test]
    fn test_zero_param_is_division_by_zero() {
        let calc = calculator(5.0, 20.0);
        assert_eq!(
            calc.compute(&request(100.0, 0.0, 1.0)),
            Err(YieldError::DivisionByZero)
        );
        assert_eq!(calc.compute_sentinel(&request(0.0, 0.0, 1.0)), NOT_COMPUTABLE);
        assert_eq!(calc.compute_sentinel(&request(100.0, 2.0, 0.0)), NOT_COMPUTABLE);
    }

    #[test]
    fn test_zero_coefficient_is_division_by_zero() {
        let calc = calculator(0.0, 20.0);
        assert_eq!(
            calc.compute(&request(100.0, 2.0, 1.0)),
            Err(YieldError::DivisionByZero)
        );
    }

    #[test]
    fn test_loss_over_hundred_goes_negative() {
        let calc = calculator(5.0, 150.0);
        let result = calc.compute(&request(100.0, 2.0, 1.0));
        assert!(matches!(result, Err(YieldError::NegativeResult { .. })));
        assert_eq!(calc.compute_sentinel(&request(100.0, 2.0, 1.0)), NOT_COMPUTABLE);
    }

    #[test]
    fn test_negative_param_goes_negative() {
        let calc = calculator(5.0, 20.0);
        assert!(matches!(
            calc.compute(&request(100.0, -2.0, 1.0)),
            Err(YieldError::NegativeResult { .. })
        ));
    }

    #[test]
    fn test_unknown_ids() {
        let calc = calculator(5.0, 20.0);

        let mut req = request(100.0, 2.0, 1.0);
        req.product_type_id = Some(99);
        assert_eq!(
            calc.compute(&req),
            Err(YieldError::ProductTypeNotFound {
                product_type_id: Some(99)
            })
        );
        assert_eq!(calc.compute_sentinel(&req), NOT_COMPUTABLE);

        let mut req = request(100.0, 2.0, 1.0);
        req.material_type_id = Some(99);
        assert_eq!(
            calc.compute(&req),
            Err(YieldError::MaterialTypeNotFound {
                material_type_id: Some(99)
            })
        );
        assert_eq!(calc.compute_sentinel(&req), NOT_COMPUTABLE);

        let mut req = request(100.0, 2.0, 1.0);
        req.material_type_id = None;
        assert_eq!(
            calc.compute(&req).unwrap_err().code(),
            "MATERIAL_TYPE_NOT_FOUND"
        );
    }

    #[test]
    fn test_product_lookup_checked_before_material() {
        let calc = calculator(5.0, 20.0);
        let req = YieldRequest {
            product_type_id: Some(99),
            material_type_id: Some(98),
            raw_quantity: 1.0,
            param1: 1.0,
            param2: 1.0,
        };
        assert_eq!(calc.compute(&req).unwrap_err().code(), "PRODUCT_TYPE_NOT_FOUND");
    }

    #[test]
    fn test_nan_input_is_non_finite() {
        let calc = calculator(5.0, 20.0);
        assert_eq!(
            calc.compute(&request(f64::NAN, 2.0, 1.0)),
            Err(YieldError::NonFinite)
        );
    }

    #[test]
    fn test_storage_failure_maps_to_storage_error() {
        let factors = FakeFactors {
            broken: true,
            ..Default::default()
        };
        let calc = YieldCalculator::new(factors);
        let err = calc.compute(&request(100.0, 2.0, 1.0)).unwrap_err();
        assert_eq!(err.code(), "STORAGE");
        assert_eq!(calc.compute_sentinel(&request(100.0, 2.0, 1.0)), NOT_COMPUTABLE);
    }
}
