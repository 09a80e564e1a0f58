// ==========================================
// 物料产出测算系统 - 产出测算 API
// ==========================================
// 职责:
// - 单次测算（带原因的结果 / 旧 -1 哨兵接口）
// - 按物料逐产品测算: 每个消耗该物料的产品使用自己的产品类型，
//   物料类型与库存取自物料本身
// 红线: 测算结果只用于展示，不落库
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{CalcDefaults, ConfigManager};
use crate::engine::{SqliteFactorSource, YieldCalculator, YieldError, YieldRequest};
use crate::perf::PerfGuard;
use crate::repository::{MaterialRepository, ProductRepository};

/// 单个产品的测算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductYieldEstimate {
    pub product_id: i64,
    pub product_name: String,
    pub product_type_id: i64,
    pub required_quantity: f64,
    pub coefficient: f64,
    /// 可生产件数；不可计算时为 None，原因见 error
    pub quantity: Option<u64>,
    pub error: Option<YieldError>,
}

/// 按物料的测算汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialYieldEstimate {
    pub material_id: i64,
    pub material_name: String,
    pub material_type_id: Option<i64>,
    pub raw_quantity: f64,
    pub param1: f64,
    pub param2: f64,
    pub products: Vec<ProductYieldEstimate>,
}

// ==========================================
// YieldApi - 产出测算 API
// ==========================================
pub struct YieldApi {
    calculator: YieldCalculator<SqliteFactorSource>,
    material_repo: Arc<MaterialRepository>,
    product_repo: Arc<ProductRepository>,
    config: Arc<ConfigManager>,
}

impl YieldApi {
    pub fn new(
        calculator: YieldCalculator<SqliteFactorSource>,
        material_repo: Arc<MaterialRepository>,
        product_repo: Arc<ProductRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            calculator,
            material_repo,
            product_repo,
            config,
        }
    }

    pub fn compute(&self, request: &YieldRequest) -> Result<u64, YieldError> {
        let _perf = PerfGuard::new("yield_compute");
        self.calculator.compute(request)
    }

    /// 旧接口: 件数或 -1
    pub fn compute_sentinel(&self, request: &YieldRequest) -> i64 {
        let _perf = PerfGuard::new("yield_compute_sentinel");
        self.calculator.compute_sentinel(request)
    }

    /// 调用方未给出的参数取配置默认值
    fn resolve_params(&self, param1: Option<f64>, param2: Option<f64>) -> ApiResult<CalcDefaults> {
        if let (Some(param1), Some(param2)) = (param1, param2) {
            return Ok(CalcDefaults { param1, param2 });
        }
        let defaults = self.config.calc_defaults()?;
        Ok(CalcDefaults {
            param1: param1.unwrap_or(defaults.param1),
            param2: param2.unwrap_or(defaults.param2),
        })
    }

    /// 按物料逐产品测算
    ///
    /// 物料没有类型时，每一行都返回 MaterialTypeNotFound。
    #[instrument(skip(self))]
    pub fn estimate_for_material(
        &self,
        material_id: i64,
        param1: Option<f64>,
        param2: Option<f64>,
    ) -> ApiResult<MaterialYieldEstimate> {
        let _perf = PerfGuard::new("estimate_for_material");

        let material = self
            .material_repo
            .find_by_id(material_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Material(id={})不存在", material_id)))?;
        let params = self.resolve_params(param1, param2)?;

        let products = self
            .product_repo
            .list_products_for_material(material_id)?
            .into_iter()
            .map(|usage| {
                let request = YieldRequest {
                    product_type_id: Some(usage.product_type_id),
                    material_type_id: material.type_id,
                    raw_quantity: material.stock_quantity,
                    param1: params.param1,
                    param2: params.param2,
                };
                let (quantity, error) = match self.calculator.compute(&request) {
                    Ok(q) => (Some(q), None),
                    Err(e) => (None, Some(e)),
                };
                ProductYieldEstimate {
                    product_id: usage.product_id,
                    product_name: usage.product_name,
                    product_type_id: usage.product_type_id,
                    required_quantity: usage.required_quantity,
                    coefficient: usage.coefficient,
                    quantity,
                    error,
                }
            })
            .collect::<Vec<_>>();

        debug!(material_id, products = products.len(), "按物料测算完成");

        Ok(MaterialYieldEstimate {
            material_id: material.id,
            material_name: material.name,
            material_type_id: material.type_id,
            raw_quantity: material.stock_quantity,
            param1: params.param1,
            param2: params.param2,
            products,
        })
    }
}
