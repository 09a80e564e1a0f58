// ==========================================
// 物料产出测算系统 - 物料查询 API
// ==========================================
// 职责: 面向展示层的读写入口
// - 物料列表（含汇总需求量）、物料类型选项、单条物料
// - 测算用的参考数据: 物料类型（损耗）、产品类型（系数）、单个产品
// - 保存物料（新增/更新，失败以响应返回而非错误）
// - 消耗某物料的产品列表
// - 名称 → id 查找
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::domain::{
    Material, MaterialFields, MaterialSummary, MaterialType, MaterialTypeOption, Product,
    ProductType, ProductUsage,
};
use crate::perf::PerfGuard;
use crate::repository::{
    MaterialRepository, MaterialTypeRepository, ProductRepository, ProductTypeRepository,
};

/// 保存物料的结果（展示层直接使用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveMaterialResponse {
    pub success: bool,
    pub material_id: Option<i64>,
    pub error: Option<ErrorResponse>,
}

impl SaveMaterialResponse {
    fn ok(material_id: i64) -> Self {
        Self {
            success: true,
            material_id: Some(material_id),
            error: None,
        }
    }

    fn failed(material_id: Option<i64>, err: ApiError) -> Self {
        Self {
            success: false,
            material_id,
            error: Some(ErrorResponse::from(err)),
        }
    }
}

// ==========================================
// MaterialApi - 物料 API
// ==========================================
pub struct MaterialApi {
    material_repo: Arc<MaterialRepository>,
    material_type_repo: Arc<MaterialTypeRepository>,
    product_repo: Arc<ProductRepository>,
    product_type_repo: Arc<ProductTypeRepository>,
}

impl MaterialApi {
    pub fn new(
        material_repo: Arc<MaterialRepository>,
        material_type_repo: Arc<MaterialTypeRepository>,
        product_repo: Arc<ProductRepository>,
        product_type_repo: Arc<ProductTypeRepository>,
    ) -> Self {
        Self {
            material_repo,
            material_type_repo,
            product_repo,
            product_type_repo,
        }
    }

    /// 物料列表（按 id 排序，含汇总需求量）
    pub fn list_materials(&self) -> ApiResult<Vec<MaterialSummary>> {
        let _perf = PerfGuard::new("list_materials");
        Ok(self.material_repo.list_with_demand()?)
    }

    /// 物料类型选项（id + 名称）
    pub fn list_material_types(&self) -> ApiResult<Vec<MaterialTypeOption>> {
        let _perf = PerfGuard::new("list_material_types");
        Ok(self.material_type_repo.list_options()?)
    }

    /// 单条物料
    ///
    /// # 返回
    /// - Err(NotFound): id 不存在
    pub fn get_material(&self, id: i64) -> ApiResult<Material> {
        let _perf = PerfGuard::new("get_material");
        self.material_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Material(id={})不存在", id)))
    }

    /// 保存物料
    ///
    /// - id 为 Some: 原地更新（不存在时失败）
    /// - id 为 None: 新增
    ///
    /// 不返回 Err；失败原因放在响应的 error 中，存储保持不变。
    pub fn save_material(&self, id: Option<i64>, fields: MaterialFields) -> SaveMaterialResponse {
        let _perf = PerfGuard::new("save_material");

        let result = match id {
            Some(id) => self.material_repo.update(id, &fields).map(|_| id),
            None => self.material_repo.insert(&fields),
        };

        match result {
            Ok(material_id) => {
                info!(material_id, created = id.is_none(), "物料已保存");
                SaveMaterialResponse::ok(material_id)
            }
            Err(e) => {
                let err = ApiError::from(e);
                warn!(material_id = ?id, error = %err, "物料保存失败");
                SaveMaterialResponse::failed(id, err)
            }
        }
    }

    /// 消耗指定物料的产品（名称、配方需求量、产品类型系数）
    pub fn list_products_for_material(&self, material_id: i64) -> ApiResult<Vec<ProductUsage>> {
        let _perf = PerfGuard::new("list_products_for_material");
        Ok(self.product_repo.list_products_for_material(material_id)?)
    }

    // ==========================================
    // 测算参考数据
    // ==========================================

    /// 单个物料类型（含损耗百分比）
    pub fn get_material_type(&self, id: i64) -> ApiResult<MaterialType> {
        self.material_type_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("MaterialType(id={})不存在", id)))
    }

    /// 全部产品类型（含系数，按 id）
    pub fn list_product_types(&self) -> ApiResult<Vec<ProductType>> {
        let _perf = PerfGuard::new("list_product_types");
        Ok(self.product_type_repo.list_all()?)
    }

    pub fn get_product(&self, id: i64) -> ApiResult<Product> {
        self.product_repo
            .find_product_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Product(id={})不存在", id)))
    }

    // ==========================================
    // 名称查找（重名时取最小 id）
    // ==========================================

    pub fn find_material_type_id_by_name(&self, name: &str) -> ApiResult<Option<i64>> {
        Ok(self.material_type_repo.find_id_by_name(name)?)
    }

    pub fn find_product_type_id_by_name(&self, name: &str) -> ApiResult<Option<i64>> {
        Ok(self.product_type_repo.find_id_by_name(name)?)
    }

    pub fn find_material_id_by_name(&self, name: &str) -> ApiResult<Option<i64>> {
        Ok(self.material_repo.find_id_by_name(name)?)
    }

    pub fn find_product_id_by_name(&self, name: &str) -> ApiResult<Option<i64>> {
        Ok(self.product_repo.find_product_id_by_name(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SharedConnection;
    use crate::domain::{NewMaterialType, NewProduct, NewProductType};
    use crate::repository::SchemaStore;
    use std::sync::Mutex;

    fn setup_api() -> (MaterialApi, SharedConnection) {
        let conn = Arc::new(Mutex::new(
            crate::db::open_sqlite_connection(":memory:").unwrap(),
        ));
        SchemaStore::from_connection(conn.clone())
            .create_schema()
            .unwrap();
        let api = MaterialApi::new(
            Arc::new(MaterialRepository::from_connection(conn.clone())),
            Arc::new(MaterialTypeRepository::from_connection(conn.clone())),
            Arc::new(ProductRepository::from_connection(conn.clone())),
            Arc::new(ProductTypeRepository::from_connection(conn.clone())),
        );
        (api, conn)
    }

    fn fields(name: &str, unit_price: f64) -> MaterialFields {
        MaterialFields {
            name: name.to_string(),
            type_id: None,
            unit_price,
            stock_quantity: 10.0,
            min_quantity: 2.0,
            package_quantity: 5.0,
            unit_of_measure: "кг".to_string(),
        }
    }

    #[test]
    fn test_save_new_then_update() {
        let (api, _conn) = setup_api();

        let created = api.save_material(None, fields("Глина", 10.0));
        assert!(created.success);
        let id = created.material_id.unwrap();

        let updated = api.save_material(Some(id), fields("Глина белая", 12.0));
        assert!(updated.success);
        assert_eq!(api.get_material(id).unwrap().name, "Глина белая");
    }

    #[test]
    fn test_save_unknown_id_fails_without_error() {
        let (api, _conn) = setup_api();
        let response = api.save_material(Some(404), fields("Глина", 10.0));
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, "NOT_FOUND");
        assert!(api.list_materials().unwrap().is_empty());
    }

    #[test]
    fn test_save_with_unknown_type_fails() {
        let (api, _conn) = setup_api();
        let mut f = fields("Глина", 10.0);
        f.type_id = Some(7);
        let response = api.save_material(None, f);
        assert!(!response.success);
        assert_eq!(response.error.unwrap().code, "BUSINESS_RULE_VIOLATION");
    }

    #[test]
    fn test_get_missing_material() {
        let (api, _conn) = setup_api();
        assert!(matches!(api.get_material(1), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_type_options_and_lookup() {
        let (api, conn) = setup_api();
        let repo = MaterialTypeRepository::from_connection(conn);
        repo.insert(&NewMaterialType {
            name: "Глина".to_string(),
            loss_percentage: 20.0,
        })
        .unwrap();

        let options = api.list_material_types().unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(api.find_material_type_id_by_name("Глина").unwrap(), Some(options[0].id));
        assert_eq!(api.find_product_type_id_by_name("Глина").unwrap(), None);

        let material_type = api.get_material_type(options[0].id).unwrap();
        assert_eq!(material_type.loss_percentage, 20.0);
        assert!(matches!(
            api.get_material_type(options[0].id + 1),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_product_reference_data() {
        let (api, conn) = setup_api();
        let type_id = ProductTypeRepository::from_connection(conn.clone())
            .insert(&NewProductType {
                name: "Плитка".to_string(),
                coefficient: 5.0,
            })
            .unwrap();
        let product_id = ProductRepository::from_connection(conn)
            .insert_product(&NewProduct {
                name: "Плитка 30x30".to_string(),
                article: "A-100".to_string(),
                min_partner_price: 150.0,
                type_id: Some(type_id),
            })
            .unwrap();

        let types = api.list_product_types().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].coefficient, 5.0);

        let product = api.get_product(product_id).unwrap();
        assert_eq!(product.article, "A-100");
        assert_eq!(product.type_id, Some(type_id));
        assert_eq!(api.get_product(product_id + 1).unwrap_err().code(), "NOT_FOUND");
    }
}
