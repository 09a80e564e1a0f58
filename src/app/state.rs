// ==========================================
// 物料产出测算系统 - 应用状态
// ==========================================
// 职责: 打开唯一的共享连接，装配仓储、引擎、配置与 API 实例
// ==========================================

use std::sync::Arc;

use crate::api::{ImportApi, MaterialApi, YieldApi};
use crate::config::ConfigManager;
use crate::db::{open_shared_connection, read_schema_version, SharedConnection};
use crate::engine::{SqliteFactorSource, YieldCalculator};
use crate::importer::BulkLoader;
use crate::repository::{
    MaterialRepository, MaterialTypeRepository, ProductRepository, ProductTypeRepository,
    SchemaStore,
};

pub use crate::db::get_default_db_path;

/// 应用状态
///
/// 所有组件共享同一个连接句柄（单进程单写入方）。
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    pub schema: Arc<SchemaStore>,
    pub config_manager: Arc<ConfigManager>,

    pub material_api: Arc<MaterialApi>,
    pub yield_api: Arc<YieldApi>,
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// 打开数据库并确保 schema 存在（幂等，不影响已有数据）。
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_shared_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        Self::from_connection(db_path, conn)
    }

    /// 基于已有共享连接装配（测试可传入 :memory: 连接）
    pub fn from_connection(db_path: String, conn: SharedConnection) -> Result<Self, String> {
        let schema = Arc::new(SchemaStore::from_connection(conn.clone()));
        schema
            .create_schema()
            .map_err(|e| format!("schema 初始化失败: {}", e))?;

        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            let version = read_schema_version(&guard).map_err(|e| e.to_string())?;
            tracing::debug!(?version, "schema 版本");
        }

        // ==========================================
        // Repository 层
        // ==========================================
        let material_repo = Arc::new(MaterialRepository::from_connection(conn.clone()));
        let material_type_repo = Arc::new(MaterialTypeRepository::from_connection(conn.clone()));
        let product_repo = Arc::new(ProductRepository::from_connection(conn.clone()));
        let product_type_repo = Arc::new(ProductTypeRepository::from_connection(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // Engine 层
        // ==========================================
        let calculator = YieldCalculator::new(SqliteFactorSource::new(
            product_type_repo.clone(),
            material_type_repo.clone(),
        ));

        // ==========================================
        // API 层
        // ==========================================
        let material_api = Arc::new(MaterialApi::new(
            material_repo.clone(),
            material_type_repo,
            product_repo.clone(),
            product_type_repo,
        ));
        let yield_api = Arc::new(YieldApi::new(
            calculator,
            material_repo,
            product_repo,
            config_manager.clone(),
        ));
        let import_api = Arc::new(ImportApi::new(
            BulkLoader::new(conn),
            config_manager.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            schema,
            config_manager,
            material_api,
            yield_api,
            import_api,
        })
    }
}
