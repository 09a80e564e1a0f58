// ==========================================
// 物料产出测算系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 物料库存、产品配方与可生产数量测算
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与校验
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 产出测算
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// SQL 统计与慢查询日志
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    Material, MaterialFields, MaterialSummary, MaterialType, MaterialTypeOption, Product,
    ProductMaterial, ProductType, ProductUsage, ValidationError,
};

// 引擎
pub use engine::{YieldCalculator, YieldError, YieldRequest, NOT_COMPUTABLE};

// API
pub use api::{ImportApi, MaterialApi, YieldApi};

// 应用
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物料产出测算系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
