// ==========================================
// 物料产出测算系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑（值约束校验除外）
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_tx` 关联函数接收 &Connection，可在调用方事务内使用
// ==========================================

pub mod error;
pub mod material_repo;
pub mod material_type_repo;
pub mod product_repo;
pub mod product_type_repo;
pub mod schema_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use material_repo::MaterialRepository;
pub use material_type_repo::MaterialTypeRepository;
pub use product_repo::ProductRepository;
pub use product_type_repo::ProductTypeRepository;
pub use schema_repo::{SchemaStore, TableCounts, RESET_ORDER};
