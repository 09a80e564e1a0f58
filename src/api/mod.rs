// ==========================================
// 物料产出测算系统 - API层
// ==========================================
// 职责: 面向展示层的查询/测算/导入入口
// 约定: 对外只暴露 ApiError / ErrorResponse
// ==========================================

pub mod error;
pub mod import_api;
pub mod material_api;
pub mod yield_api;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use import_api::ImportApi;
pub use material_api::{MaterialApi, SaveMaterialResponse};
pub use yield_api::{MaterialYieldEstimate, ProductYieldEstimate, YieldApi};
