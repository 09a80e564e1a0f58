// ==========================================
// 物料产出测算系统 - 应用层
// ==========================================
// 职责: 组件装配（入口程序只依赖 AppState）
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
