// ==========================================
// 物料产出测算系统 - 配置层
// ==========================================
// 职责: 系统配置管理（测算默认参数、导入源文件名）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{
    config_keys, CalcDefaults, ConfigError, ConfigManager, ConfigResult, ImportFileNames,
};
