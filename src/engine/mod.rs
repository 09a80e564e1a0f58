// ==========================================
// 物料产出测算系统 - 引擎层
// ==========================================
// 职责: 业务计算（可生产数量测算）
// 红线: 引擎不直接写库
// ==========================================

pub mod yield_calculator;

pub use yield_calculator::{
    compute_units, SqliteFactorSource, YieldCalculator, YieldError, YieldFactorSource,
    YieldRequest, NOT_COMPUTABLE,
};
