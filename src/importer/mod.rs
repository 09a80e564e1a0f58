// ==========================================
// 物料产出测算系统 - 导入层
// ==========================================
// 职责: 读取表格文件，整批替换业务数据
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod bulk_loader;
pub mod error;
pub mod file_parser;

// 重导出核心类型
pub use bulk_loader::{
    BulkLoader, EntityImportSummary, ImportReport, ImportSources, ImportTables, RowIssue,
    SkipReason,
};
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, ExcelParser, FileParser, SourceRow, UniversalFileParser};
