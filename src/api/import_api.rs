// ==========================================
// 物料产出测算系统 - 导入 API
// ==========================================
// 职责: 从目录（按配置的文件名）或显式文件列表整批重新导入
// ==========================================

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::error::ApiResult;
use crate::config::ConfigManager;
use crate::importer::{BulkLoader, ImportReport, ImportSources};
use crate::perf::PerfGuard;

pub struct ImportApi {
    loader: BulkLoader,
    config: Arc<ConfigManager>,
}

impl ImportApi {
    pub fn new(loader: BulkLoader, config: Arc<ConfigManager>) -> Self {
        Self { loader, config }
    }

    /// 解析目录下配置的 5 个源文件名（只保留存在的文件）
    ///
    /// 目录不存在或没有任何源文件时返回 IMPORT_ERROR，数据库不受影响。
    pub fn sources_in_dir(&self, dir: impl AsRef<Path>) -> ApiResult<ImportSources> {
        let names = self.config.import_file_names()?;
        Ok(ImportSources::from_dir(dir, &names)?)
    }

    pub fn reload_from_dir(&self, dir: impl AsRef<Path>) -> ApiResult<ImportReport> {
        let dir = dir.as_ref();
        info!(dir = %dir.display(), "从目录重新导入");
        let sources = self.sources_in_dir(dir)?;
        self.reload(&sources)
    }

    pub fn reload(&self, sources: &ImportSources) -> ApiResult<ImportReport> {
        let _perf = PerfGuard::new("reload");
        Ok(self.loader.reload_from_files(sources)?)
    }
}
