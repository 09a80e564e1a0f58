// ==========================================
// 物料产出测算系统 - 批量重新导入
// ==========================================
// 职责: 清空全部业务表后按依赖顺序重新导入五类实体
// 流程: 解析全部文件 → 开启事务 → reset_all → 逐类导入 → 提交
// ==========================================
// 红线:
// - 单行问题（名称查找失败、字段错误、约束冲突）只跳过该行并记录
// - 资源级故障（文件不可读、存储异常）整体回滚，原数据保持不变
// - 名称查找每次都查询事务内当前状态，不做缓存
// ==========================================

use crate::config::ImportFileNames;
use crate::db::SharedConnection;
use crate::domain::{
    MaterialFields, NewMaterialType, NewProduct, NewProductType, ProductMaterial,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{SourceRow, UniversalFileParser};
use crate::repository::{
    MaterialRepository, MaterialTypeRepository, ProductRepository, ProductTypeRepository,
    RepositoryError, SchemaStore,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 输入
// ==========================================

/// 五类实体的源文件（缺省的实体导入 0 行）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSources {
    pub material_types: Option<PathBuf>,
    pub materials: Option<PathBuf>,
    pub product_types: Option<PathBuf>,
    pub products: Option<PathBuf>,
    pub product_materials: Option<PathBuf>,
}

impl ImportSources {
    /// 在目录中按配置的文件名查找源文件，只保留存在的文件
    ///
    /// # 返回
    /// - Err(FileNotFound): 目录不存在，或目录中一个源文件都没有
    ///   （否则重新导入会清空全部数据）
    pub fn from_dir(dir: impl AsRef<Path>, names: &ImportFileNames) -> ImportResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ImportError::FileNotFound(format!(
                "导入目录不存在: {}",
                dir.display()
            )));
        }

        let pick = |name: &str| {
            let path = dir.join(name);
            if path.is_file() {
                Some(path)
            } else {
                debug!(path = %path.display(), "源文件不存在，跳过该实体");
                None
            }
        };

        let sources = Self {
            material_types: pick(&names.material_types),
            materials: pick(&names.materials),
            product_types: pick(&names.product_types),
            products: pick(&names.products),
            product_materials: pick(&names.product_materials),
        };
        if sources.is_empty() {
            return Err(ImportError::FileNotFound(format!(
                "目录中没有任何源文件: {}",
                dir.display()
            )));
        }
        Ok(sources)
    }

    pub fn is_empty(&self) -> bool {
        self.material_types.is_none()
            && self.materials.is_none()
            && self.product_types.is_none()
            && self.products.is_none()
            && self.product_materials.is_none()
    }
}

/// 已解析的五类数据行
///
/// 列顺序:
/// - material_types: (name, loss_percentage)
/// - materials: (name, type_name, unit_price, stock_quantity, min_quantity, package_quantity, unit_of_measure)
/// - product_types: (name, coefficient)
/// - products: (type_name, name, article, min_partner_price)
/// - product_materials: (material_name, product_name, required_quantity)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportTables {
    pub material_types: Vec<SourceRow>,
    pub materials: Vec<SourceRow>,
    pub product_types: Vec<SourceRow>,
    pub products: Vec<SourceRow>,
    pub product_materials: Vec<SourceRow>,
}

impl ImportTables {
    /// 解析所有源文件；任一文件失败即返回错误（此时尚未触碰数据库）
    pub fn parse(sources: &ImportSources) -> ImportResult<Self> {
        let parse = |path: &Option<PathBuf>| -> ImportResult<Vec<SourceRow>> {
            match path {
                Some(p) => {
                    let rows = UniversalFileParser.parse(p).map_err(|e| {
                        error!(path = %p.display(), error = %e, "文件解析失败");
                        e
                    })?;
                    debug!(path = %p.display(), rows = rows.len(), "文件解析完成");
                    Ok(rows)
                }
                None => Ok(Vec::new()),
            }
        };

        Ok(Self {
            material_types: parse(&sources.material_types)?,
            materials: parse(&sources.materials)?,
            product_types: parse(&sources.product_types)?,
            products: parse(&sources.products)?,
            product_materials: parse(&sources.product_materials)?,
        })
    }
}

// ==========================================
// 报告
// ==========================================

/// 跳过某一行的原因
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    #[error("缺少列: {column}")]
    MissingColumn { column: String },

    #[error("数值无法解析 ({column}): {value:?}")]
    InvalidNumber { column: String, value: String },

    #[error("物料类型不存在: {name}")]
    MaterialTypeNotFound { name: String },

    #[error("产品类型不存在: {name}")]
    ProductTypeNotFound { name: String },

    #[error("物料不存在: {name}")]
    MaterialNotFound { name: String },

    #[error("产品不存在: {name}")]
    ProductNotFound { name: String },

    #[error("物料与产品均不存在: {material_name} / {product_name}")]
    MaterialAndProductNotFound {
        material_name: String,
        product_name: String,
    },

    #[error("字段值错误 ({field}): {message}")]
    Validation { field: String, message: String },

    #[error("约束冲突: {message}")]
    ConstraintViolation { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_number: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityImportSummary {
    pub total_rows: usize,
    pub inserted: usize,
    pub skipped: Vec<RowIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub material_types: EntityImportSummary,
    pub materials: EntityImportSummary,
    pub product_types: EntityImportSummary,
    pub products: EntityImportSummary,
    pub product_materials: EntityImportSummary,
}

impl ImportReport {
    fn summaries(&self) -> [&EntityImportSummary; 5] {
        [
            &self.material_types,
            &self.materials,
            &self.product_types,
            &self.products,
            &self.product_materials,
        ]
    }

    pub fn total_inserted(&self) -> usize {
        self.summaries().iter().map(|s| s.inserted).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.summaries().iter().map(|s| s.skipped.len()).sum()
    }
}

// ==========================================
// 单行处理
// ==========================================

enum RowFailure {
    Skip(SkipReason),
    Fatal(RepositoryError),
}

impl From<SkipReason> for RowFailure {
    fn from(reason: SkipReason) -> Self {
        RowFailure::Skip(reason)
    }
}

impl From<RepositoryError> for RowFailure {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::FieldValueError { field, message } => {
                RowFailure::Skip(SkipReason::Validation { field, message })
            }
            e if e.is_row_local() => RowFailure::Skip(SkipReason::ConstraintViolation {
                message: e.to_string(),
            }),
            e => RowFailure::Fatal(e),
        }
    }
}

type RowOutcome = Result<(), RowFailure>;

fn text(row: &SourceRow, idx: usize, column: &str) -> Result<String, RowFailure> {
    row.cell(idx)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            SkipReason::MissingColumn {
                column: column.to_string(),
            }
            .into()
        })
}

fn number(row: &SourceRow, idx: usize, column: &str) -> Result<f64, RowFailure> {
    let raw = text(row, idx, column)?;
    parse_decimal(&raw).ok_or_else(|| {
        SkipReason::InvalidNumber {
            column: column.to_string(),
            value: raw,
        }
        .into()
    })
}

/// 解析数字单元格，逗号只当作小数点（"12,5"）
///
/// 千分位写法（"1,234"、"1,234,567"）以及逗号与点混用时返回 None。
fn parse_decimal(raw: &str) -> Option<f64> {
    if !raw.contains(',') {
        return raw.parse::<f64>().ok();
    }

    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let (int_part, frac_part) = unsigned.split_once(',')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return None;
    }

    // 1~3 位非零开头的整数部分 + 恰好 3 位小数，与千分位无法区分
    let looks_grouped =
        frac_part.len() == 3 && int_part.len() <= 3 && !int_part.starts_with('0');
    if looks_grouped {
        return None;
    }

    raw.replacen(',', ".", 1).parse::<f64>().ok()
}

fn load_material_type(conn: &Connection, row: &SourceRow) -> RowOutcome {
    let material_type = NewMaterialType {
        name: text(row, 0, "name")?,
        loss_percentage: number(row, 1, "loss_percentage")?,
    };
    MaterialTypeRepository::insert_tx(conn, &material_type)?;
    Ok(())
}

fn load_material(conn: &Connection, row: &SourceRow) -> RowOutcome {
    let name = text(row, 0, "name")?;
    let type_name = text(row, 1, "type_name")?;
    let unit_price = number(row, 2, "unit_price")?;
    let stock_quantity = number(row, 3, "stock_quantity")?;
    let min_quantity = number(row, 4, "min_quantity")?;
    let package_quantity = number(row, 5, "package_quantity")?;
    let unit_of_measure = text(row, 6, "unit_of_measure")?;

    let type_id = MaterialTypeRepository::find_id_by_name_tx(conn, &type_name)?
        .ok_or(SkipReason::MaterialTypeNotFound { name: type_name })?;

    let fields = MaterialFields {
        name,
        type_id: Some(type_id),
        unit_price,
        stock_quantity,
        min_quantity,
        package_quantity,
        unit_of_measure,
    };
    MaterialRepository::insert_tx(conn, &fields)?;
    Ok(())
}

fn load_product_type(conn: &Connection, row: &SourceRow) -> RowOutcome {
    let product_type = NewProductType {
        name: text(row, 0, "name")?,
        coefficient: number(row, 1, "coefficient")?,
    };
    ProductTypeRepository::insert_tx(conn, &product_type)?;
    Ok(())
}

fn load_product(conn: &Connection, row: &SourceRow) -> RowOutcome {
    let type_name = text(row, 0, "type_name")?;
    let name = text(row, 1, "name")?;
    let article = text(row, 2, "article")?;
    let min_partner_price = number(row, 3, "min_partner_price")?;

    let type_id = ProductTypeRepository::find_id_by_name_tx(conn, &type_name)?
        .ok_or(SkipReason::ProductTypeNotFound { name: type_name })?;

    let product = NewProduct {
        name,
        article,
        min_partner_price,
        type_id: Some(type_id),
    };
    ProductRepository::insert_product_tx(conn, &product)?;
    Ok(())
}

fn load_product_material(conn: &Connection, row: &SourceRow) -> RowOutcome {
    let material_name = text(row, 0, "material_name")?;
    let product_name = text(row, 1, "product_name")?;
    let required_quantity = number(row, 2, "required_quantity")?;

    let material_id = MaterialRepository::find_id_by_name_tx(conn, &material_name)?;
    let product_id = ProductRepository::find_product_id_by_name_tx(conn, &product_name)?;

    let (material_id, product_id) = match (material_id, product_id) {
        (Some(m), Some(p)) => (m, p),
        (None, None) => {
            return Err(SkipReason::MaterialAndProductNotFound {
                material_name,
                product_name,
            }
            .into())
        }
        (None, Some(_)) => return Err(SkipReason::MaterialNotFound { name: material_name }.into()),
        (Some(_), None) => return Err(SkipReason::ProductNotFound { name: product_name }.into()),
    };

    let edge = ProductMaterial {
        product_id,
        material_id,
        required_quantity,
    };
    ProductRepository::insert_product_material_tx(conn, &edge)?;
    Ok(())
}

// ==========================================
// BulkLoader - 批量重新导入
// ==========================================
pub struct BulkLoader {
    conn: SharedConnection,
}

impl BulkLoader {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 从源文件重新导入
    ///
    /// 所有文件先解析完成再开启事务；任一文件失败时数据库不受影响。
    pub fn reload_from_files(&self, sources: &ImportSources) -> ImportResult<ImportReport> {
        let tables = ImportTables::parse(sources)?;
        self.reload_tables(&tables)
    }

    /// 用已解析的数据行替换全部业务数据（单一事务）
    #[instrument(skip(self, tables), fields(batch_id = tracing::field::Empty))]
    pub fn reload_tables(&self, tables: &ImportTables) -> ImportResult<ImportReport> {
        let started_at = Utc::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, "开始重新导入");

        let conn = self
            .conn
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        // 任何 `?` 提前返回都会丢弃 tx，从而自动回滚
        SchemaStore::reset_all_tx(&tx)?;
        debug!("业务表已清空");

        let material_types =
            Self::load_entity(&tx, "MaterialTypes", &tables.material_types, load_material_type)?;
        let materials = Self::load_entity(&tx, "Materials", &tables.materials, load_material)?;
        let product_types =
            Self::load_entity(&tx, "ProductTypes", &tables.product_types, load_product_type)?;
        let products = Self::load_entity(&tx, "Products", &tables.products, load_product)?;
        let product_materials = Self::load_entity(
            &tx,
            "ProductMaterials",
            &tables.product_materials,
            load_product_material,
        )?;

        tx.commit()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        let report = ImportReport {
            batch_id,
            started_at,
            finished_at: Utc::now(),
            material_types,
            materials,
            product_types,
            products,
            product_materials,
        };

        info!(
            batch_id = %report.batch_id,
            inserted = report.total_inserted(),
            skipped = report.total_skipped(),
            "重新导入完成"
        );
        Ok(report)
    }

    fn load_entity(
        conn: &Connection,
        entity: &str,
        rows: &[SourceRow],
        load_row: fn(&Connection, &SourceRow) -> RowOutcome,
    ) -> ImportResult<EntityImportSummary> {
        let mut summary = EntityImportSummary {
            total_rows: rows.len(),
            ..Default::default()
        };

        for row in rows {
            match load_row(conn, row) {
                Ok(()) => summary.inserted += 1,
                Err(RowFailure::Skip(reason)) => {
                    warn!(entity, row = row.row_number, reason = %reason, "跳过数据行");
                    summary.skipped.push(RowIssue {
                        row_number: row.row_number,
                        reason,
                    });
                }
                Err(RowFailure::Fatal(e)) => {
                    error!(entity, row = row.row_number, error = %e, "存储故障，导入回滚");
                    return Err(e.into());
                }
            }
        }

        info!(
            entity,
            total = summary.total_rows,
            inserted = summary.inserted,
            skipped = summary.skipped.len(),
            "实体导入完成"
        );
        Ok(summary)
    }
}
