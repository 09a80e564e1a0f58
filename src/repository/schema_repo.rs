// ==========================================
// 物料产出测算系统 - 结构存储（五张业务表）
// ==========================================
// 职责: 建表（幂等）、全量清空（按外键依赖顺序）、行数统计
// 约束: 表名/列名为磁盘契约，保持与历史数据库兼容
// ==========================================

use crate::db::{open_shared_connection, SharedConnection, CURRENT_SCHEMA_VERSION};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;
use tracing::{debug, info};

/// 全量清空顺序: 配方边 → 产品/物料 → 产品类型/物料类型
pub const RESET_ORDER: [&str; 5] = [
    "ProductMaterials",
    "Products",
    "Materials",
    "ProductTypes",
    "MaterialTypes",
];

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS MaterialTypes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    loss_percentage REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS Materials (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    type_id INTEGER,
    unit_price REAL NOT NULL CHECK (unit_price >= 0),
    stock_quantity REAL NOT NULL,
    min_quantity REAL NOT NULL CHECK (min_quantity >= 0),
    package_quantity REAL NOT NULL,
    unit_of_measure TEXT NOT NULL,
    FOREIGN KEY (type_id) REFERENCES MaterialTypes (id)
);

CREATE TABLE IF NOT EXISTS ProductTypes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    coefficient REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS Products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    article TEXT NOT NULL UNIQUE,
    min_partner_price REAL NOT NULL,
    type_id INTEGER,
    FOREIGN KEY (type_id) REFERENCES ProductTypes (id)
);

CREATE TABLE IF NOT EXISTS ProductMaterials (
    product_id INTEGER NOT NULL,
    material_id INTEGER NOT NULL,
    required_quantity REAL NOT NULL,
    PRIMARY KEY (product_id, material_id),
    FOREIGN KEY (product_id) REFERENCES Products (id),
    FOREIGN KEY (material_id) REFERENCES Materials (id)
);

CREATE INDEX IF NOT EXISTS idx_material_types_name ON MaterialTypes(name);
CREATE INDEX IF NOT EXISTS idx_materials_name ON Materials(name);
CREATE INDEX IF NOT EXISTS idx_product_types_name ON ProductTypes(name);
CREATE INDEX IF NOT EXISTS idx_products_name ON Products(name);
CREATE INDEX IF NOT EXISTS idx_product_materials_material ON ProductMaterials(material_id);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// 五张业务表的行数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub material_types: usize,
    pub materials: usize,
    pub product_types: usize,
    pub products: usize,
    pub product_materials: usize,
}

// ==========================================
// SchemaStore
// ==========================================
pub struct SchemaStore {
    conn: SharedConnection,
}

impl SchemaStore {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        Ok(Self {
            conn: open_shared_connection(db_path)?,
        })
    }

    pub fn from_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保五张表及约束存在（幂等，不破坏已有数据）
    pub fn create_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::create_schema_on(&conn)
    }

    /// 在给定连接上建表
    pub fn create_schema_on(conn: &Connection) -> RepositoryResult<()> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![CURRENT_SCHEMA_VERSION],
        )?;
        debug!(version = CURRENT_SCHEMA_VERSION, "schema 已就绪");
        Ok(())
    }

    /// 全量清空五张表（独立事务）
    pub fn reset_all(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        Self::reset_all_tx(&tx)?;
        tx.commit()?;
        Ok(())
    }

    /// 在调用方事务中全量清空五张表
    ///
    /// 按 RESET_ORDER 删除；同时清除这些表的自增序列，保证重复导入得到相同的 id。
    /// 任一删除违反外键时直接返回错误（调用方回滚）。
    pub fn reset_all_tx(conn: &Connection) -> RepositoryResult<()> {
        for table in RESET_ORDER {
            let deleted = conn.execute(&format!("DELETE FROM {}", table), [])?;
            debug!(table, deleted, "表已清空");
        }

        conn.execute(
            "DELETE FROM sqlite_sequence WHERE name IN (?1, ?2, ?3, ?4, ?5)",
            params![
                RESET_ORDER[0],
                RESET_ORDER[1],
                RESET_ORDER[2],
                RESET_ORDER[3],
                RESET_ORDER[4]
            ],
        )?;

        info!("业务表已全部清空");
        Ok(())
    }

    /// 统计五张表的行数
    pub fn table_counts(&self) -> RepositoryResult<TableCounts> {
        let conn = self.get_conn()?;
        Self::table_counts_on(&conn)
    }

    pub fn table_counts_on(conn: &Connection) -> RepositoryResult<TableCounts> {
        let count = |table: &str| -> RepositoryResult<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(TableCounts {
            material_types: count("MaterialTypes")?,
            materials: count("Materials")?,
            product_types: count("ProductTypes")?,
            products: count("Products")?,
            product_materials: count("ProductMaterials")?,
        })
    }
}
