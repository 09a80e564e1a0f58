// ==========================================
// 物料产出测算系统 - 产品类型仓储
// ==========================================
// 职责: 管理 ProductTypes 表
// ==========================================

use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::{NewProductType, ProductType, Validate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::MutexGuard;

pub struct ProductTypeRepository {
    conn: SharedConnection,
}

impl ProductTypeRepository {
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

    pub fn insert(&self, product_type: &NewProductType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, product_type)
    }

    pub fn insert_tx(conn: &Connection, product_type: &NewProductType) -> RepositoryResult<i64> {
        product_type.validate()?;
        conn.execute(
            "INSERT INTO ProductTypes (name, coefficient) VALUES (?1, ?2)",
            params![product_type.name.trim(), product_type.coefficient],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<ProductType>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, coefficient FROM ProductTypes ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProductType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    coefficient: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 查询产品类型系数（测算用）
    pub fn find_coefficient(&self, id: i64) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT coefficient FROM ProductTypes WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }

    /// 按名称精确查找 id（重名时取最小 id）
    pub fn find_id_by_name(&self, name: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        Self::find_id_by_name_tx(&conn, name)
    }

    pub fn find_id_by_name_tx(conn: &Connection, name: &str) -> RepositoryResult<Option<i64>> {
        let found = conn
            .query_row(
                "SELECT id FROM ProductTypes WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}
