// ==========================================
// 物料产出测算系统 - 物料类型仓储
// ==========================================
// 职责: 管理 MaterialTypes 表的写入与查询
// 红线: 不含业务逻辑，只负责数据访问
// ==========================================

use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::{MaterialType, MaterialTypeOption, NewMaterialType, Validate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::MutexGuard;

pub struct MaterialTypeRepository {
    conn: SharedConnection,
}

impl MaterialTypeRepository {
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

    /// 新增物料类型，返回新 id
    pub fn insert(&self, material_type: &NewMaterialType) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, material_type)
    }

    /// 在调用方连接/事务中新增物料类型
    pub fn insert_tx(conn: &Connection, material_type: &NewMaterialType) -> RepositoryResult<i64> {
        material_type.validate()?;
        conn.execute(
            "INSERT INTO MaterialTypes (name, loss_percentage) VALUES (?1, ?2)",
            params![material_type.name.trim(), material_type.loss_percentage],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 物料类型选项（id + 名称）
    pub fn list_options(&self) -> RepositoryResult<Vec<MaterialTypeOption>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM MaterialTypes ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MaterialTypeOption {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 单个物料类型（含损耗百分比）
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MaterialType>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT id, name, loss_percentage FROM MaterialTypes WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MaterialType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        loss_percentage: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    /// 查询损耗百分比（测算用）
    pub fn find_loss_percentage(&self, id: i64) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT loss_percentage FROM MaterialTypes WHERE id = ?1",
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
                "SELECT id FROM MaterialTypes WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}
