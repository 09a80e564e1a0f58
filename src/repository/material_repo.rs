// ==========================================
// 物料产出测算系统 - 物料数据仓储
// ==========================================
// 职责: 管理 Materials 表的 CRUD 与需求量汇总查询
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::{Material, MaterialFields, MaterialSummary, Validate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::MutexGuard;

// ==========================================
// MaterialRepository - 物料仓储
// ==========================================
pub struct MaterialRepository {
    conn: SharedConnection,
}

impl MaterialRepository {
    /// 创建新的 MaterialRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        Ok(Self {
            conn: open_shared_connection(db_path)?,
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_material(row: &Row<'_>) -> SqliteResult<Material> {
        Ok(Material {
            id: row.get(0)?,
            name: row.get(1)?,
            type_id: row.get(2)?,
            unit_price: row.get(3)?,
            stock_quantity: row.get(4)?,
            min_quantity: row.get(5)?,
            package_quantity: row.get(6)?,
            unit_of_measure: row.get(7)?,
        })
    }

    /// 新增物料
    ///
    /// # 返回
    /// - Ok(i64): 新物料 id
    /// - Err(FieldValueError): 值约束违反（负单价等），不落库
    pub fn insert(&self, fields: &MaterialFields) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, fields)
    }

    /// 在调用方连接/事务中新增物料
    pub fn insert_tx(conn: &Connection, fields: &MaterialFields) -> RepositoryResult<i64> {
        fields.validate()?;
        conn.execute(
            r#"
            INSERT INTO Materials (
                name, type_id, unit_price, stock_quantity,
                min_quantity, package_quantity, unit_of_measure
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                fields.name.trim(),
                fields.type_id,
                fields.unit_price,
                fields.stock_quantity,
                fields.min_quantity,
                fields.package_quantity,
                fields.unit_of_measure.trim(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 按 id 整体替换物料的全部可变字段
    ///
    /// # 返回
    /// - Err(NotFound): id 不存在
    pub fn update(&self, id: i64, fields: &MaterialFields) -> RepositoryResult<()> {
        fields.validate()?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE Materials
            SET name             = ?1,
                type_id          = ?2,
                unit_price       = ?3,
                stock_quantity   = ?4,
                min_quantity     = ?5,
                package_quantity = ?6,
                unit_of_measure  = ?7
            WHERE id = ?8
            "#,
            params![
                fields.name.trim(),
                fields.type_id,
                fields.unit_price,
                fields.stock_quantity,
                fields.min_quantity,
                fields.package_quantity,
                fields.unit_of_measure.trim(),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("Material", id));
        }
        Ok(())
    }

    /// 按 id 查询物料完整记录
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                r#"
                SELECT id, name, type_id, unit_price, stock_quantity,
                       min_quantity, package_quantity, unit_of_measure
                FROM Materials
                WHERE id = ?1
                "#,
                params![id],
                Self::map_material,
            )
            .optional()?;
        Ok(found)
    }

    /// 物料列表 + 汇总需求量
    ///
    /// 需求量 = 该物料在所有配方边上 required_quantity 之和（无配方时为 0）。
    /// 按物料 id 排序，保证同一次调用内顺序稳定。
    pub fn list_with_demand(&self) -> RepositoryResult<Vec<MaterialSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT m.id,
                   m.name,
                   mt.name                                  AS type_name,
                   m.stock_quantity,
                   m.min_quantity,
                   COALESCE(SUM(pm.required_quantity), 0.0) AS required_qty,
                   mt.id                                    AS type_id
            FROM Materials m
                     LEFT JOIN MaterialTypes mt ON m.type_id = mt.id
                     LEFT JOIN ProductMaterials pm ON m.id = pm.material_id
            GROUP BY m.id
            ORDER BY m.id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                let stock_quantity: f64 = row.get(3)?;
                let min_quantity: f64 = row.get(4)?;
                Ok(MaterialSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    stock_quantity,
                    min_quantity,
                    required_quantity: row.get(5)?,
                    type_id: row.get(6)?,
                    below_minimum: stock_quantity < min_quantity,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// 按名称精确查找 id（重名时取最小 id）
    pub fn find_id_by_name(&self, name: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        Self::find_id_by_name_tx(&conn, name)
    }

    pub fn find_id_by_name_tx(conn: &Connection, name: &str) -> RepositoryResult<Option<i64>> {
        let found = conn
            .query_row(
                "SELECT id FROM Materials WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::SchemaStore;
    use std::sync::{Arc, Mutex};

    fn setup_repo() -> (MaterialRepository, SharedConnection) {
        let conn = Arc::new(Mutex::new(
            crate::db::open_sqlite_connection(":memory:").unwrap(),
        ));
        SchemaStore::from_connection(conn.clone())
            .create_schema()
            .unwrap();
        conn.lock()
            .unwrap()
            .execute(
                "INSERT INTO MaterialTypes (name, loss_percentage) VALUES ('Глина', 20.0)",
                [],
            )
            .unwrap();
        (MaterialRepository::from_connection(conn.clone()), conn)
    }

    fn fields(name: &str) -> MaterialFields {
        MaterialFields {
            name: name.to_string(),
            type_id: Some(1),
            unit_price: 10.0,
            stock_quantity: 100.0,
            min_quantity: 20.0,
            package_quantity: 25.0,
            unit_of_measure: "кг".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let (repo, _) = setup_repo();
        let id = repo.insert(&fields("Глина белая")).unwrap();

        let found = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(found.fields(), fields("Глина белая"));
        assert!(repo.find_by_id(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_update_missing_id_not_found() {
        let (repo, _) = setup_repo();
        let err = repo.update(42, &fields("X")).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_update_touches_only_target_row() {
        let (repo, _) = setup_repo();
        let a = repo.insert(&fields("A")).unwrap();
        let b = repo.insert(&fields("B")).unwrap();

        let mut changed = fields("A2");
        changed.stock_quantity = 7.0;
        repo.update(a, &changed).unwrap();

        assert_eq!(repo.find_by_id(a).unwrap().unwrap().fields(), changed);
        assert_eq!(repo.find_by_id(b).unwrap().unwrap().fields(), fields("B"));
    }

    #[test]
    fn test_update_with_negative_price_leaves_row() {
        let (repo, _) = setup_repo();
        let id = repo.insert(&fields("A")).unwrap();

        let mut bad = fields("A");
        bad.unit_price = -1.0;
        assert!(repo.update(id, &bad).is_err());
        assert_eq!(repo.find_by_id(id).unwrap().unwrap().unit_price, 10.0);
    }

    #[test]
    fn test_unknown_type_id_violates_foreign_key() {
        let (repo, _) = setup_repo();
        let mut f = fields("A");
        f.type_id = Some(99);
        assert!(matches!(
            repo.insert(&f).unwrap_err(),
            RepositoryError::ForeignKeyViolation(_)
        ));
    }

    #[test]
    fn test_list_with_demand_sums_edges() {
        let (repo, conn) = setup_repo();
        let used = repo.insert(&fields("Used")).unwrap();
        let unused = repo.insert(&fields("Unused")).unwrap();

        conn.lock()
            .unwrap()
            .execute_batch(&format!(
                r#"
                INSERT INTO ProductTypes (name, coefficient) VALUES ('T', 1.0);
                INSERT INTO Products (name, article, min_partner_price, type_id) VALUES ('P1', 'A1', 1.0, 1);
                INSERT INTO Products (name, article, min_partner_price, type_id) VALUES ('P2', 'A2', 1.0, 1);
                INSERT INTO ProductMaterials VALUES (1, {used}, 1.5);
                INSERT INTO ProductMaterials VALUES (2, {used}, 2.25);
                "#
            ))
            .unwrap();

        let list = repo.list_with_demand().unwrap();
        assert_eq!(list.len(), 2);
        let used_row = list.iter().find(|m| m.id == used).unwrap();
        let unused_row = list.iter().find(|m| m.id == unused).unwrap();
        assert_eq!(used_row.required_quantity, 3.75);
        assert_eq!(used_row.type_name.as_deref(), Some("Глина"));
        assert_eq!(unused_row.required_quantity, 0.0);
    }

    #[test]
    fn test_list_with_demand_material_without_type() {
        let (repo, _) = setup_repo();
        let mut f = fields("Без типа");
        f.type_id = None;
        f.stock_quantity = 1.0;
        let id = repo.insert(&f).unwrap();

        let list = repo.list_with_demand().unwrap();
        let row = list.iter().find(|m| m.id == id).unwrap();
        assert_eq!(row.type_name, None);
        assert_eq!(row.type_id, None);
        assert!(row.below_minimum);
    }
}
