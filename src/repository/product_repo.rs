// ==========================================
// 物料产出测算系统 - 产品与配方仓储
// ==========================================
// 职责: 管理 Products 表与 ProductMaterials（配方边）表
// 约束: 每个 (product, material) 至多一条边；两端实体必须存在
// ==========================================

use crate::db::{open_shared_connection, SharedConnection};
use crate::domain::{NewProduct, Product, ProductMaterial, ProductUsage, Validate};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::MutexGuard;

pub struct ProductRepository {
    conn: SharedConnection,
}

impl ProductRepository {
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

    // ==========================================
    // Products
    // ==========================================

    pub fn insert_product(&self, product: &NewProduct) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::insert_product_tx(&conn, product)
    }

    /// 在调用方连接/事务中新增产品（货号重复时返回 UniqueConstraintViolation）
    pub fn insert_product_tx(conn: &Connection, product: &NewProduct) -> RepositoryResult<i64> {
        product.validate()?;
        conn.execute(
            r#"
            INSERT INTO Products (name, article, min_partner_price, type_id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                product.name.trim(),
                product.article.trim(),
                product.min_partner_price,
                product.type_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_product_by_id(&self, id: i64) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT id, name, article, min_partner_price, type_id FROM Products WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Product {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        article: row.get(2)?,
                        min_partner_price: row.get(3)?,
                        type_id: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }

    /// 按名称精确查找产品 id（重名时取最小 id）
    pub fn find_product_id_by_name(&self, name: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        Self::find_product_id_by_name_tx(&conn, name)
    }

    pub fn find_product_id_by_name_tx(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<i64>> {
        let found = conn
            .query_row(
                "SELECT id FROM Products WHERE name = ?1 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found)
    }

    // ==========================================
    // ProductMaterials（配方边）
    // ==========================================

    pub fn insert_product_material(&self, edge: &ProductMaterial) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_product_material_tx(&conn, edge)
    }

    /// 新增配方边
    ///
    /// - 同一 (product, material) 重复: UniqueConstraintViolation
    /// - 任一端不存在: ForeignKeyViolation
    pub fn insert_product_material_tx(
        conn: &Connection,
        edge: &ProductMaterial,
    ) -> RepositoryResult<()> {
        edge.validate()?;
        conn.execute(
            r#"
            INSERT INTO ProductMaterials (product_id, material_id, required_quantity)
            VALUES (?1, ?2, ?3)
            "#,
            params![edge.product_id, edge.material_id, edge.required_quantity],
        )?;
        Ok(())
    }

    /// 消耗指定物料的产品（含配方需求量与产品类型系数）
    ///
    /// 没有产品类型的产品不出现在结果中（内连接 ProductTypes）。
    pub fn list_products_for_material(
        &self,
        material_id: i64,
    ) -> RepositoryResult<Vec<ProductUsage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT p.id, p.name, pt.id, pm.required_quantity, pt.coefficient
            FROM Products p
                     JOIN ProductMaterials pm ON p.id = pm.product_id
                     JOIN ProductTypes pt ON p.type_id = pt.id
            WHERE pm.material_id = ?1
            ORDER BY p.id
            "#,
        )?;

        let rows = stmt
            .query_map(params![material_id], |row| {
                Ok(ProductUsage {
                    product_id: row.get(0)?,
                    product_name: row.get(1)?,
                    product_type_id: row.get(2)?,
                    required_quantity: row.get(3)?,
                    coefficient: row.get(4)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}
