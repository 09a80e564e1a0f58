// ==========================================
// 物料产出测算系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value)
// ==========================================
// 说明: 配置表不属于业务数据，重新导入不会清空
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("锁获取失败: {0}")]
    Lock(String),

    #[error("配置值格式错误: {key} = {value:?} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 测算默认参数（未显式提供 param1/param2 时使用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalcDefaults {
    pub param1: f64,
    pub param2: f64,
}

/// 批量导入使用的 5 个源文件名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFileNames {
    pub material_types: String,
    pub materials: String,
    pub product_types: String,
    pub products: String,
    pub product_materials: String,
}

impl Default for ImportFileNames {
    fn default() -> Self {
        Self {
            material_types: defaults::MATERIAL_TYPE_FILE.to_string(),
            materials: defaults::MATERIAL_FILE.to_string(),
            product_types: defaults::PRODUCT_TYPE_FILE.to_string(),
            products: defaults::PRODUCT_FILE.to_string(),
            product_materials: defaults::PRODUCT_MATERIAL_FILE.to_string(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（自动建表）
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::ensure_table(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager（自动建表，幂等）
    pub fn from_connection(conn: SharedConnection) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| ConfigError::Lock(e.to_string()))?;
            Self::ensure_table(&guard)?;
        }
        Ok(Self { conn })
    }

    fn ensure_table(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )
    }

    fn get_conn(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写入配置值（存在则覆盖）
    pub fn set_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tracing::debug!(key, value, "配置已更新");
        Ok(())
    }

    /// 全部已存储配置（按 key 排序）
    pub fn list_all(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    fn get_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；未配置返回默认值，格式错误返回 InvalidValue
    pub fn get_f64_or_default(&self, key: &str, default: f64) -> ConfigResult<f64> {
        let Some(raw) = self.get_value(key)? else {
            return Ok(default);
        };

        let parsed = raw
            .trim()
            .parse::<f64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            })?;

        if !parsed.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
                message: "非有限数值".to_string(),
            });
        }
        Ok(parsed)
    }

    // ===== 测算 =====

    pub fn calc_defaults(&self) -> ConfigResult<CalcDefaults> {
        Ok(CalcDefaults {
            param1: self.get_f64_or_default(config_keys::CALC_DEFAULT_PARAM1, defaults::PARAM1)?,
            param2: self.get_f64_or_default(config_keys::CALC_DEFAULT_PARAM2, defaults::PARAM2)?,
        })
    }

    // ===== 导入 =====

    pub fn import_file_names(&self) -> ConfigResult<ImportFileNames> {
        Ok(ImportFileNames {
            material_types: self
                .get_or_default(config_keys::IMPORT_MATERIAL_TYPE_FILE, defaults::MATERIAL_TYPE_FILE)?,
            materials: self.get_or_default(config_keys::IMPORT_MATERIAL_FILE, defaults::MATERIAL_FILE)?,
            product_types: self
                .get_or_default(config_keys::IMPORT_PRODUCT_TYPE_FILE, defaults::PRODUCT_TYPE_FILE)?,
            products: self.get_or_default(config_keys::IMPORT_PRODUCT_FILE, defaults::PRODUCT_FILE)?,
            product_materials: self.get_or_default(
                config_keys::IMPORT_PRODUCT_MATERIAL_FILE,
                defaults::PRODUCT_MATERIAL_FILE,
            )?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 测算
    pub const CALC_DEFAULT_PARAM1: &str = "calc.default_param1";
    pub const CALC_DEFAULT_PARAM2: &str = "calc.default_param2";

    // 导入源文件
    pub const IMPORT_MATERIAL_TYPE_FILE: &str = "import.material_type_file";
    pub const IMPORT_MATERIAL_FILE: &str = "import.material_file";
    pub const IMPORT_PRODUCT_TYPE_FILE: &str = "import.product_type_file";
    pub const IMPORT_PRODUCT_FILE: &str = "import.product_file";
    pub const IMPORT_PRODUCT_MATERIAL_FILE: &str = "import.product_material_file";
}

mod defaults {
    pub const PARAM1: f64 = 1.0;
    pub const PARAM2: f64 = 1.0;

    pub const MATERIAL_TYPE_FILE: &str = "Material_type_import.xlsx";
    pub const MATERIAL_FILE: &str = "Materials_import.xlsx";
    pub const PRODUCT_TYPE_FILE: &str = "Product_type_import.xlsx";
    pub const PRODUCT_FILE: &str = "Products_import.xlsx";
    pub const PRODUCT_MATERIAL_FILE: &str = "Material_products__import.xlsx";
}
