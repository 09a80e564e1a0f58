// ==========================================
// 物料产出测算系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键约束必须每个连接单独开启）
// - 统一 busy_timeout
// - 统一默认数据库路径解析
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 默认数据库文件名（与历史数据文件名保持一致）
pub const DEFAULT_DB_FILE_NAME: &str = "obraz_plus.db";

/// 共享连接句柄
///
/// 整个进程只有一个写入方（桌面进程自身），所有组件通过同一句柄访问存储。
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 配置 SQLite 连接的统一 PRAGMA
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
///
/// `:memory:` 同样适用（测试使用）。
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 打开连接并包装为共享句柄
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<SharedConnection> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 解析默认数据库路径
///
/// 优先级:
/// 1. 环境变量 `OBRAZ_PLUS_DB_PATH`
/// 2. 用户数据目录下的 `obraz-plus/obraz_plus.db`
/// 3. 当前目录下的 `obraz_plus.db`
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("OBRAZ_PLUS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from(format!("./{}", DEFAULT_DB_FILE_NAME));

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("obraz-plus");
        // best-effort: 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join(DEFAULT_DB_FILE_NAME);
        }
    }

    path.to_string_lossy().to_string()
}
