// ==========================================
// 物料产出测算系统 - SQL 性能统计
// ==========================================
// 职责: SQLite 语句计数 + 慢查询日志 + 操作耗时
// 开关: OBRAZ_PLUS_PERF_SQL / OBRAZ_PLUS_SLOW_SQL_MS
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

static PERF_SQL_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_THRESHOLD_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn one_line(sql: &str, max_chars: usize) -> String {
    let flat = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}…", cut)
}

/// 安装 SQLite 语句 trace/profile
///
/// - Debug 构建默认开启，Release 默认关闭
/// - `OBRAZ_PLUS_PERF_SQL=1|0` 强制开关
/// - `OBRAZ_PLUS_SLOW_SQL_MS` 慢 SQL 阈值（毫秒，0 表示不记录）
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag("OBRAZ_PLUS_PERF_SQL").unwrap_or(cfg!(debug_assertions));
    PERF_SQL_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var("OBRAZ_PLUS_SLOW_SQL_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(100);
    SLOW_SQL_THRESHOLD_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_sql_trace));
    conn.profile(Some(on_sql_profile));
}

fn on_sql_trace(_sql: &str) {
    if PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_sql_profile(sql: &str, duration: Duration) {
    if !PERF_SQL_ENABLED.load(Ordering::Relaxed) {
        return;
    }

    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_THRESHOLD_MS.load(Ordering::Relaxed);
    if threshold > 0 && ms >= threshold {
        tracing::warn!(
            target: "slow_sql",
            duration_ms = ms,
            sql = %one_line(sql, 300),
            "slow sql"
        );
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 操作级性能统计：drop 时记录耗时、SQL 语句数、慢 SQL 数
///
/// ```ignore
/// let _perf = obraz_plus::perf::PerfGuard::new("list_materials");
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    sql_start: u64,
    slow_sql_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            sql_start: SQL_COUNT.with(|c| c.get()),
            slow_sql_start: SLOW_SQL_COUNT.with(|c| c.get()),
        }
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_start);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_start);

        tracing::debug!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            sql_count,
            slow_sql_count,
            "done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_collapses_whitespace() {
        let sql = "SELECT id,\n       name\n  FROM Materials";
        assert_eq!(one_line(sql, 100), "SELECT id, name FROM Materials");
    }

    #[test]
    fn test_one_line_truncates() {
        let out = one_line("SELECT * FROM Materials WHERE id = ?1", 6);
        assert_eq!(out, "SELECT…");
    }
}
