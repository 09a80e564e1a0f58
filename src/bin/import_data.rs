// Full reload of all business tables from a directory of spreadsheet files.
//
// Usage:
//   cargo run --bin import_data -- [dir] [db_path]
//
// File names come from config_kv (import.*_file keys), defaulting to the
// historical Material_type_import.xlsx / Materials_import.xlsx / ... names.
// A missing file loads zero rows for that entity; skipped rows are listed in
// the printed report.

use anyhow::{anyhow, Result};
use obraz_plus::app::{get_default_db_path, AppState};

fn main() -> Result<()> {
    obraz_plus::logging::init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| ".".to_string());
    let db_path = args.next().unwrap_or_else(get_default_db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;
    let report = state.import_api.reload_from_dir(&dir)?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let counts = state.schema.table_counts()?;
    tracing::info!(?counts, skipped = report.total_skipped(), "导入结束");
    Ok(())
}
