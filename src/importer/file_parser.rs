// ==========================================
// 物料产出测算系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 约定: 只读第一个工作表；首行为表头并跳过；全空行忽略
// 输出: 按列位置的字符串行（各实体列顺序固定）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 源文件中的一行数据
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 电子表格行号（从 1 开始，表头为第 1 行）
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl SourceRow {
    pub fn new(row_number: usize, cells: Vec<&str>) -> Self {
        Self {
            row_number,
            cells: cells.into_iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells.get(idx).map(|s| s.as_str())
    }

    fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.is_empty())
    }
}

/// 文件解析接口
pub trait FileParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>>;
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let row_number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);

            let row = SourceRow {
                row_number,
                cells: record.iter().map(|v| v.trim().to_string()).collect(),
            };
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_rows(&self, file_path: &Path) -> ImportResult<Vec<SourceRow>> {
        ensure_exists(file_path)?;

        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;

        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // range 从第一个非空单元格开始，行号需加上偏移
        let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

        let mut rows = Vec::new();
        for (idx, data_row) in range.rows().enumerate().skip(1) {
            let row = SourceRow {
                row_number: first_row + idx + 1,
                cells: data_row
                    .iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect(),
            };
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<Vec<SourceRow>> {
        let path = file_path.as_ref();
        match extension_of(path).as_str() {
            "csv" => CsvParser.parse_rows(path),
            "xlsx" | "xls" => ExcelParser.parse_rows(path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_csv_rows_are_positional() {
        let file = csv_file(&["Наименование,Потери", "Глина, 20.5 ", "Песок,1"]);

        let rows = CsvParser.parse_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], SourceRow::new(2, vec!["Глина", "20.5"]));
        assert_eq!(rows[1].row_number, 3);
        assert_eq!(rows[1].cell(0), Some("Песок"));
        assert_eq!(rows[1].cell(5), None);
    }

    #[test]
    fn test_csv_blank_rows_skipped_but_numbering_kept() {
        let file = csv_file(&["a,b", "x,1", ",", "y,2"]);

        let rows = CsvParser.parse_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].row_number, 4);
    }

    #[test]
    fn test_missing_file() {
        let err = UniversalFileParser.parse("no_such_file.csv").unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        let err = UniversalFileParser.parse(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ref ext) if ext == "txt"));
    }

    #[test]
    fn test_xlsx_first_sheet_rows() {
        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Тип материала").unwrap();
        sheet.write_string(0, 1, "Процент потерь").unwrap();
        sheet.write_string(1, 0, "Глина").unwrap();
        sheet.write_number(1, 1, 20.0).unwrap();
        sheet.write_string(3, 0, "Песок").unwrap();
        sheet.write_number(3, 1, 0.5).unwrap();
        // 第二个工作表不参与导入
        let other = workbook.add_worksheet();
        other.write_string(0, 0, "игнорируется").unwrap();
        workbook.save(file.path()).unwrap();

        let rows = UniversalFileParser.parse(file.path()).unwrap();
        assert_eq!(
            rows,
            vec![
                SourceRow::new(2, vec!["Глина", "20"]),
                SourceRow::new(4, vec!["Песок", "0.5"]),
            ]
        );
    }

    #[test]
    fn test_xlsx_row_numbers_follow_sheet_offset() {
        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        // 表头在第 3 行（前两行为空）
        sheet.write_string(2, 0, "Наименование").unwrap();
        sheet.write_string(3, 0, "Плитка").unwrap();
        workbook.save(file.path()).unwrap();

        let rows = ExcelParser.parse_rows(file.path()).unwrap();
        assert_eq!(rows, vec![SourceRow::new(4, vec!["Плитка"])]);
    }

    #[test]
    fn test_corrupt_xlsx_is_parse_error() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        write!(file, "not a zip archive").unwrap();
        let err = UniversalFileParser.parse(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::ExcelParseError(_)));
    }
}
