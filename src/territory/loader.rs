// src/territory/loader.rs - Reads the territory sheet into header + rows
use calamine::{open_workbook_auto, Reader};
use std::path::Path;

use crate::errors::TerritoryLoadError;
use crate::ingest::table::{decode_table_bytes, parse_table};

/// Raw grid of the territory file. Cells are trimmed strings.
#[derive(Debug, Clone, Default)]
pub struct TerritoryGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TerritoryGrid {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn unreadable(path: &Path, reason: impl ToString) -> TerritoryLoadError {
    TerritoryLoadError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Spreadsheets use their first worksheet; `.csv` may be UTF-8 or CP949.
pub fn read_grid(path: &Path) -> Result<TerritoryGrid, TerritoryLoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path),
        "csv" => read_csv(path),
        _ => Err(TerritoryLoadError::UnsupportedFormat { path: path.to_path_buf() }),
    }
}

fn read_workbook(path: &Path) -> Result<TerritoryGrid, TerritoryLoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(path, e))?;
    let Some(first_sheet) = workbook.sheet_names().first().cloned() else {
        return Err(TerritoryLoadError::Empty { path: path.to_path_buf() });
    };
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|e| unreadable(path, e))?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|header| header.iter().map(|c| cell_to_string(c).trim().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .map(|row| row.iter().map(|c| cell_to_string(c).trim().to_string()).collect())
        .collect();
    Ok(TerritoryGrid { headers, rows })
}

fn read_csv(path: &Path) -> Result<TerritoryGrid, TerritoryLoadError> {
    let bytes = std::fs::read(path).map_err(|e| unreadable(path, e))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => decode_table_bytes(e.as_bytes()),
    };
    let table = parse_table(&text, &path.display().to_string());
    let headers = table
        .headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let rows = table
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(|c| c.trim().to_string()).collect())
        .collect();
    Ok(TerritoryGrid { headers, rows })
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
