//! Roster import from the first sheet of a workbook.
//!
//! Layout: a header row, then one person per row with last, first and
//! (optional) middle name in the first three columns.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info};

use whereabouts_core::types::PersonName;

use crate::error::SheetError;

pub fn read_roster(path: &Path) -> Result<Vec<PersonName>, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::Open(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoSheets)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| SheetError::Sheet {
            sheet: sheet.clone(),
            reason: e.to_string(),
        })?;

    let mut names = Vec::new();
    for (index, row) in range.rows().enumerate().skip(1) {
        let cells: Vec<String> = row.iter().take(3).map(cell_to_string).collect();
        if cells.len() < 2 {
            debug!(row = index + 1, "Skipping short row");
            continue;
        }
        let name = PersonName::new(
            cells[0].as_str(),
            cells[1].as_str(),
            cells.get(2).map(String::as_str).unwrap_or(""),
        );
        if name.is_blank() {
            debug!(row = index + 1, "Skipping row without a name");
            continue;
        }
        names.push(name);
    }

    info!(sheet = %sheet, rows = names.len(), "Roster read from {}", path.display());
    Ok(names)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{}", dt),
        Data::Error(e) => format!("#ERR({:?})", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_roster(rows: &[&[&str]]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        workbook.save(dir.path().join("roster.xlsx")).unwrap();
        dir
    }

    #[test]
    fn test_read_roster_skips_header_and_blank_rows() {
        let dir = write_roster(&[
            &["Фамилия", "Имя", "Отчество"],
            &["Петров", "Иван", "Сергеевич"],
            &["", "", ""],
            &["Сидоров", " Антон ", ""],
        ]);

        let names = read_roster(&dir.path().join("roster.xlsx")).unwrap();
        assert_eq!(
            names,
            vec![
                PersonName::new("Петров", "Иван", "Сергеевич"),
                PersonName::new("Сидоров", "Антон", ""),
            ]
        );
    }

    #[test]
    fn test_read_roster_two_columns() {
        let dir = write_roster(&[&["Last", "First"], &["Ivanov", "Petr"]]);
        let names = read_roster(&dir.path().join("roster.xlsx")).unwrap();
        assert_eq!(names, vec![PersonName::new("Ivanov", "Petr", "")]);
    }

    #[test]
    fn test_read_roster_missing_file() {
        let err = read_roster(Path::new("/nonexistent/roster.xlsx")).unwrap_err();
        assert!(matches!(err, SheetError::Open(_)));
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String(" Ivanov ".to_string())), "Ivanov");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
    }
}
