//! Statistics workbook export.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;
use uuid::Uuid;

use whereabouts_core::types::ExportRow;

use crate::error::SheetError;

pub const SHEET_NAME: &str = "Statistics";

pub const HEADERS: [&str; 7] = [
    "Date",
    "Last name",
    "First name",
    "Middle name",
    "Leave time",
    "Activity time",
    "Activity description",
];

const COLUMN_WIDTHS: [f64; 7] = [12.0, 18.0, 15.0, 18.0, 12.0, 14.0, 50.0];

/// Write `rows` to a fresh workbook inside `dir` and return its path.
///
/// File names carry a timestamp and a random suffix so concurrent exports
/// never collide.
pub fn write_statistics(rows: &[ExportRow], dir: &Path) -> Result<PathBuf, SheetError> {
    std::fs::create_dir_all(dir)?;
    let suffix = Uuid::new_v4().simple().to_string();
    let path = dir.join(format!(
        "statistics_{}_{}.xlsx",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    ));

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, (title, width)) in HEADERS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, &header_format)?;
        sheet.set_column_width(col, width)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let r = index as u32 + 1;
        let cells = [
            row.day.format("%d.%m.%Y").to_string(),
            row.name.last.clone(),
            row.name.first.clone(),
            row.name.middle.clone(),
            row.leave_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            row.activity_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default(),
            row.activity_description.clone().unwrap_or_default(),
        ];
        for (col, value) in cells.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r, col as u16, value.as_str())?;
            }
        }
    }

    workbook.save(&path)?;
    info!(rows = rows.len(), "Statistics written to {}", path.display());
    Ok(path)
}
