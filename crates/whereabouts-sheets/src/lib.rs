//! Whereabouts sheets crate - spreadsheet import and export.
//!
//! Reads the roster from `.xlsx`/`.xls` workbooks with calamine and writes
//! the statistics workbook with rust_xlsxwriter.

pub mod error;
pub mod export;
pub mod roster;

use std::path::{Path, PathBuf};

use whereabouts_core::error::Result;
use whereabouts_core::traits::Spreadsheets;
use whereabouts_core::types::{ExportRow, PersonName};

pub use error::SheetError;

/// Spreadsheet collaborator backed by real workbook files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSpreadsheets;

impl Spreadsheets for XlsxSpreadsheets {
    fn read_roster(&self, path: &Path) -> Result<Vec<PersonName>> {
        Ok(roster::read_roster(path)?)
    }

    fn write_statistics(&self, rows: &[ExportRow], dir: &Path) -> Result<PathBuf> {
        Ok(export::write_statistics(rows, dir)?)
    }
}
