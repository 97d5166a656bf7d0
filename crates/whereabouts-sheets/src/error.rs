use whereabouts_core::error::WhereaboutsError;

/// Errors from workbook reading and writing.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("cannot open workbook: {0}")]
    Open(String),
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("cannot read sheet '{sheet}': {reason}")]
    Sheet { sheet: String, reason: String },
    #[error("cannot write workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SheetError> for WhereaboutsError {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::Io(e) => WhereaboutsError::Io(e),
            other => WhereaboutsError::Spreadsheet(other.to_string()),
        }
    }
}
