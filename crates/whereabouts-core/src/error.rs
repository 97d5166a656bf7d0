use thiserror::Error;

/// Top-level error type for the Whereabouts system.
///
/// Collaborator implementations (storage, spreadsheets) report through this
/// type so that the dialog layer can treat every backend failure uniformly.
/// Crates with their own error enums implement `From<WhereaboutsError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WhereaboutsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for WhereaboutsError {
    fn from(err: toml::de::Error) -> Self {
        WhereaboutsError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for WhereaboutsError {
    fn from(err: toml::ser::Error) -> Self {
        WhereaboutsError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WhereaboutsError {
    fn from(err: serde_json::Error) -> Self {
        WhereaboutsError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Whereabouts operations.
pub type Result<T> = std::result::Result<T, WhereaboutsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(WhereaboutsError, &str)> = vec![
            (
                WhereaboutsError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                WhereaboutsError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                WhereaboutsError::Spreadsheet("no sheets".to_string()),
                "Spreadsheet error: no sheets",
            ),
            (
                WhereaboutsError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: WhereaboutsError = io_err.into();
        assert!(matches!(err, WhereaboutsError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: WhereaboutsError = err.unwrap_err().into();
        assert!(matches!(err, WhereaboutsError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: WhereaboutsError = err.unwrap_err().into();
        assert!(matches!(err, WhereaboutsError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(format!("got {}", value))
        }

        assert_eq!(inner().unwrap(), "got 42");
    }
}
