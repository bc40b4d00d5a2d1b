//! Error taxonomy shared by the catalog and review stores.

use crate::storage::StorageError;
use sea_orm::DbErr;
use validator::ValidationErrors;

/// A single rejected form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_owned(),
            message: message.to_owned(),
        }
    }
}

/// Store operation errors.
#[derive(Debug)]
pub enum LibraryError {
    /// Malformed or out-of-range input; nothing was written.
    Validation(Vec<FieldError>),
    /// The user already reviewed this book.
    Duplicate,
    /// The requester may not touch this record.
    PermissionDenied,
    /// Unknown id. Carries the kind of record that was missing.
    NotFound(&'static str),
    /// Database failure
    Database(DbErr),
    /// Upload storage failure
    Storage(StorageError),
}

impl LibraryError {
    /// Names of all rejected fields, for validation errors.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            LibraryError::Validation(errors) => errors.iter().map(|e| e.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Invalid input: {}", fields.join(", "))
            }
            LibraryError::Duplicate => write!(f, "Review already exists"),
            LibraryError::PermissionDenied => write!(f, "Permission denied"),
            LibraryError::NotFound(what) => write!(f, "{} not found", what),
            LibraryError::Database(e) => write!(f, "Database error: {}", e),
            LibraryError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<DbErr> for LibraryError {
    fn from(e: DbErr) -> Self {
        LibraryError::Database(e)
    }
}

impl From<StorageError> for LibraryError {
    fn from(e: StorageError) -> Self {
        LibraryError::Storage(e)
    }
}

impl From<ValidationErrors> for LibraryError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "Invalid value".to_owned());
                FieldError {
                    field: field.to_string(),
                    message,
                }
            })
            .collect();
        // HashMap order is unstable; keep output deterministic.
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        LibraryError::Validation(fields)
    }
}
