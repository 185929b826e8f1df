use rollcall_core::{GuestId, TagUid};
use std::path::PathBuf;
use thiserror::Error;

/// Storage-specific error types for the rollcall local stores.
///
/// Business-rule outcomes (`AlreadyRegistered`, `GuestAlreadyBound`,
/// `NotFound`) are returned as
/// errors so callers can match on them; they are not failures of the store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A store file exists but cannot be trusted
    #[error("Corrupt store {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Entity not found in the store
    #[error("Entity not found: {entity_type} with {field}={value}")]
    NotFound {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Tag is already bound to a guest
    #[error("Tag {tag_uid} is already registered to guest {existing}")]
    AlreadyRegistered { tag_uid: TagUid, existing: GuestId },

    /// Guest already holds a different live tag
    #[error("Guest {guest_id} already holds tag {existing_tag}")]
    GuestAlreadyBound {
        guest_id: GuestId,
        existing_tag: TagUid,
    },

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identifier rejected by the core types
    #[error(transparent)]
    Core(#[from] rollcall_core::Error),
}

impl StorageError {
    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        StorageError::AlreadyRegistered {
            tag_uid: TagUid::new("04A1").unwrap(),
            existing: GuestId::from(1001),
        },
        "Tag 04A1 is already registered to guest 1001"
    )]
    #[case(
        StorageError::GuestAlreadyBound {
            guest_id: GuestId::from(1001),
            existing_tag: TagUid::new("04A1").unwrap(),
        },
        "Guest 1001 already holds tag 04A1"
    )]
    #[case(
        StorageError::not_found("tag", "uid", "04A1"),
        "Entity not found: tag with uid=04A1"
    )]
    #[case(
        StorageError::corrupt("/tmp/registry.json", "truncated"),
        "Corrupt store /tmp/registry.json: truncated"
    )]
    fn test_error_messages(#[case] err: StorageError, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }
}
