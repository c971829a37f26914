use std::path::PathBuf;

use thiserror::Error;

use crate::types::SemanticType;

#[derive(Debug, Error)]
pub enum FlagfigError {
    #[error("Settings type must be a struct with named fields (found {found})")]
    NotARecord { found: String },

    #[error("Field '{key}' is a nested struct; only flat settings are supported")]
    NestedRecord { key: String },

    #[error("Field '{key}' has unsupported type {found}")]
    UnsupportedType { key: String, found: String },

    #[error("Field '{key}' is a list of {found}; only lists of strings, integers and booleans are supported")]
    UnsupportedListElement { key: String, found: String },

    #[error("A settings field has an empty name")]
    EmptyKey,

    #[error("Duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("Key '{0}' is reserved")]
    ReservedKey(String),

    #[error("Key '{0}' cannot be used as a flag name")]
    InvalidKey(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error(transparent)]
    Flags(#[from] clap::Error),

    #[error("Config profile '{profile}' not found in any of: {}", display_dirs(.dirs))]
    ProfileNotFound { profile: String, dirs: Vec<PathBuf> },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Cannot convert '{value}' for '{key}' to {expected}")]
    Coercion {
        key: String,
        value: String,
        expected: SemanticType,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Coarse grouping of [`FlagfigError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The settings type cannot be bound.
    Schema,
    /// The argument list was rejected.
    Flags,
    /// The config profile could not be found, read, or parsed.
    ConfigFile,
    /// A source value does not fit its field.
    Coercion,
}

impl FlagfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlagfigError::NotARecord { .. }
            | FlagfigError::NestedRecord { .. }
            | FlagfigError::UnsupportedType { .. }
            | FlagfigError::UnsupportedListElement { .. }
            | FlagfigError::EmptyKey
            | FlagfigError::DuplicateKey(_)
            | FlagfigError::ReservedKey(_)
            | FlagfigError::InvalidKey(_)
            | FlagfigError::KeyNotFound(_) => ErrorKind::Schema,
            FlagfigError::Flags(_) => ErrorKind::Flags,
            FlagfigError::ProfileNotFound { .. }
            | FlagfigError::IoError { .. }
            | FlagfigError::ParseError { .. } => ErrorKind::ConfigFile,
            FlagfigError::Coercion { .. } | FlagfigError::InvalidValue(_) => ErrorKind::Coercion,
        }
    }
}

fn display_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
