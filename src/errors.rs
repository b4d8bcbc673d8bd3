use miette::Diagnostic;
use sea_orm::{DbErr, SqlErr, TransactionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of named record a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Resource,
    Role,
    Action,
    Tag,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Resource => "resource",
            EntityKind::Role => "role",
            EntityKind::Action => "action",
            EntityKind::Tag => "tag",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum CanopyError {
    #[error("{kind} `{name}` not found")]
    #[diagnostic(
        code(canopy::not_found),
        help("Aliases are case-sensitive; check that the record was created")
    )]
    NotFound { kind: EntityKind, name: String },

    #[error("Root node of the {kind} tree cannot be removed")]
    #[diagnostic(code(canopy::protected_node))]
    ProtectedNode { kind: EntityKind },

    #[error("Conflict: {0}")]
    #[diagnostic(code(canopy::conflict))]
    Conflict(String),

    #[error("Storage error: {0}")]
    #[diagnostic(code(canopy::storage))]
    Storage(#[from] DbErr),

    #[error("Role-deleted handler failed: {0}")]
    #[diagnostic(code(canopy::hook))]
    Hook(String),

    #[error("Config error: {0}")]
    #[diagnostic(code(canopy::config))]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(canopy::io))]
    Io(#[from] std::io::Error),
}

impl CanopyError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        CanopyError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Classify a store error, separating unique-key violations from other faults.
    pub fn from_db(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => CanopyError::Conflict(msg),
            _ => CanopyError::Storage(err),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CanopyError::Conflict(_))
    }
}

impl From<TransactionError<CanopyError>> for CanopyError {
    fn from(err: TransactionError<CanopyError>) -> Self {
        match err {
            TransactionError::Connection(db) => CanopyError::Storage(db),
            TransactionError::Transaction(inner) => inner,
        }
    }
}

/// Turn a duplicate-key insert into a no-op, passing every other result through.
pub(crate) fn ignore_conflict<T>(result: Result<T, DbErr>) -> Result<(), CanopyError> {
    match result.map_err(CanopyError::from_db) {
        Ok(_) => Ok(()),
        Err(e) if e.is_conflict() => Ok(()),
        Err(e) => Err(e),
    }
}
