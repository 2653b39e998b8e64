use strum::EnumIs;
use thiserror::Error;

use crate::registry::LetName;

/// Error type returned by a memoized computation.
///
/// Boxed so computations may use `?` on any error type, including [`MemoError`] when they read
/// other memoized attributes.
pub type ComputeError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, EnumIs, Error)]
pub enum MemoError {
    /// The computation bound to an attribute failed.
    ///
    /// For mutable blueprints the slot stays unset and the next access retries. For immutable
    /// blueprints the failure aborts construction of the whole instance.
    #[error("Computation of memoized attribute `{name}` failed: {source}")]
    Computation { name: LetName, source: ComputeError },

    /// The requested attribute was never declared on the blueprint.
    #[error("Attribute `{name}` is not declared on blueprint `{blueprint}`")]
    Undeclared { blueprint: String, name: LetName },

    /// A slot was read before it was populated.
    #[error(
        "Attribute `{name}` was read before its slot was populated. Eager attributes can only depend on attributes declared before them."
    )]
    Unset { name: LetName },

    /// A lazy attribute was read again while its own computation was still running.
    #[error("Attribute `{name}` depends on itself")]
    Cycle { name: LetName },

    /// A typed read requested a type different from the one stored in the slot.
    #[error("Attribute `{name}` does not hold a value of type `{expected}`")]
    TypeMismatch {
        name: LetName,
        expected: &'static str,
    },

    /// An instance was frozen while one of its slots was still unset.
    #[error("Cannot freeze an instance of `{blueprint}`: attribute `{name}` has not been computed")]
    Unpopulated { blueprint: String, name: LetName },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("An unknown error occurred: {0}")]
    Unknown(String),
}

pub type MemoResult<T> = Result<T, MemoError>;
