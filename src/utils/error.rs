//! Error handling for cd25c
//!
//! Source-level problems are collected as [`Diagnostic`]s and never travel
//! through this type. `Error` covers the failures that stop the driver.

use crate::utils::Diagnostic;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Compiler error
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("compilation failed with {} diagnostic(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),

    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    #[error("Code generation error: {0}")]
    CodeGen(String),
}

impl Error {
    /// The diagnostics carried by this error, if any
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Diagnostics(diagnostics) => diagnostics,
            Self::DuplicateLabel(_) | Self::CodeGen(_) => &[],
        }
    }
}
