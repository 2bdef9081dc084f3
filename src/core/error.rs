// This module defines the fatal error types of the ADLC front end using the thiserror crate.
// Almost every problem in an architecture description is recoverable and is recorded as a
// Diagnostic so that one run can report many independent mistakes; AdlError covers only the
// conditions that stop a session outright: conditional-compilation nesting past the fixed
// limit, and failure to read the description file. Arena exhaustion aborts the process
// through bumpalo's allocation-failure path and has no variant here. AdlResult<T> is the
// convenience alias used by the session entry points.

//! Fatal error types for the ADLC front end.
//!
//! Using thiserror for idiomatic error handling.

use thiserror::Error;

/// Errors that abort a parsing session.
#[derive(Error, Debug)]
pub enum AdlError {
    #[error("{file}({line}): #ifdef nesting exceeds the limit of {limit}")]
    PreprocessorNesting {
        file: String,
        line: usize,
        limit: usize,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for session operations.
pub type AdlResult<T> = Result<T, AdlError>;
