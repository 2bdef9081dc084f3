// This module gathers the shared infrastructure of the ADLC front end, the pieces every part of
// the parser and model build on regardless of which declaration they handle: the session that
// owns the bump arena, the interner and the run statistics; the typed slot arena holding the
// declaration forms; the name dictionary and the ordered name, segment and form lists; the
// diagnostics collected while parsing; and the fatal error type. Nothing here knows the
// grammar of an architecture description.

//! Core ADLC Infrastructure
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based string interning using `bumpalo`
//! - Run configuration and parse statistics
//!
//! ## Forms Storage (`arena`)
//! - Generation-checked handles into a typed slot arena
//!
//! ## Name Tables (`dict`, `lists`)
//! - Hash dictionary keyed by interned names
//! - Ordered name lists, format/encode segments and form lists
//!
//! ## Reporting (`diagnostics`, `error`)
//! - Recoverable syntax errors, semantic errors and warnings
//! - Fatal errors that end a session

pub mod arena;
pub mod diagnostics;
pub mod dict;
pub mod error;
pub mod lists;
pub mod session;
pub mod test_utils;

// Re-export core components
pub use arena::{Arena, Handle};

pub use dict::Dict;

pub use lists::{FormList, NameList, Segment};

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};

pub use error::{AdlError, AdlResult};

pub use session::{AdlSession, SessionConfig, SessionStats};
