//! ADLC - Architecture Description Language front end.
//!
//! Reads the architecture description of a compiler backend (registers,
//! operands, instructions with their match rules and encodings, the
//! pipeline, peephole rules and the stack frame) and builds an in-memory
//! model of it, reporting every syntax and semantic problem it finds along
//! the way instead of stopping at the first.
//!
//! # Primary Usage
//!
//! ```ignore
//! use adlc::{AdlParser, AdlSession, SessionConfig};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = AdlSession::new(&arena, SessionConfig::new("x86_64.ad"));
//! let output = AdlParser::new(&session, &text).parse()?;
//! for diagnostic in output.diagnostics.iter() {
//!     eprintln!("{}", diagnostic);
//! }
//! let add = output.model.instruction("addI_rReg");
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (session, arena, name tables, diagnostics)
//! - [`adl`] - Scanner, preprocessor, parser and the architecture model

pub mod adl;
pub mod core;

// Re-export common types from organized modules
pub use adl::{AdlParser, ArchModel, Form, FormKind, InstructForm, OperandForm, ParseOutput};
pub use core::{
    AdlError, AdlResult, AdlSession, Diagnostic, DiagnosticKind, Diagnostics, SessionConfig,
    SessionStats,
};
