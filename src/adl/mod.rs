// This module is the architecture description language front end: the scanner and its
// preprocessor, the recursive-descent parser, and the model the parser builds. The model side
// is split by concern: the closed Form sum type and its records, match-rule trees with the
// commutative cloning they support, operand components, the register, pipeline, peephole,
// encode and frame sub-models, the built-in names of the ideal graph, and ArchModel, which
// ties them together behind one global name table. Everything borrows from the session arena.

//! ADL scanner, parser and architecture model.
//!
//! # Key Components
//!
//! ## Scanning (`scanner`, `preproc`)
//! - Line cursor with comment skipping and verbatim code capture
//! - `#ifdef`/`#ifndef`/`#else`/`#endif`, `#define`, `#undef`, `#line`
//!
//! ## Parsing (`parser`)
//! - One entry point, [`AdlParser::parse`], returning the model and its diagnostics
//! - Declaration sub-parsers for instructions, operands, registers, pipeline,
//!   encode classes, frame and peepholes
//!
//! ## Model (`model`, `forms`)
//! - [`ArchModel`]: ordered forms, global lookup, chain rules, internal operands
//! - [`Form`]: one variant per declaration kind

pub mod components;
pub mod encode;
pub mod forms;
pub mod frame;
pub mod ideal;
pub mod match_rule;
pub mod model;
pub mod parser;
pub mod peephole;
pub mod pipeline;
pub mod preproc;
pub mod register;
pub mod scanner;

pub use components::{Component, ComponentList, UseDef};

pub use forms::{
    AttrKind, Attribute, AttributeForm, Form, FormId, FormKind, InstructForm, Interface,
    OpClassForm, OperandForm, SourceForm, SourceKind,
};

pub use match_rule::{MatchNode, MatchRule};

pub use model::{ArchModel, ChainRule, IntDef};

pub use parser::{AdlParser, ParseOutput};

pub use scanner::Scanner;
