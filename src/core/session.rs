// This module provides arena-based session management for the ADLC front end using the
// bumpalo crate. AdlSession owns the reference to the bump arena that stores every interned
// name and every verbatim code block of an architecture description, so the whole parsed
// model shares one lifetime and is released as a unit when the arena is dropped. The session
// also carries the user configuration (source file name, #line location markers, debug
// level, predefined preprocessor symbols, an optional allocation limit) and accumulates
// SessionStats: declarations parsed per kind, derived commutative clones, chain rules and
// code blocks captured. Sessions are single-threaded; interior mutability uses RefCell.

//! Arena-based parsing session.
//!
//! All forms borrow their names and code text from the session arena, which
//! outlives the parser and the produced model.

use bumpalo::Bump;
use hashbrown::HashSet;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// User-controlled session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Name reported in diagnostics and `#line` markers.
    pub file_name: String,
    /// Wrap captured code blocks in `#line` markers.
    pub location_markers: bool,
    /// 0 is quiet; higher levels trace more of the parse.
    pub debug_level: u8,
    /// Preprocessor symbols defined before the first line, as `(name, value)`.
    pub defines: Vec<(String, String)>,
    /// Symbols removed after `defines` are applied.
    pub undefines: Vec<String>,
    /// Upper bound on arena bytes; exceeding it aborts the process.
    pub arena_limit: Option<usize>,
}

impl SessionConfig {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Self::default()
        }
    }

    pub fn with_location_markers(mut self, enabled: bool) -> Self {
        self.location_markers = enabled;
        self
    }

    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    pub fn undefine(mut self, name: impl Into<String>) -> Self {
        self.undefines.push(name.into());
        self
    }
}

/// Arena-based parsing session.
pub struct AdlSession<'a> {
    /// Arena holding interned names and code text.
    arena: &'a Bump,

    config: SessionConfig,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// Interned names, deduplicated by content.
    interned_strings: RefCell<HashSet<&'a str>>,
}

impl<'a> AdlSession<'a> {
    /// Create a new session over `arena`.
    pub fn new(arena: &'a Bump, config: SessionConfig) -> Self {
        arena.set_allocation_limit(config.arena_limit);
        Self {
            arena,
            config,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashSet::new()),
        }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn file_name(&self) -> &str {
        &self.config.file_name
    }

    /// Allocate an object in the session arena.
    pub fn alloc<T>(&self, value: T) -> &'a mut T {
        self.arena.alloc(value)
    }

    /// Intern a name in the arena.
    pub fn intern(&self, s: &str) -> &'a str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned: &'a str = self.arena.alloc_str(s);
        strings.insert(interned);
        interned
    }

    /// Copy text into the arena without deduplication.
    pub fn alloc_str(&self, s: &str) -> &'a str {
        self.arena.alloc_str(s)
    }

    /// Record that a declaration of `kind` was added to the model.
    pub fn record_form(&self, kind: &'static str) {
        let mut stats = self.stats.borrow_mut();
        stats.forms_created += 1;
        *stats.form_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn record_lines(&self, lines: usize) {
        self.stats.borrow_mut().lines_scanned = lines;
    }

    pub fn record_commutative_clone(&self) {
        self.stats.borrow_mut().commutative_clones += 1;
    }

    pub fn record_chain_rule(&self) {
        self.stats.borrow_mut().chain_rules += 1;
    }

    pub fn record_code_block(&self, bytes: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.code_blocks += 1;
        stats.code_bytes += bytes;
    }

    /// Get session statistics.
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.borrow().clone();
        stats.interned_strings = self.interned_strings.borrow().len();
        stats.arena_bytes = self.arena.allocated_bytes();
        stats
    }
}

/// Parsing session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Source lines consumed.
    pub lines_scanned: usize,

    /// Forms added to the model.
    pub forms_created: usize,

    /// Forms added per kind.
    pub form_counts: BTreeMap<&'static str, usize>,

    /// Instructions derived by swapping commutative operands.
    pub commutative_clones: usize,

    /// Chain-rule entries recorded.
    pub chain_rules: usize,

    /// Verbatim `%{ %}` blocks captured.
    pub code_blocks: usize,

    /// Total bytes of captured code.
    pub code_bytes: usize,

    pub interned_strings: usize,

    pub arena_bytes: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADLC Session Statistics:")?;
        writeln!(f, "  Lines scanned: {}", self.lines_scanned)?;
        writeln!(f, "  Forms created: {}", self.forms_created)?;
        writeln!(f, "  Commutative clones: {}", self.commutative_clones)?;
        writeln!(f, "  Chain rules: {}", self.chain_rules)?;
        writeln!(
            f,
            "  Code blocks: {} ({} bytes)",
            self.code_blocks, self.code_bytes
        )?;
        writeln!(f, "  Interned strings: {}", self.interned_strings)?;
        writeln!(f, "  Arena bytes: {}", self.arena_bytes)?;

        if !self.form_counts.is_empty() {
            writeln!(f, "  Form breakdown:")?;
            for (kind, count) in &self.form_counts {
                writeln!(f, "    {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}
