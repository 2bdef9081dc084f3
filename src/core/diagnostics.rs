// This module implements the structured diagnostic accumulator of a parsing session. Every
// recoverable problem found while scanning or analysing an architecture description is
// recorded as a Diagnostic carrying its kind (syntax error, semantic error or warning), the
// file and line it was found on, the message, and for syntax errors the offending source line
// with the error position marked. Diagnostics keeps per-kind counters so the caller can decide
// whether the produced model may be handed to a code generator: warnings never block it, any
// syntax or semantic error does. Nothing here prints; the driver decides how to report.

//! Diagnostics collected while parsing.

use std::fmt;

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Syntax,
    Semantic,
    Warning,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Syntax => "Syntax Error",
            DiagnosticKind::Semantic => "Semantic Error",
            DiagnosticKind::Warning => "Warning",
        }
    }

    pub fn is_error(self) -> bool {
        !matches!(self, DiagnosticKind::Warning)
    }
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    pub line: usize,
    pub message: String,
    /// Source line with the error position marked as `>>>c<<<`.
    pub context: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) {}: {}",
            self.file,
            self.line,
            self.kind.label(),
            self.message
        )?;
        if let Some(context) = &self.context {
            write!(f, "\nError Context:  {}", context)?;
        }
        Ok(())
    }
}

/// Accumulator with per-kind counters.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    syntax_errors: usize,
    semantic_errors: usize,
    warnings: usize,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.kind {
            DiagnosticKind::Syntax => self.syntax_errors += 1,
            DiagnosticKind::Semantic => self.semantic_errors += 1,
            DiagnosticKind::Warning => self.warnings += 1,
        }
        log::debug!("{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn syntax_errors(&self) -> usize {
        self.syntax_errors
    }

    pub fn semantic_errors(&self) -> usize {
        self.semantic_errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// The model is usable only when no error of either kind was recorded.
    pub fn is_success(&self) -> bool {
        self.syntax_errors == 0 && self.semantic_errors == 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.items.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    /// Number of diagnostics whose message contains `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.items
            .iter()
            .filter(|d| d.message.contains(needle))
            .count()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.items {
            writeln!(f, "{}", d)?;
        }
        write!(
            f,
            "{} syntax errors, {} semantic errors, {} warnings",
            self.syntax_errors, self.semantic_errors, self.warnings
        )
    }
}
