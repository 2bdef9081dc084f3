//! Shared helpers for the integration tests.

#![allow(dead_code)]

use adlc::{AdlParser, AdlSession, Diagnostics, ParseOutput, SessionConfig};
use bumpalo::Bump;
use std::fs;
use std::path::Path;

/// Owns the arena every parse of a test borrows from.
pub struct TestContext {
    arena: Bump,
}

impl TestContext {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self { arena: Bump::new() }
    }

    pub fn parse(&self, name: &str, text: &str) -> ParseOutput<'_> {
        self.parse_with(SessionConfig::new(name), text)
    }

    pub fn parse_with(&self, config: SessionConfig, text: &str) -> ParseOutput<'_> {
        let name = config.file_name.clone();
        let session = AdlSession::new(&self.arena, config);
        AdlParser::new(&session, text)
            .parse()
            .unwrap_or_else(|e| panic!("Fatal error parsing {name}: {e}"))
    }
}

/// Load a description from `tests/data`.
pub fn load_ad_file(filename: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(filename);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

/// Every pattern must occur in at least one diagnostic message.
pub fn check_diagnostics_contain(diagnostics: &Diagnostics, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            diagnostics.count_containing(pattern) > 0,
            "Diagnostics missing expected pattern: '{pattern}'\nAll diagnostics:\n{diagnostics}"
        );
    }
}

/// Error and warning counters, in that order.
pub fn check_counts(diagnostics: &Diagnostics, syntax: usize, semantic: usize, warnings: usize) {
    assert_eq!(
        (
            diagnostics.syntax_errors(),
            diagnostics.semantic_errors(),
            diagnostics.warnings()
        ),
        (syntax, semantic, warnings),
        "unexpected diagnostic counts:\n{diagnostics}"
    );
}
