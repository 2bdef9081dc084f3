//! Test utilities for arena-based testing.
//!
//! Every parse borrows its forms and names from a bump arena that must
//! outlive the returned model; these helpers keep the arena in a context
//! the test owns.

#[cfg(test)]
pub mod test {
    use super::super::session::{AdlSession, SessionConfig};
    use crate::adl::{AdlParser, ParseOutput};
    use bumpalo::Bump;

    /// Registers, cost attributes and two operands: the smallest
    /// description that parses without diagnostics and has something for
    /// instructions to match.
    pub const MINIMAL_AD: &str = "\
register %{
  reg_def RAX(SOC, SOC, Op_RegI, 0, rax->as_VMReg());
  reg_class int_reg(RAX);
  alloc_class chunk0(RAX);
%}
ins_attrib ins_cost(100);
op_attrib op_cost(0);
operand rRegI() %{ match(RegI); interface(REG_INTER); %}
operand immI() %{ match(ConI); interface(CONST_INTER); %}
";

    /// Test context that owns the arena of one or more parses.
    pub struct TestContext {
        arena: Bump,
    }

    impl TestContext {
        pub fn new() -> Self {
            init_logging();
            Self { arena: Bump::new() }
        }

        pub fn arena(&self) -> &Bump {
            &self.arena
        }

        pub fn create_session(&self, config: SessionConfig) -> AdlSession<'_> {
            AdlSession::new(&self.arena, config)
        }

        /// Parse `text` as `test.ad` with default settings.
        pub fn parse(&self, text: &str) -> ParseOutput<'_> {
            self.parse_with(SessionConfig::new("test.ad"), text)
        }

        /// Parse `text` under `config`.
        ///
        /// # Panics
        /// On a fatal error; tests expecting one call the parser directly.
        pub fn parse_with(&self, config: SessionConfig, text: &str) -> ParseOutput<'_> {
            let session = self.create_session(config);
            AdlParser::new(&session, text)
                .parse()
                .unwrap_or_else(|e| panic!("fatal error parsing test input: {}", e))
        }

        /// Parse `body` after [`MINIMAL_AD`].
        pub fn parse_minimal(&self, body: &str) -> ParseOutput<'_> {
            self.parse(&format!("{}{}", MINIMAL_AD, body))
        }

        pub fn memory_used(&self) -> usize {
            self.arena.allocated_bytes()
        }
    }

    impl Default for TestContext {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Route `log` output through the test harness.
    pub fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Run a test with a temporary arena context.
    pub fn with_test_context<F, R>(f: F) -> R
    where
        F: FnOnce(&TestContext) -> R,
    {
        let ctx = TestContext::new();
        f(&ctx)
    }

    #[test]
    fn test_minimal_description_is_clean() {
        with_test_context(|ctx| {
            let out = ctx.parse_minimal("");
            assert!(out.diagnostics.is_empty(), "{}", out.diagnostics);
            assert!(out.model.operand("rRegI").is_some());
            assert!(ctx.memory_used() > 0);
        });
    }
}
