//! Integration tests for error recovery.
//!
//! A description with mistakes in several places must report each of them
//! once and still build a model of everything that was well formed.

mod common;

use adlc::{AdlError, AdlParser, AdlSession, DiagnosticKind, FormKind, SessionConfig};
use bumpalo::Bump;
use common::{check_counts, check_diagnostics_contain, TestContext};

const PRELUDE: &str = "\
register %{
  reg_def RAX(SOC, SOC, Op_RegI, 0, rax->as_VMReg());
  reg_def RCX(SOC, SOC, Op_RegI, 1, rcx->as_VMReg());
  reg_class int_reg(RAX, RCX);
  alloc_class chunk0(RAX, RCX);
%}
ins_attrib ins_cost(100);
op_attrib op_cost(0);
operand rRegI() %{ match(RegI); interface(REG_INTER); %}
operand immI() %{ match(ConI); interface(CONST_INTER); %}
";

#[test]
fn test_independent_errors_are_all_reported() {
    let ctx = TestContext::new();
    let text = format!(
        "{PRELUDE}\
operand immI() %{{ match(ConL); interface(CONST_INTER); %}}
garbage at top level
instruct addI(rRegI dst, rRegI src) %{{
  match(Set dst (AddI dst src));
  bogus(1);
%}}
instruct subI(rRegI dst, rRegI src) %{{
  match(Set dst (SubI dst src));
%}}
"
    );
    let out = ctx.parse("broken.ad", &text);

    check_counts(&out.diagnostics, 2, 1, 0);
    check_diagnostics_contain(
        &out.diagnostics,
        &[
            "duplicate name immI for operand",
            "Found garbage",
            "instruction attribute at bogus",
        ],
    );
    // Everything after the mistakes is still there.
    assert!(out.model.instruction("addI").is_some());
    assert!(out.model.instruction("subI").is_some());
    assert_eq!(out.model.count(FormKind::Operand), 2);
    assert!(!out.is_success());
}

#[test]
fn test_diagnostics_carry_file_and_line() {
    let ctx = TestContext::new();
    let text = format!("{PRELUDE}\nwhat is this\n");
    let out = ctx.parse("lines.ad", &text);

    let diag = out.diagnostics.of_kind(DiagnosticKind::Syntax).next().unwrap();
    assert_eq!(diag.file, "lines.ad");
    assert_eq!(diag.line, PRELUDE.lines().count() + 2);
    let shown = diag.to_string();
    assert!(shown.starts_with("lines.ad("), "{shown}");
}

#[test]
fn test_missing_required_declarations() {
    let ctx = TestContext::new();
    let out = ctx.parse("empty.ad", "// nothing here\n");

    check_counts(&out.diagnostics, 0, 3, 0);
    check_diagnostics_contain(
        &out.diagnostics,
        &[
            "Did not declare 'register' definitions",
            "Did not declare 'ins_cost' attribute",
            "Did not declare 'op_cost' attribute",
        ],
    );
}

#[test]
fn test_unbalanced_conditional_is_reported() {
    let ctx = TestContext::new();
    let text = format!("{PRELUDE}#ifdef AMD64\nop_attrib op_wide(1);\n");
    let out = ctx.parse("cond.ad", &text);

    check_diagnostics_contain(&out.diagnostics, &["End of file inside #ifdef"]);
    assert!(out.model.lookup("op_wide").is_none());
}

#[test]
fn test_undefined_predefine_is_removed() {
    let ctx = TestContext::new();
    let text = format!("{PRELUDE}#ifndef AMD64\nop_attrib op_narrow(1);\n#endif\n");
    let config = SessionConfig::new("undef.ad")
        .define("AMD64", "1")
        .undefine("AMD64");
    let out = ctx.parse_with(config, &text);

    assert!(out.is_success(), "{}", out.diagnostics);
    assert!(out.model.lookup("op_narrow").is_some());
}

#[test]
fn test_deep_nesting_is_fatal() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let session = AdlSession::new(&arena, SessionConfig::new("deep.ad"));
    let mut text = String::from(PRELUDE);
    for _ in 0..64 {
        text.push_str("#ifdef X\n");
    }
    let result = AdlParser::new(&session, &text).parse();

    match result {
        Err(AdlError::PreprocessorNesting { file, .. }) => assert_eq!(file, "deep.ad"),
        other => panic!("expected a nesting error, got {:?}", other.map(|o| o.diagnostics)),
    }
}

#[test]
fn test_session_statistics() {
    let _ = env_logger::builder().is_test(true).try_init();
    let arena = Bump::new();
    let session = AdlSession::new(&arena, SessionConfig::new("stats.ad"));
    let text = format!(
        "{PRELUDE}\
instruct addI_mem(rRegI dst, rRegI src) %{{
  match(Set dst (AddI (SubI dst src) src));
%}}
"
    );
    let out = AdlParser::new(&session, &text).parse().unwrap();
    assert!(out.is_success(), "{}", out.diagnostics);

    let stats = session.stats();
    assert!(stats.lines_scanned >= text.lines().count());
    assert_eq!(stats.form_counts.get("instruct"), Some(&2));
    assert!(stats.arena_bytes > 0);
    assert!(stats.to_string().contains("instruct"));
}
