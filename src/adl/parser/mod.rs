// This module is the recursive-descent parser of the architecture description language. One
// AdlParser reads one description: it owns the scanner (and with it the preprocessor state
// and the diagnostic accumulator) and the ArchModel being built, and borrows the session for
// arena allocation, interning and statistics. The top-level loop dispatches on the leading
// keyword of each declaration to a sub-parser; the sub-parsers live in sibling files grouped
// by the part of the model they fill. Recovery follows one rule throughout: a diagnostic
// abandons the rest of the current line and parsing resumes with the next token, so one run
// reports many independent mistakes. Whole-description checks run after the last line.

//! Architecture description parser.
//!
//! ```ignore
//! use adlc::adl::AdlParser;
//! use adlc::core::{AdlSession, SessionConfig};
//! use bumpalo::Bump;
//!
//! let arena = Bump::new();
//! let session = AdlSession::new(&arena, SessionConfig::new("x86_64.ad"));
//! let output = AdlParser::new(&session, &text).parse()?;
//! if !output.diagnostics.is_success() {
//!     eprintln!("{}", output.diagnostics);
//! }
//! ```

mod encode;
mod frame;
mod instruct;
mod operand;
mod peephole;
mod pipeline;
mod register;

use crate::adl::forms::{AttrKind, Attribute, AttributeForm, Form, OpClassForm, SourceForm, SourceKind};
use crate::adl::ideal;
use crate::adl::model::{ArchModel, IntDef};
use crate::adl::scanner::{is_int_token, Scanner};
use crate::core::{AdlResult, AdlSession, Dict, DiagnosticKind, Diagnostics, NameList};

/// Result of a completed parse.
#[derive(Debug)]
pub struct ParseOutput<'a> {
    pub model: ArchModel<'a>,
    pub diagnostics: Diagnostics,
}

impl ParseOutput<'_> {
    /// The model may be handed to a code generator.
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_success()
    }
}

pub struct AdlParser<'s, 'a> {
    session: &'s AdlSession<'a>,
    scanner: Scanner<'a>,
    model: ArchModel<'a>,
    peephole_count: usize,
}

impl<'s, 'a> AdlParser<'s, 'a> {
    /// Parser over `text`, which is copied into the session arena. The
    /// session's predefined symbols are applied before the first line.
    pub fn new(session: &'s AdlSession<'a>, text: &str) -> Self {
        let config = session.config();
        let src = session.alloc_str(text);
        let mut scanner = Scanner::new(
            session.arena(),
            src,
            &config.file_name,
            config.location_markers,
        );
        for (name, value) in &config.defines {
            let name = session.intern(name);
            let value = session.intern(value);
            scanner.preproc_mut().define(name, value);
        }
        for name in &config.undefines {
            scanner.preproc_mut().undefine(name);
        }
        Self {
            session,
            scanner,
            model: ArchModel::new(),
            peephole_count: 0,
        }
    }

    /// Parse the whole description. Only fatal conditions are returned
    /// as errors; everything else is in the output diagnostics.
    pub fn parse(mut self) -> AdlResult<ParseOutput<'a>> {
        log::debug!("Parsing architecture description {}", self.scanner.file_name());
        loop {
            self.scanner.skip_ws();
            if self.scanner.is_eof() {
                break;
            }
            let Some(ident) = self.scanner.ident() else {
                continue;
            };
            self.declaration(ident);
            // A declaration owns the rest of the line it ends on.
            if !self.scanner.at_line_head() {
                self.scanner.skip_to_eol();
            }
        }
        self.finish();

        if let Some(fatal) = self.scanner.take_fatal() {
            return Err(fatal);
        }
        let diagnostics = self.scanner.take_diagnostics();
        log::debug!(
            "Parsed {} forms: {} syntax errors, {} semantic errors, {} warnings",
            self.model.num_forms(),
            diagnostics.syntax_errors(),
            diagnostics.semantic_errors(),
            diagnostics.warnings()
        );
        Ok(ParseOutput {
            model: self.model,
            diagnostics,
        })
    }

    fn declaration(&mut self, ident: &'a str) {
        match ident {
            "instruct" => self.instruct(),
            "operand" => self.operand(),
            "opclass" => self.opclass(),
            "ins_attrib" => self.attribute_decl(AttrKind::Instruction),
            "op_attrib" => self.attribute_decl(AttrKind::Operand),
            "source" => self.source(),
            "source_hpp" => self.source_hpp(),
            "register" => self.register_block(),
            "frame" => self.frame(),
            "encode" => self.encode_block(),
            "pipeline" => self.pipeline(),
            "definitions" => self.definitions(),
            "peephole" => self.peephole(),
            "#line" => self.scanner.line_directive(),
            "#define" => self.scanner.define_directive(),
            "#undef" => self.scanner.undef_directive(),
            _ => self.scanner.syntax_error(format!(
                "expected one of - instruct, operand, ins_attrib, op_attrib, source, register, \
                 pipeline, encode\n     Found {}",
                ident
            )),
        }
    }

    /// Checks that need the whole description.
    fn finish(&mut self) {
        if self.model.registers().is_none() {
            self.scanner
                .semantic_error("Did not declare 'register' definitions");
        }
        if let Some(regs) = self.model.ensure_registers() {
            regs.add_spill_reg_class();
            regs.add_dynamic_reg_class();
        }

        if self.scanner.preproc().depth() != 0 {
            self.scanner.syntax_error("End of file inside #ifdef");
        }

        if self.model.attribute(ideal::INS_COST, AttrKind::Instruction).is_none() {
            self.scanner
                .semantic_error("Did not declare 'ins_cost' attribute");
        }
        if self.model.attribute(ideal::OP_COST, AttrKind::Operand).is_none() {
            self.scanner.semantic_error("Did not declare 'op_cost' attribute");
        }

        for issue in self.model.build_components() {
            self.scanner
                .report_at(DiagnosticKind::Syntax, issue.line, issue.message);
        }

        self.session.record_lines(self.scanner.line());
        let defines = self.scanner.preproc_mut().take_defines();
        self.model.set_preproc_defs(defines);
    }

    // ----- shared helpers -----

    /// Consume `%{` after optional whitespace.
    fn open_block(&mut self) -> bool {
        self.scanner.skip_ws();
        if self.scanner.cur() == b'%' && self.scanner.peek() == b'{' {
            self.scanner.next_char();
            self.scanner.next_char();
            true
        } else {
            false
        }
    }

    /// Consume `%}` after optional whitespace.
    fn close_block(&mut self) -> bool {
        self.scanner.skip_ws();
        if self.scanner.at_block_end() {
            self.scanner.next_char();
            self.scanner.next_char();
            true
        } else {
            false
        }
    }

    /// Consume `c` after optional whitespace, reporting `message` if it is
    /// somewhere else.
    fn expect(&mut self, c: u8, message: &str) -> bool {
        self.scanner.skip_ws();
        if self.scanner.cur() == c {
            self.scanner.next_char();
            true
        } else {
            self.scanner.syntax_error(message);
            false
        }
    }

    /// Consume `c` after optional whitespace if it is there.
    fn accept(&mut self, c: u8) -> bool {
        self.scanner.skip_ws();
        if self.scanner.cur() == c {
            self.scanner.next_char();
            true
        } else {
            false
        }
    }

    /// At the end of a body: `%}` or end of input.
    fn at_body_end(&mut self) -> bool {
        self.scanner.skip_ws();
        self.scanner.at_block_end() || self.scanner.is_eof()
    }

    /// `( expr )` that must be present.
    fn required_paren_expr(
        &mut self,
        desc: &str,
        with_location: bool,
        missing: &str,
    ) -> Option<&'a str> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error(missing);
            return None;
        }
        self.scanner.paren_expr(desc, with_location)
    }

    /// Name of a new global declaration. A name already bound is reported
    /// and flagged; the caller still parses the body so recovery stays on
    /// the declaration.
    fn declared_name(&mut self, desc: &str) -> Option<(&'a str, bool)> {
        let line = self.scanner.line();
        let name = self.scanner.ident()?;
        let duplicate = self.model.is_declared(name);
        if duplicate {
            self.scanner.report_at(
                DiagnosticKind::Semantic,
                line,
                format!("duplicate name {} for {}", name, desc),
            );
        }
        Some((name, duplicate))
    }

    /// Bind `form` to `name`. A taken name, such as a derived clone name
    /// colliding with an earlier declaration, drops the form with a
    /// semantic error.
    fn add_declared(&mut self, name: &'a str, form: Form<'a>) -> bool {
        let kind = form.kind();
        let line = form.line();
        match self.model.declare(name, form) {
            Ok(_) => {
                self.session.record_form(kind.name());
                log::debug!("Parsed {} form {}", kind.name(), name);
                true
            }
            Err(_) => {
                self.scanner.report_at(
                    DiagnosticKind::Semantic,
                    line,
                    format!("duplicate name {} for {}", name, kind.name()),
                );
                false
            }
        }
    }

    /// `predicate ( expr );`
    fn predicate(&mut self) -> Option<&'a str> {
        let pred = self.required_paren_expr(
            "pred expression",
            true,
            "incorrect or missing expression for 'predicate'",
        )?;
        log::trace!("Predicate: {}", pred);
        if !self.expect(b';', "missing ';' in predicate definition") {
            return None;
        }
        Some(pred)
    }

    /// `name ( expr );` setting an attribute in a body.
    fn attribute(&mut self, name: &'a str, kind: AttrKind) -> Option<Attribute<'a>> {
        let value = self.required_paren_expr(
            "attribute",
            false,
            "incorrect or missing expression for 'attribute'",
        )?;
        if !self.expect(b';', "missing ';' in attribute definition") {
            return None;
        }
        Some(Attribute { name, value, kind })
    }

    /// Attribute declaration `name` of `kind` visible to a body.
    fn is_attribute(&self, name: &str, kind: AttrKind) -> bool {
        self.model.attribute(name, kind).is_some()
    }

    /// Formal parameter list, cursor on the '('. Each parameter is an
    /// operand or operand class type followed by a fresh local name.
    fn oplist(&mut self, params: &mut NameList<'a>, locals: &mut Dict<'a, &'a str>) {
        loop {
            self.scanner.next_char();
            self.scanner.skip_ws();
            if self.scanner.cur() == b')' {
                break;
            }
            let Some(ty) = self.scanner.ident() else {
                return;
            };
            let type_ok = self.model.lookup_form(ty).map(Form::is_opclass);
            match type_ok {
                None => {
                    self.scanner
                        .syntax_error(format!("undefined operand type {}", ty));
                    return;
                }
                Some(false) => {
                    self.scanner
                        .syntax_error(format!("identifier {} not operand type", ty));
                    return;
                }
                Some(true) => {}
            }
            let Some(name) = self.scanner.ident() else {
                return;
            };
            if locals.contains(name) {
                self.scanner
                    .syntax_error(format!("duplicate name {} for operand", name));
                return;
            }
            if self.model.is_declared(name) {
                self.scanner
                    .syntax_error(format!("Reuse of global name {} as operand.", name));
                return;
            }
            locals.insert(name, ty);
            params.add_name(name);
            log::trace!("\tOperand {} {}", ty, name);
            self.scanner.skip_ws();
            if self.scanner.cur() != b',' {
                break;
            }
        }
        if self.scanner.cur() != b')' {
            self.scanner.syntax_error("missing ')'");
        } else {
            self.scanner.next_char();
        }
    }

    // ----- small top-level declarations -----

    /// `opclass NAME ( oper, oper, ... );`
    fn opclass(&mut self) {
        let line = self.scanner.line();
        let Some((name, duplicate)) = self.declared_name("opclass") else {
            return;
        };
        let mut class = OpClassForm {
            ident: name,
            line,
            members: NameList::new(),
        };
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error("missing '(' in operand definition");
            return;
        }
        loop {
            self.scanner.next_char();
            let Some(member) = self.scanner.ident() else {
                return;
            };
            if self.model.operand(member).is_some() {
                class.members.add_name(member);
            } else {
                self.scanner.syntax_error(format!(
                    "expected name of a defined operand at {}",
                    member
                ));
                return;
            }
            self.scanner.skip_ws();
            if self.scanner.cur() != b',' {
                break;
            }
        }
        if !self.expect(b')', "missing ')' or ',' in opclass definition") {
            return;
        }
        if !self.expect(b';', "missing ';' in opclass definition") {
            return;
        }
        if duplicate {
            return;
        }
        for member in class.members.iter() {
            if let Some(oper) = self.model.operand_mut(member) {
                oper.classes.add_name(name);
            }
        }
        self.add_declared(name, Form::OpClass(class));
    }

    /// `ins_attrib NAME ( default );` or `op_attrib NAME ( default );`
    fn attribute_decl(&mut self, kind: AttrKind) {
        let keyword = match kind {
            AttrKind::Instruction => "ins_attrib",
            AttrKind::Operand => "op_attrib",
        };
        let line = self.scanner.line();
        let Some((name, duplicate)) = self.declared_name(keyword) else {
            return;
        };
        let Some(default) = self.required_paren_expr(
            "attribute default expression string",
            false,
            &format!("missing '(' in {} definition", keyword),
        ) else {
            return;
        };
        log::trace!("Attribute expression: {}", default);
        if !self.expect(b';', &format!("missing ';' in {} definition", keyword)) {
            return;
        }
        if !duplicate {
            let form = AttributeForm {
                ident: name,
                line,
                kind,
                default,
            };
            self.add_declared(name, Form::Attribute(form));
        }
    }

    /// `definitions %{ int_def ... %}`
    fn definitions(&mut self) {
        if !self.open_block() {
            self.scanner
                .syntax_error("Missing %{ ... %} block after definitions keyword.");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                continue;
            };
            if token == "int_def" {
                self.int_def();
            } else {
                self.scanner.syntax_error(format!(
                    "unexpected token {} inside definitions block.",
                    token
                ));
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of definitions block.");
        }
    }

    /// `int_def NAME ( value [, description] );`
    fn int_def(&mut self) {
        let Some(name) = self.scanner.ident() else {
            return;
        };
        let mut value = 0;
        let mut description = None;
        if self.accept(b'(') {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            let Some(parsed) = is_int_token(token) else {
                self.scanner
                    .syntax_error("value in int_def is not recognized as integer");
                return;
            };
            value = parsed;
            if self.accept(b',') {
                let Some(desc) = self.scanner.expr("int_def description", ")") else {
                    return;
                };
                description = Some(desc.trim());
            }
            if !self.expect(b')', "missing ')' in int_def definition statement") {
                return;
            }
        }
        if !self.expect(b';', "missing ';' after int_def") {
            return;
        }
        log::trace!("int_def: {} ( {}, {:?} )", name, value, description);
        let def = IntDef {
            name,
            value,
            description,
        };
        if !self.model.define_int(def) {
            self.scanner.syntax_error("Duplicate definition");
        }
    }

    /// `source %{ ... %}`
    fn source(&mut self) {
        let line = self.scanner.line();
        self.scanner.skip_ws();
        let Some(code) = self.scanner.cpp_block("source block") else {
            self.scanner
                .syntax_error("incorrect or missing block for 'source'.");
            return;
        };
        self.add_source(SourceKind::Source, line, code);
    }

    /// `source_hpp %{ ... %}`; before the register block it is a
    /// pre-header.
    fn source_hpp(&mut self) {
        let line = self.scanner.line();
        self.scanner.skip_ws();
        let Some(code) = self.scanner.cpp_block("source_hpp block") else {
            self.scanner
                .syntax_error("incorrect or missing block for 'source_hpp'.");
            return;
        };
        let kind = if self.model.registers().is_none() {
            SourceKind::PreHeader
        } else {
            SourceKind::Header
        };
        self.add_source(kind, line, code);
    }

    fn add_source(&mut self, kind: SourceKind, line: usize, code: &'a str) {
        self.session.record_code_block(code.len());
        self.session.record_form("source");
        self.model.add_form(Form::Source(SourceForm { kind, line, code }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionConfig;
    use bumpalo::Bump;

    const PRELUDE: &str = "\
register %{
  reg_def RAX(SOC, SOC, Op_RegI, 0, rax->as_VMReg());
  alloc_class chunk0(RAX);
%}
ins_attrib ins_cost(100);
op_attrib op_cost(0);
";

    fn parse<'a>(arena: &'a Bump, text: &str) -> ParseOutput<'a> {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = AdlSession::new(arena, SessionConfig::new("test.ad"));
        AdlParser::new(&session, text).parse().unwrap()
    }

    #[test]
    fn test_empty_description_reports_missing_blocks() {
        let arena = Bump::new();
        let out = parse(&arena, "");
        let diags = &out.diagnostics;
        assert_eq!(diags.semantic_errors(), 3);
        assert_eq!(diags.count_containing("Did not declare 'register'"), 1);
        assert_eq!(diags.count_containing("'ins_cost' attribute"), 1);
        assert_eq!(diags.count_containing("'op_cost' attribute"), 1);
        // Spill and dynamic classes exist even without a register block.
        let regs = out.model.registers().unwrap();
        assert!(regs.reg_class("stack_slots").is_some());
        assert!(regs.reg_class("dynamic").is_some());
    }

    #[test]
    fn test_prelude_is_clean() {
        let arena = Bump::new();
        let out = parse(&arena, PRELUDE);
        assert!(out.is_success(), "{}", out.diagnostics);
        assert_eq!(out.model.attributes().count(), 2);
        assert_eq!(
            out.model.attribute("ins_cost", AttrKind::Instruction).unwrap().default,
            "100"
        );
    }

    #[test]
    fn test_unknown_keyword_skips_line() {
        let arena = Bump::new();
        let text = format!("{}bogus stuff here\nop_attrib op_size(1);\n", PRELUDE);
        let out = parse(&arena, &text);
        assert_eq!(out.diagnostics.syntax_errors(), 1);
        assert_eq!(out.diagnostics.count_containing("Found bogus"), 1);
        assert!(out.model.attribute("op_size", AttrKind::Operand).is_some());
    }

    #[test]
    fn test_int_defs() {
        let arena = Bump::new();
        let text = format!(
            "{}definitions %{{\n  int_def DEFAULT_COST ( 100, 100);\n  \
             int_def HUGE_COST (1000000, 10000 * DEFAULT_COST);\n  \
             int_def DEFAULT_COST (7);\n%}}\n",
            PRELUDE
        );
        let out = parse(&arena, &text);
        assert_eq!(out.diagnostics.count_containing("Duplicate definition"), 1);
        let huge = out.model.int_def("HUGE_COST").unwrap();
        assert_eq!(huge.value, 1_000_000);
        assert_eq!(huge.description, Some("10000 * DEFAULT_COST"));
        assert_eq!(out.model.int_def("DEFAULT_COST").unwrap().value, 100);
    }

    #[test]
    fn test_source_hpp_placement() {
        let arena = Bump::new();
        let text = format!(
            "source_hpp %{{ #include \"early.hpp\" %}}\n{}source_hpp %{{ late %}}\nsource %{{ body %}}\n",
            PRELUDE
        );
        let out = parse(&arena, &text);
        assert!(out.is_success(), "{}", out.diagnostics);
        let kinds: Vec<_> = out.model.sources().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SourceKind::PreHeader, SourceKind::Header, SourceKind::Source]
        );
        assert_eq!(out.model.sources().last().unwrap().code.trim(), "body");
    }

    #[test]
    fn test_session_defines_reach_the_preprocessor() {
        let _ = env_logger::builder().is_test(true).try_init();
        let arena = Bump::new();
        let config = SessionConfig::new("test.ad").define("_LP64", "1");
        let session = AdlSession::new(&arena, config);
        let text = format!(
            "{}#ifdef _LP64\nop_attrib op_wide(1);\n#else\nop_attrib op_narrow(1);\n#endif\n",
            PRELUDE
        );
        let out = AdlParser::new(&session, &text).parse().unwrap();
        assert!(out.is_success(), "{}", out.diagnostics);
        assert!(out.model.lookup("op_wide").is_some());
        assert!(out.model.lookup("op_narrow").is_none());
        assert_eq!(out.model.preproc_def("_LP64"), Some("1"));
    }
}
