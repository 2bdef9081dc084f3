// Code-carrying clauses: the encode block with its enc_class templates, an instruction's
// ins_encode and postalloc_expand (either a list of encode class invocations or an inline
// body that becomes a synthesized class), constant-table expressions, and format strings.
// Bodies are split into literal text and `$` replacement variables as they are read; format
// strings additionally undo the `\$` and `\%` escapes, so their text is copied into the
// arena rather than sliced from the source.

use crate::adl::encode::{constant_class_name, inline_class_name, EncClass, MASM_PREAMBLE};
use crate::adl::forms::{FormatRule, InsEncode, InstructForm, Opcode};
use crate::adl::parser::AdlParser;
use crate::adl::scanner::{is_literal_constant, END_LINE_MARKER};
use crate::core::{NameList, Segment};

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `encode %{ enc_class ... %}`
    pub(super) fn encode_block(&mut self) {
        self.model.ensure_encode();
        if !self.open_block() {
            self.scanner
                .syntax_error("Missing %{ ... %} block after encode keyword.");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            if token == "enc_class" {
                self.enc_class();
            } else {
                self.scanner
                    .syntax_error(format!("unexpected token {} inside encoding block", token));
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of encoding block.");
        }
    }

    /// `enc_class NAME ( type name, ... ) %{ body %}`
    fn enc_class(&mut self) {
        let Some(name) = self.scanner.ident() else {
            return;
        };
        let mut class = EncClass::new(name, self.scanner.line());
        self.scanner.skip_ws();
        if self.scanner.cur() == b'(' {
            loop {
                self.scanner.next_char();
                self.scanner.skip_ws();
                if self.scanner.cur() == b')' {
                    break;
                }
                let Some(ty) = self.scanner.ident() else {
                    return;
                };
                let Some(param) = self.scanner.ident() else {
                    return;
                };
                class.add_parameter(ty, param);
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
        if !self.open_block() {
            self.scanner
                .syntax_error("missing '%{' in enc_class definition");
            return;
        }
        if self.code_body(&mut class, None) {
            log::debug!("EncodingClass Form: {}", name);
            self.add_enc_class(class);
        }
    }

    fn add_enc_class(&mut self, class: EncClass<'a>) {
        if let Some(encode) = self.model.ensure_encode() {
            encode.add_class(class);
        }
    }

    /// Body of an encode class, cursor after `%{`. For an inline
    /// instruction body the constant-table keywords are recognized.
    fn code_body(&mut self, class: &mut EncClass<'a>, mut instr: Option<&mut InstructForm<'a>>) -> bool {
        self.scanner.skip_ws_no_preproc();
        let body_start = self.scanner.mark();
        if self.scanner.location_markers() {
            let marker = self.scanner.line_marker(self.scanner.line());
            class.add_code(self.scanner.alloc_str(&marker));
        }
        loop {
            if self.scanner.at_block_end() || self.scanner.is_eof() {
                break;
            }
            let start = self.scanner.mark();
            while self.scanner.cur() != b'$'
                && !self.scanner.at_block_end()
                && !self.scanner.is_eof()
            {
                self.skip_code_char();
            }
            let text = self.scanner.slice_from(start);
            if !text.is_empty() {
                class.add_code(text);
            }
            if self.scanner.cur() != b'$' {
                continue;
            }
            let Some(var) = self.scanner.rep_var(false) else {
                return false;
            };
            class.add_rep_var(var);
            if let Some(instr) = instr.as_deref_mut() {
                if !self.constant_keyword(var, instr) {
                    return false;
                }
            }
        }
        if self.scanner.is_eof() {
            self.scanner
                .syntax_error(format!("invalid termination of encoding {}", class.name));
            return false;
        }
        self.session
            .record_code_block(self.scanner.mark() - body_start);
        self.scanner.next_char();
        self.scanner.next_char();
        if self.scanner.location_markers() {
            class.add_code(END_LINE_MARKER);
        }
        true
    }

    /// Advance one character of code, passing comments whole so that a
    /// `$` inside one is not taken for a variable.
    fn skip_code_char(&mut self) {
        let at_comment = self.scanner.cur() == b'/' && matches!(self.scanner.peek(), b'/' | b'*');
        if at_comment {
            let before = (self.scanner.mark(), self.scanner.line());
            self.scanner.skip_ws_no_preproc();
            if before != (self.scanner.mark(), self.scanner.line()) {
                return;
            }
        }
        self.scanner.next_char_or_line();
    }

    /// Constant-table keywords in an instruction's encoding.
    fn constant_keyword(&mut self, var: &str, instr: &mut InstructForm<'a>) -> bool {
        match var {
            "constanttablebase" => {
                instr.needs_constant_base = true;
                if !instr.has_call {
                    instr.is_mach_constant = true;
                }
                if self.scanner.cur() == b'(' {
                    self.scanner.syntax_error(format!(
                        "constanttablebase in instruct {} cannot have an argument (only \
                         constantaddress and constantoffset)",
                        instr.ident
                    ));
                    return false;
                }
            }
            "constantaddress" | "constantoffset" => {
                instr.is_mach_constant = true;
                if self.scanner.cur() == b'(' {
                    return self.constant_expr(instr);
                }
            }
            _ => {}
        }
        true
    }

    /// `( expr )` after `$constantaddress`: an encode class adding the
    /// value to the constant table.
    fn constant_expr(&mut self, instr: &mut InstructForm<'a>) -> bool {
        let name = self.session.intern(&constant_class_name(instr.ident));
        let mut class = self.class_for(name, instr);
        if self.scanner.location_markers() {
            let marker = self.scanner.line_marker(self.scanner.line());
            class.add_code(self.scanner.alloc_str(&marker));
        }
        class.add_code("    _constant = C->output()->constant_table().add");
        class.add_code("(this, ");
        self.scanner.next_char();
        let mut depth = 1;
        while depth > 0 {
            match self.scanner.cur() {
                b'(' => {
                    depth += 1;
                    class.add_code("(");
                    self.scanner.next_char();
                }
                b')' => {
                    depth -= 1;
                    if depth > 0 {
                        class.add_code(")");
                    }
                    self.scanner.next_char();
                }
                _ if self.scanner.is_eof() => {
                    self.scanner
                        .syntax_error("unexpected EOF in constant expression");
                    return false;
                }
                _ => {
                    let start = self.scanner.mark();
                    while !matches!(self.scanner.cur(), b'$' | b'(' | b')') && !self.scanner.is_eof() {
                        self.scanner.next_char_or_line();
                    }
                    let text = self.scanner.slice_from(start);
                    if !text.is_empty() {
                        class.add_code(text);
                    }
                    if self.scanner.cur() == b'$' {
                        let Some(var) = self.scanner.rep_var(false) else {
                            return false;
                        };
                        class.add_rep_var(var);
                    }
                }
            }
        }
        class.add_code(");");
        if self.scanner.location_markers() {
            class.add_code(END_LINE_MARKER);
        }
        instr.constant = Some(Self::call_with_params(name, instr));
        self.add_enc_class(class);
        true
    }

    /// Synthesized class taking the instruction's parameters.
    fn class_for(&self, name: &'a str, instr: &InstructForm<'a>) -> EncClass<'a> {
        let mut class = EncClass::new(name, self.scanner.line());
        for param in instr.params.iter() {
            if let Some(ty) = instr.locals.lookup(param) {
                class.add_parameter(ty, param);
            }
        }
        class
    }

    /// Invocation of `name` passing every instruction parameter.
    fn call_with_params(name: &'a str, instr: &InstructForm<'a>) -> InsEncode<'a> {
        let mut encode = InsEncode::new(instr.line);
        let call = encode.add_call(name);
        call.args = instr.params.iter().collect();
        encode
    }

    /// Inline `%{ body %}` of ins_encode or postalloc_expand, cursor after `%{`.
    fn inline_encode(&mut self, instr: &mut InstructForm<'a>) {
        let name = self.session.intern(&inline_class_name(instr.ident));
        let mut class = self.class_for(name, instr);
        if !instr.is_postalloc_expand {
            class.add_code(MASM_PREAMBLE);
        }
        if !self.code_body(&mut class, Some(&mut *instr)) {
            return;
        }
        self.add_enc_class(class);
        let encode = Self::call_with_params(name, instr);
        if instr.ins_encode.is_some() {
            self.scanner
                .syntax_error("Multiple ins_encode sections defined");
            return;
        }
        instr.ins_encode = Some(encode);
    }

    /// `ins_encode ( Class ( args ), ... );` or `ins_encode %{ body %}`
    pub(super) fn ins_encode(&mut self, instr: &mut InstructForm<'a>) {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            if self.open_block() {
                self.inline_encode(instr);
            } else {
                self.scanner
                    .syntax_error("missing '%{' or '(' in ins_encode definition");
            }
            return;
        }
        let Some(encode) = self.encode_calls(instr, false) else {
            return;
        };
        if !self.expect(b';', "Missing ';' at end of ins_encode.") {
            return;
        }
        if instr.ins_encode.is_some() {
            self.scanner
                .syntax_error("Multiple ins_encode sections defined");
            return;
        }
        instr.ins_encode = Some(encode);
    }

    /// `postalloc_expand ( Class ( args ) );` or `postalloc_expand %{ body %}`
    pub(super) fn postalloc_expand(&mut self, instr: &mut InstructForm<'a>) {
        instr.is_postalloc_expand = true;
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            if self.open_block() {
                self.inline_encode(instr);
            } else {
                self.scanner
                    .syntax_error("missing '(' in postalloc_expand definition");
            }
            return;
        }
        let Some(encode) = self.encode_calls(instr, true) else {
            return;
        };
        if !self.expect(b';', "Missing ';' at end of postalloc_expand.") {
            return;
        }
        instr.ins_encode = Some(encode);
    }

    /// Encode class invocations, cursor on the '('. `single` admits one.
    fn encode_calls(&mut self, instr: &mut InstructForm<'a>, single: bool) -> Option<InsEncode<'a>> {
        let clause = if single { "postalloc_expand" } else { "encoding" };
        let mut encode = InsEncode::new(self.scanner.line());
        self.scanner.next_char();
        self.scanner.skip_ws();
        while self.scanner.cur() != b')' {
            let name = self.scanner.ident()?;
            let mut args = NameList::new();
            self.scanner.skip_ws();
            if self.scanner.cur() == b'(' {
                self.scanner.next_char();
                loop {
                    self.scanner.skip_ws();
                    if self.scanner.cur() == b')' {
                        break;
                    }
                    let param = self.scanner.ident_or_literal("encoding operand")?;
                    if !self.encode_param(param, name, instr, single) {
                        return None;
                    }
                    args.add_name(param);
                    self.scanner.skip_ws();
                    match self.scanner.cur() {
                        b',' => self.scanner.next_char(),
                        b')' => {}
                        _ => {
                            self.scanner
                                .syntax_error(format!("expected ',' or ')' after parameter {}.", name));
                            return None;
                        }
                    }
                }
                self.scanner.next_char();
            }
            encode.add_call(name).args = args;

            self.scanner.skip_ws();
            if self.scanner.cur() == b',' && !single {
                self.scanner.next_char();
                self.scanner.skip_ws();
            } else if self.scanner.cur() != b')' {
                self.scanner
                    .syntax_error(format!("Expected ')' after {} {}.", clause, name));
                return None;
            }
        }
        self.scanner.next_char();
        Some(encode)
    }

    /// Check one actual argument of an encode class invocation.
    fn encode_param(&mut self, param: &str, class: &str, instr: &mut InstructForm<'a>, postalloc: bool) -> bool {
        if param == "constanttablebase" {
            return self.constant_keyword(param, instr);
        }
        if postalloc && matches!(param, "constantaddress" | "constantoffset") {
            return self.constant_keyword(param, instr);
        }
        let known = instr.locals.contains(param)
            || is_literal_constant(param)
            || Opcode::is_opcode_name(param)
            || self
                .model
                .registers()
                .is_some_and(|regs| regs.reg_def(param).is_some());
        if !known {
            self.scanner.syntax_error(format!(
                "Using non-locally defined parameter {} for encoding {}.",
                param, class
            ));
        }
        known
    }

    /// `format %{ "text $var" %}`, `format %{ $$template ... %}` or `format;`
    pub(super) fn format(&mut self) -> Option<FormatRule<'a>> {
        self.scanner.skip_ws();
        if self.scanner.cur() == b';' {
            self.scanner.next_char();
            return Some(FormatRule::default());
        }
        if !self.open_block() {
            self.scanner
                .syntax_error("missing ';' after Format expression");
            return None;
        }
        self.scanner.skip_ws();
        if self.scanner.cur() == b'$' {
            let directive = self.scanner.rep_var(true)?;
            if directive == "$$template" {
                return self.template();
            }
            self.scanner
                .syntax_error(format!("Unknown \"{}\" directive in format", directive));
            return None;
        }

        let mut rule = FormatRule::default();
        if self.scanner.cur() == b'"' {
            if !self.format_strings(&mut rule.segments) {
                return None;
            }
            self.scanner.skip_ws();
            if self.scanner.cur() != b'%' {
                self.scanner.syntax_error(
                    "non-blank characters between closing '\"' and '%' in format",
                );
                return None;
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of format block");
            return None;
        }
        Some(rule)
    }

    /// One or more adjacent string literals, cursor on the first '"'.
    fn format_strings(&mut self, segments: &mut Vec<Segment<'a>>) -> bool {
        self.scanner.next_char();
        if self.scanner.cur() == b'"' {
            segments.push(Segment::Text(""));
        }
        loop {
            if matches!(self.scanner.cur(), b'%' | b'\n' | 0) {
                self.scanner
                    .syntax_error("missing '\"' at end of format block");
                return false;
            }
            let mut text = String::new();
            loop {
                let c = self.scanner.cur();
                if matches!(c, b'$' | b'"' | b'%' | b'\n' | 0) {
                    break;
                }
                if c == b'\\' {
                    self.scanner.next_char();
                    let escaped = self.scanner.cur();
                    if !matches!(escaped, b'$' | b'%') {
                        text.push('\\');
                    }
                    if matches!(escaped, b'\n' | 0) {
                        continue;
                    }
                    self.push_char(&mut text);
                    continue;
                }
                self.push_char(&mut text);
            }
            if !text.is_empty() {
                segments.push(Segment::Text(self.scanner.alloc_str(&text)));
            }
            if self.scanner.cur() == b'$' {
                self.scanner.next_char();
                let Some(var) = self.scanner.ident() else {
                    return false;
                };
                segments.push(Segment::RepVar(var));
            }
            if self.scanner.cur() == b'"' {
                self.scanner.next_char();
                self.scanner.skip_ws();
                if self.scanner.cur() != b'"' {
                    return true;
                }
                self.scanner.next_char();
            }
        }
    }

    /// Append the character under the cursor, which may be multi-byte.
    fn push_char(&mut self, text: &mut String) {
        let start = self.scanner.mark();
        self.scanner.next_char();
        while !self.scanner.is_eof() && (self.scanner.cur() & 0xC0) == 0x80 {
            self.scanner.next_char();
        }
        text.push_str(self.scanner.slice_from(start));
    }

    /// `$$template` body: C++ text with `$` variables and `$$emit$$"..."`
    /// lines whose strings print like an ordinary format.
    fn template(&mut self) -> Option<FormatRule<'a>> {
        let mut rule = FormatRule {
            segments: Vec::new(),
            is_template: true,
        };
        self.scanner.skip_ws();
        loop {
            if self.scanner.at_block_end() || self.scanner.is_eof() {
                break;
            }
            let start = self.scanner.mark();
            while self.scanner.cur() != b'$'
                && !self.scanner.at_block_end()
                && !self.scanner.is_eof()
            {
                self.skip_code_char();
            }
            let text = self.scanner.slice_from(start);
            if !text.is_empty() {
                rule.segments.push(Segment::TemplateText(text));
            }
            if self.scanner.cur() != b'$' {
                continue;
            }
            let var = self.scanner.rep_var(false)?;
            if var == "$emit" {
                for _ in 0..2 {
                    if self.scanner.cur() == b'$' {
                        self.scanner.next_char();
                    }
                }
                self.scanner.skip_ws();
                if self.scanner.cur() == b'"' && !self.format_strings(&mut rule.segments) {
                    return None;
                }
            } else {
                rule.segments.push(Segment::TemplateRepVar(var));
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of format block");
            return None;
        }
        Some(rule)
    }
}

#[cfg(test)]
mod tests {
    use crate::adl::parser::{AdlParser, ParseOutput};
    use crate::core::{AdlSession, Segment, SessionConfig};
    use bumpalo::Bump;

    const PRELUDE: &str = "\
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

    fn parse<'a>(arena: &'a Bump, body: &str) -> ParseOutput<'a> {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = AdlSession::new(arena, SessionConfig::new("x86.ad"));
        let text = format!("{}{}", PRELUDE, body);
        AdlParser::new(&session, &text).parse().unwrap()
    }

    #[test]
    fn test_enc_class_segments() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "encode %{
  enc_class OpcP(immI con) %{
    emit_opcode(cbuf, $primary); // $notavar
    emit_d32(cbuf, $con$$constant);
  %}
  enc_class Empty %{ %}
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let encode = out.model.encode().unwrap();
        assert_eq!(encode.len(), 2);
        let opc = encode.class("OpcP").unwrap();
        assert_eq!(opc.params, vec![("immI", "con")]);
        assert_eq!(opc.rep_vars().collect::<Vec<_>>(), vec!["primary", "con", "$constant"]);
        assert!(opc.body().contains("// $notavar"));
        assert!(encode.class("Empty").unwrap().code.is_empty());
    }

    #[test]
    fn test_inline_ins_encode_with_constant() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct loadConI(rRegI dst, immI src) %{
  match(Set dst src);
  ins_encode %{
    __ movl($dst$$Register, $constantaddress($src));
  %}
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let instr = out.model.instruction("loadConI").unwrap();
        assert!(instr.is_mach_constant);
        let call = &instr.ins_encode.as_ref().unwrap().calls[0];
        assert_eq!(call.name, "__ins_encode_loadConI");
        assert_eq!(call.args.as_slice(), &["dst", "src"]);

        let encode = out.model.encode().unwrap();
        let inline = encode.class("__ins_encode_loadConI").unwrap();
        assert!(inline.body().starts_with("    C2_MacroAssembler _masm(&cbuf);"));
        let constant = encode.class("__constant_loadConI").unwrap();
        assert_eq!(
            constant.body(),
            "    _constant = C->output()->constant_table().add(this, $src);"
        );
        assert_eq!(
            instr.constant.as_ref().unwrap().calls[0].name,
            "__constant_loadConI"
        );
    }

    #[test]
    fn test_ins_encode_list_checks_parameters() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI(rRegI dst, immI src) %{
  ins_encode(OpcP, RegReg(dst, src), Con8(0x10, primary, RAX));
  ins_encode(Bad(nope));
%}
",
        );
        let diags = &out.diagnostics;
        assert_eq!(diags.syntax_errors(), 1);
        assert_eq!(
            diags.count_containing("Using non-locally defined parameter nope for encoding Bad."),
            1
        );
        let encode = out.model.instruction("addI").unwrap().ins_encode.as_ref().unwrap();
        let names: Vec<_> = encode.calls.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["OpcP", "RegReg", "Con8"]);
        assert_eq!(encode.calls[2].args.as_slice(), &["0x10", "primary", "RAX"]);
    }

    #[test]
    fn test_format_escapes_and_concatenation() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI(rRegI dst, immI src) %{
  format %{ \"addl    $dst, \\$$src\\t# int\"
            \" 100\\%\" %}
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let format = out.model.instruction("addI").unwrap().format.as_ref().unwrap();
        assert!(!format.is_template);
        assert_eq!(
            format.segments,
            vec![
                Segment::Text("addl    "),
                Segment::RepVar("dst"),
                Segment::Text(", $"),
                Segment::RepVar("src"),
                Segment::Text("\\t# int"),
                Segment::Text(" 100%"),
            ]
        );
    }

    #[test]
    fn test_format_template() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct prolog() %{
  format %{
    $$template
    if ($framesize > 0) {
      $$emit$$\"subq    rsp, #$framesize\"
    }
  %}
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let format = out.model.instruction("prolog").unwrap().format.as_ref().unwrap();
        assert!(format.is_template);
        assert!(format.segments.contains(&Segment::TemplateRepVar("framesize")));
        assert!(format.segments.contains(&Segment::Text("subq    rsp, #")));
        assert!(format.segments.contains(&Segment::RepVar("framesize")));
    }

    #[test]
    fn test_unknown_format_directive() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct x() %{
  format %{ $$bogus %}
%}
",
        );
        assert_eq!(out.diagnostics.count_containing("Unknown \"$$bogus\" directive"), 1);
    }
}
