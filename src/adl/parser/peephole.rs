// Peephole rules. The match is a parenthesized tree of instruction names read into a flat list
// in pre-order: a name becomes the parent of the names that follow it at the same level, and a
// parenthesized group is one input of the current parent. A group with no instruction name still
// takes a position.

use crate::adl::forms::Form;
use crate::adl::parser::AdlParser;
use crate::adl::peephole::{PeepConstraint, PeepMatch, PeepReplace, Peephole};
use crate::core::DiagnosticKind;

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `peephole %{ peepmatch ...; peepconstraint ...; peepreplace ...; %}`
    pub(super) fn peephole(&mut self) {
        let mut peep = Peephole::new(self.peephole_count, self.scanner.line());
        self.peephole_count += 1;
        if !self.open_block() {
            self.scanner
                .syntax_error("Missing %{ ... %} block after peephole keyword.");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            match token {
                "peepmatch" => {
                    if let Some(matches) = self.peep_match() {
                        peep.matches = Some(matches);
                    }
                }
                "peepconstraint" => self.peep_constraints(&mut peep),
                "peepreplace" => {
                    if let Some(replace) = self.peep_replace() {
                        peep.replace = Some(replace);
                    }
                }
                _ => self.scanner.syntax_error(format!(
                    "expected peepmatch, peepconstraint, or peepreplace for identifier {}.",
                    token
                )),
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of peephole rule.");
            return;
        }
        log::debug!(
            "Peephole {} rooted at {}",
            peep.number,
            peep.root().unwrap_or("<none>")
        );
        self.session.record_form("peephole");
        self.model.add_peephole(peep);
    }

    /// `peepmatch ( root child ... );`
    fn peep_match(&mut self) -> Option<PeepMatch<'a>> {
        if !self.expect(b'(', "missing '(' at start of peepmatch rule.") {
            return None;
        }
        let mut matches = PeepMatch::new();
        let mut position = 0;
        let root = self.peep_match_child(&mut matches, -1, &mut position, 0)?;
        if root.is_none() {
            self.scanner
                .syntax_error("missing instruction-name at start of peepmatch.");
            return None;
        }
        if !self.expect(b')', "missing ')' at end of peepmatch.") {
            return None;
        }
        if !self.expect(b';', "missing ';' at end of peepmatch.") {
            return None;
        }
        Some(matches)
    }

    /// One level of the match tree, ending on (without consuming) the ')'
    /// that closes it. Yields the first instruction named at this level;
    /// `None` after a reported error.
    fn peep_match_child(
        &mut self,
        matches: &mut PeepMatch<'a>,
        mut parent: i32,
        position: &mut usize,
        input: usize,
    ) -> Option<Option<&'a str>> {
        let mut opened = 0;
        let mut closed = 0;
        let mut seen = None;
        loop {
            self.scanner.skip_ws();
            match self.scanner.cur() {
                b'(' => {
                    opened += 1;
                    self.scanner.next_char();
                    self.peep_match_child(matches, parent, position, closed)?;
                }
                b')' => {
                    closed += 1;
                    if closed == opened {
                        self.scanner.next_char();
                        continue;
                    }
                    if seen.is_none() {
                        matches.add_instruction(parent, *position, None, input);
                        *position += 1;
                    }
                    return Some(seen);
                }
                _ => {
                    let token = self.scanner.ident()?;
                    match self.model.lookup_form(token) {
                        Some(Form::Instruct(_)) => {
                            seen.get_or_insert(token);
                            matches.add_instruction(parent, *position, Some(token), input);
                            parent = *position as i32;
                            *position += 1;
                        }
                        Some(_) => {
                            self.scanner.syntax_error(format!(
                                "instruction name expected at identifier {}.",
                                token
                            ));
                            return Some(seen);
                        }
                        None => {
                            self.scanner
                                .syntax_error("missing identifier in peepmatch rule.");
                            return None;
                        }
                    }
                }
            }
        }
    }

    /// `peepconstraint ( 0.dst == 1.dst, ... );`
    fn peep_constraints(&mut self, peep: &mut Peephole<'a>) {
        if !self.expect(b'(', "missing '(' at start of peepconstraint rule.") {
            return;
        }
        self.scanner.skip_ws();
        while self.scanner.cur() != b')' {
            let Some(left_inst) = self.scanner.int() else {
                return;
            };
            if !self.expect(b'.', "missing '.' in peepconstraint after instruction number.") {
                return;
            }
            let Some(left_op) = self.scanner.ident() else {
                return;
            };
            let Some(relation) = self.scanner.relation() else {
                return;
            };
            self.scanner.skip_ws();
            let right_inst = if self.scanner.cur().is_ascii_digit() {
                let Some(n) = self.scanner.int() else {
                    return;
                };
                if !self.expect(b'.', "missing '.' in peepconstraint after instruction number.") {
                    return;
                }
                n
            } else {
                -1
            };
            let Some(right_op) = self.scanner.ident() else {
                return;
            };
            peep.constraints.push(PeepConstraint {
                left_inst,
                left_op,
                relation,
                right_inst,
                right_op,
            });

            self.scanner.skip_ws();
            if self.scanner.cur() == b',' {
                self.scanner.next_char();
                self.scanner.skip_ws();
            } else if self.scanner.cur() != b')' {
                self.scanner
                    .syntax_error("expected ',' or ')' after peephole constraint.");
                return;
            }
        }
        self.scanner.next_char();
        self.expect(b';', "missing ';' at end of peepconstraint.");
    }

    /// `peepreplace ( instr ( 0.dst 1.src ... ) );`
    fn peep_replace(&mut self) -> Option<PeepReplace<'a>> {
        if !self.expect(b'(', "missing '(' at start of peepreplace rule.") {
            return None;
        }
        let inst = self.scanner.ident()?;
        if !matches!(self.model.lookup_form(inst), Some(Form::Instruct(_))) {
            self.scanner
                .syntax_error("Instruction name expected at start of peepreplace.");
            return None;
        }
        let mut replace = PeepReplace::new(inst);
        if !self.expect(b'(', "missing '(' at peepreplace root's operand-list.") {
            return None;
        }
        self.scanner.skip_ws();
        while self.scanner.cur() != b')' {
            let inst_num = self.scanner.int()?;
            if !self.expect(b'.', "missing '.' in peepreplace after instruction number.") {
                return None;
            }
            let op = self.scanner.ident()?;
            replace.add_operand(inst_num, op);
            self.scanner.skip_ws();
        }
        self.scanner.next_char();
        self.scanner.skip_ws();
        if self.scanner.cur() != b')' {
            self.scanner.report_at(
                DiagnosticKind::Syntax,
                self.scanner.line(),
                "missing ')' at end of peepmatch.",
            );
            self.scanner
                .syntax_error("Support one replacement instruction.");
            return None;
        }
        self.scanner.next_char();
        if !self.expect(b';', "missing ';' at end of peepreplace.") {
            return None;
        }
        Some(replace)
    }
}

#[cfg(test)]
mod tests {
    use crate::adl::parser::{AdlParser, ParseOutput};
    use crate::core::{AdlSession, SessionConfig};
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
instruct movI(rRegI dst, rRegI src) %{ match(Set dst src); %}
instruct incI_rReg(rRegI dst, immI src) %{ match(Set dst (AddI dst src)); %}
instruct leaI_rReg_immI(rRegI dst, rRegI src0, immI src1) %{ match(Set dst (AddI src0 src1)); %}
";

    fn parse<'a>(arena: &'a Bump, body: &str) -> ParseOutput<'a> {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = AdlSession::new(arena, SessionConfig::new("x86.ad"));
        let text = format!("{}{}", PRELUDE, body);
        AdlParser::new(&session, &text).parse().unwrap()
    }

    #[test]
    fn test_peephole_rule() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "peephole %{
  peepmatch ( incI_rReg movI );
  peepconstraint ( 0.dst == 1.dst, 0.src != RAX );
  peepreplace ( leaI_rReg_immI( 0.dst 1.src 0.src ) );
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let peeps = out.model.peepholes_of("incI_rReg");
        assert_eq!(peeps.len(), 1);
        let peep = peeps[0];
        assert_eq!(peep.number, 0);
        assert!(peep.is_complete());

        let entries = peep.matches.as_ref().unwrap().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].parent, entries[0].position), (-1, 0));
        assert_eq!(entries[1].instruction, Some("movI"));
        assert_eq!((entries[1].parent, entries[1].position), (0, 1));

        assert_eq!(peep.constraints.len(), 2);
        assert_eq!(peep.constraints[0].relation, "==");
        assert!(peep.constraints[1].is_register_constraint());
        assert_eq!(peep.constraints[1].right_op, "RAX");

        let replace = peep.replace.as_ref().unwrap();
        assert_eq!(replace.instruction, "leaI_rReg_immI");
        assert_eq!(replace.operands, vec![(0, "dst"), (1, "src"), (0, "src")]);
    }

    #[test]
    fn test_nested_match_groups() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "peephole %{
  peepmatch ( incI_rReg ( movI ) ( ) );
  peepreplace ( movI( 0.dst 1.src ) );
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let peep = out.model.peepholes().next().unwrap();
        let entries = peep.matches.as_ref().unwrap().entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].instruction, Some("movI"));
        assert_eq!((entries[1].parent, entries[1].input), (0, 0));
        assert_eq!(entries[2].instruction, None);
        assert_eq!((entries[2].parent, entries[2].input), (0, 1));
        assert_eq!(peep.matches.as_ref().unwrap().max_position(), 2);
    }

    #[test]
    fn test_peepmatch_requires_instructions() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "peephole %{
  peepmatch ( rRegI );
  peepreplace ( immI( 0.dst ) );
%}
",
        );
        let diags = &out.diagnostics;
        assert_eq!(
            diags.count_containing("instruction name expected at identifier rRegI."),
            1
        );
        assert_eq!(
            diags.count_containing("Instruction name expected at start of peepreplace."),
            1
        );
        assert!(out.model.peepholes().all(|p| !p.is_complete()));
    }
}
