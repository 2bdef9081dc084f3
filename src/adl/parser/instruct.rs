// Instruction declarations. An instruction body may carry several match rules; the first
// belongs to the declaring form and every later one, as well as every commutative swap of a
// rule, becomes a clone named `<ident>_<n>` that is declared right after it. Chain rules are
// derived here too: an instruction of the shape `(Set dst src)` whose right side reduces to
// a single base operand lets the matcher produce `dst`'s type from `src`'s type at the
// instruction's cost.

use crate::adl::forms::{
    AttrKind, ExpandInstruction, ExpandRule, Form, InstructForm, Opcode, RewriteRule,
};
use crate::adl::ideal;
use crate::adl::match_rule::{expand_commutative, next_clone_name, MatchNode, MatchRule};
use crate::adl::model::ChainRule;
use crate::adl::parser::AdlParser;
use crate::adl::UseDef;
use crate::core::{Dict, DiagnosticKind, NameList};

/// Running counts while a match tree is read.
#[derive(Debug, Default)]
struct TreeShape {
    depth: usize,
    leaves: usize,
}

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `instruct NAME ( params ) %{ ... %}`
    pub(super) fn instruct(&mut self) {
        let line = self.scanner.line();
        let Some((ident, duplicate)) = self.declared_name("instruction") else {
            return;
        };
        log::debug!("Parsing Instruction Form {}", ident);
        let mut instr = InstructForm::new(ident, line);
        let mut clone_counter = 0u32;
        let mut discard = duplicate;

        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error("missing '(' in instruct definition");
        } else {
            self.oplist(&mut instr.params, &mut instr.locals);
        }
        if !self.open_block() {
            self.scanner
                .syntax_error("missing '%{' in instruction definition");
            return;
        }

        while !self.at_body_end() {
            let Some(keyword) = self.scanner.ident() else {
                continue;
            };
            match keyword {
                "predicate" => instr.predicate = self.predicate(),
                "match" => {
                    if !self.instruct_match(&mut instr, &mut clone_counter) {
                        discard = true;
                    }
                }
                "encode" => self
                    .scanner
                    .syntax_error("Instructions specify ins_encode, not encode"),
                "ins_encode" => self.ins_encode(&mut instr),
                "postalloc_expand" => self.postalloc_expand(&mut instr),
                "opcode" => instr.opcode = self.opcode(),
                "size" => instr.size = self.size(),
                "effect" => self.effect(&mut instr),
                "expand" => instr.expand = self.expand(&mut instr),
                "rewrite" => instr.rewrite = self.rewrite(),
                "constraint" => self
                    .scanner
                    .syntax_error("Instructions do not specify a constraint"),
                "construct" => self
                    .scanner
                    .syntax_error("Instructions do not specify a construct"),
                "format" => instr.format = self.format(),
                "interface" => self
                    .scanner
                    .syntax_error("Instructions do not specify an interface"),
                "ins_pipe" => self.ins_pipe(&mut instr),
                name if self.is_attribute(name, AttrKind::Instruction) => {
                    if let Some(attr) = self.attribute(name, AttrKind::Instruction) {
                        instr.attribs.insert(0, attr);
                    }
                }
                other => self.scanner.syntax_error(format!(
                    "expected one of:\n predicate, match, encode, or the name of an \
                     instruction attribute at {}",
                    other
                )),
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' in instruction definition");
            return;
        }

        // A dropped instruction leaves no chain rules or pipe class entries.
        if discard {
            return;
        }

        if self.model.has_pipeline() {
            if instr.expands() || instr.postalloc_expands() {
                if instr.ins_pipe.is_some() {
                    self.scanner.report_at(
                        DiagnosticKind::Warning,
                        line,
                        format!(
                            "ins_pipe and expand rule both specified for instruction \"{}\"; \
                             ins_pipe will be unused",
                            ident
                        ),
                    );
                }
            } else if instr.ins_pipe.is_none() {
                self.scanner.report_at(
                    DiagnosticKind::Warning,
                    line,
                    format!("No ins_pipe specified for instruction \"{}\"", ident),
                );
            }
        }
        let clones: Vec<_> = instr
            .rules
            .iter()
            .skip(1)
            .filter_map(|rule| Some(instr.clone_for_rule(rule.result()?, rule.clone())))
            .collect();
        let pipe_class = instr.ins_pipe;
        self.adjust_set_rule(&instr);
        if !self.add_declared(ident, Form::Instruct(instr)) {
            return;
        }
        if let Some(class) = pipe_class {
            self.add_to_pipe_class(class, ident);
        }
        for clone in clones {
            let name = clone.ident;
            if !self.model.is_declared(name) {
                self.adjust_set_rule(&clone);
            }
            self.add_declared(name, Form::Instruct(clone));
        }
    }

    /// Record an accepted instruction in its pipeline class.
    fn add_to_pipe_class(&mut self, class: &'a str, ident: &'a str) {
        if let Some(pipe_class) = self
            .model
            .pipeline_mut()
            .and_then(|pipeline| pipeline.class_mut(class))
        {
            pipe_class.instructs.add_name(ident);
        }
    }

    /// One `match` entry of an instruction. Returns false when the
    /// instruction must be dropped.
    fn instruct_match(&mut self, instr: &mut InstructForm<'a>, counter: &mut u32) -> bool {
        let Some(mut rule) = self.match_rule(&instr.locals) else {
            return true;
        };
        if instr.rules.is_empty() {
            if rule.is_ideal_control() {
                rule.set_result("Universe");
            }
            instr.rules.push(rule);
        } else {
            if instr.is_ideal_control() {
                self.scanner.syntax_error(format!(
                    "unique match rule expected for {}",
                    rule.root.name.unwrap_or(instr.ident)
                ));
                return false;
            }
            match next_clone_name(self.session, instr.ident, counter) {
                Ok(name) => rule.set_result(name),
                Err(_) => {
                    self.scanner.syntax_error("too many match rule clones");
                    return false;
                }
            }
            instr.rules.push(rule);
        }
        let index = instr.rules.len() - 1;
        self.clone_and_swap(instr, index, counter)
    }

    /// Add a clone of rule `index` for every way of swapping its
    /// commutative operations.
    fn clone_and_swap(&mut self, instr: &mut InstructForm<'a>, index: usize, counter: &mut u32) -> bool {
        let count = instr.rules[index].count_commutative(&self.model);
        if count == 0 {
            return true;
        }
        let ident = instr.ident;
        let result = expand_commutative(
            &mut instr.rules,
            index,
            count,
            ident,
            counter,
            self.session,
            self.model.internal_ops_mut(),
        );
        match result {
            Ok(added) => {
                log::trace!("{} commutative clones of {}", added, ident);
                true
            }
            Err(_) => {
                self.scanner.syntax_error("too many match rule clones");
                false
            }
        }
    }

    /// `( tree ) ;` or `( tree ) %{ constructor %}`.
    pub(super) fn match_rule(&mut self, locals: &Dict<'a, &'a str>) -> Option<MatchRule<'a>> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error("missing '(' in match expression");
            return None;
        }
        let mut shape = TreeShape::default();
        let root = self.match_node(locals, true, &mut shape)?;
        self.scanner.skip_ws();
        let construct = if self.scanner.cur() == b';' {
            self.scanner.next_char();
            None
        } else {
            let Some(code) = self.scanner.cpp_block("match constructor") else {
                self.scanner.syntax_error(
                    "invalid construction of match rule\nMissing ';' or invalid '%{' and '%}' \
                     constructor",
                );
                return None;
            };
            Some(code)
        };
        let rule = MatchRule::new(root, shape.depth, shape.leaves, construct);
        log::trace!("Match rule:{}", rule);
        Some(rule)
    }

    /// Interior node, cursor on its '('. Children of `Set` stay unreduced.
    fn match_node(
        &mut self,
        locals: &Dict<'a, &'a str>,
        at_root: bool,
        shape: &mut TreeShape,
    ) -> Option<MatchNode<'a>> {
        let start_depth = shape.depth;
        self.scanner.next_char();
        let token = self.scanner.ident()?;
        if ideal::is_ideal_opcode(token) {
            self.model.mark_matched_ideal(token);
        }

        let mut result = None;
        let mut name = Some(token);
        let mut operation = token;
        if let Some(ty) = locals.lookup(token) {
            match self.model.lookup_form(ty) {
                Some(form) if form.is_opclass() && !form.ideal_only() => {
                    operation = ty;
                    result = Some(ty);
                }
                Some(form) if form.is_opclass() => name = None,
                _ => {}
            }
        }

        let children_at_root = operation == "Set";
        let mut left = None;
        let mut right = None;
        let mut left_depth = start_depth;
        let mut right_depth = start_depth;
        self.scanner.skip_ws();
        if self.scanner.cur() != b')' {
            shape.depth = start_depth;
            left = Some(Box::new(self.match_child(locals, children_at_root, shape)?));
            left_depth = shape.depth;
            self.scanner.skip_ws();
            if self.scanner.cur() != b')' {
                shape.depth = start_depth;
                right = Some(Box::new(self.match_child(locals, children_at_root, shape)?));
                right_depth = shape.depth;
            }
        }
        self.scanner.skip_ws();
        if self.scanner.cur() != b')' {
            self.scanner.syntax_error("missing ')' in match expression");
            return None;
        }
        self.scanner.next_char();

        let mut node = MatchNode::new(result, name, operation, left, right);
        if !at_root {
            node.build_internal_op(self.session, self.model.internal_ops_mut());
        }
        shape.depth = left_depth.max(right_depth);
        Some(node)
    }

    fn match_child(
        &mut self,
        locals: &Dict<'a, &'a str>,
        at_root: bool,
        shape: &mut TreeShape,
    ) -> Option<MatchNode<'a>> {
        if self.scanner.cur() == b'(' {
            shape.depth += 1;
            return self.match_node(locals, at_root, shape);
        }
        let token = self.scanner.ident()?;
        let ty = locals
            .lookup(token)
            .filter(|ty| self.model.lookup_form(ty).is_some_and(|f| f.is_opclass()));
        let Some(ty) = ty else {
            self.scanner
                .syntax_error(format!("undefined operand {} in match rule", token));
            return None;
        };
        shape.leaves += 1;
        Some(MatchNode::leaf(ty, token))
    }

    /// File the chain rules of a `(Set dst src)` instruction.
    fn adjust_set_rule(&mut self, instr: &InstructForm<'a>) {
        let Some(rule) = instr.rule() else {
            return;
        };
        let Some(right) = rule.right() else {
            return;
        };
        if rule.op_type() != "Set" {
            return;
        }
        let Some(right_oper) = self.model.operand(right.op_type) else {
            return;
        };
        if right_oper.ideal_only {
            return;
        }
        let Some(dst) = rule.left().map(|l| l.op_type) else {
            return;
        };
        let right_has_predicate = right_oper.predicate.is_some();
        let right_root = right_oper.rules.first().map(|r| r.op_type());
        let right_ident = right_oper.ident;

        let mut position = 0;
        let Some(base) = right.base_operand(&mut position, &self.model) else {
            return;
        };
        let cost = self.chain_cost(instr);
        let chain = ChainRule {
            result: dst,
            cost,
            instruction: instr.ident,
        };

        let mut position = 1;
        if right.base_operand(&mut position, &self.model).is_none() {
            if instr.predicate.is_some() {
                self.scanner.report_at(
                    DiagnosticKind::Syntax,
                    instr.line,
                    "ADLC does not support instruction chain rules with predicates",
                );
            }
            // Chaining from the ideal type of a predicated operand would
            // skip the predicate.
            if !right_has_predicate {
                self.file_chain_rule(base.op_type, chain, true);
            }
            if let Some(result) = base.result {
                self.file_chain_rule(result, chain, true);
            }
        } else {
            let ideal_instruction_root = right_root
                .and_then(|op| self.model.lookup_form(op))
                .is_some_and(|form| form.ideal_only() && form.as_instruct().is_some());
            if ideal_instruction_root {
                self.file_chain_rule(right_ident, chain, false);
            }
        }
    }

    fn file_chain_rule(&mut self, key: &'a str, rule: ChainRule<'a>, dedup: bool) {
        if self.model.add_chain_rule(key, rule, dedup) {
            self.session.record_chain_rule();
            log::trace!("Chain rule {} -> {} via {}", key, rule.result, rule.instruction);
        }
    }

    /// The instruction's `ins_cost`, else the attribute default.
    fn chain_cost(&self, instr: &InstructForm<'a>) -> &'a str {
        instr
            .cost()
            .or_else(|| {
                self.model
                    .attribute(ideal::INS_COST, AttrKind::Instruction)
                    .map(|attr| attr.default)
            })
            .unwrap_or("0")
    }

    /// `effect ( KIND name, ... );`
    fn effect(&mut self, instr: &mut InstructForm<'a>) {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error("missing '(' in effect definition");
            return;
        }
        loop {
            self.scanner.next_char();
            self.scanner.skip_ws();
            if self.scanner.cur() == b')' {
                break;
            }
            let Some(kind) = self.scanner.ident() else {
                return;
            };
            let usedef = match self.model.lookup_form(kind) {
                None => {
                    self.scanner
                        .syntax_error(format!("undefined effect type {}", kind));
                    return;
                }
                Some(form) => match form.as_effect() {
                    Some(effect) => effect.usedef,
                    None => {
                        self.scanner
                            .syntax_error(format!("identifier {} not effect type", kind));
                        return;
                    }
                },
            };
            if usedef.is(UseDef::CALL) {
                instr.has_call = true;
            } else {
                let Some(name) = self.scanner.ident() else {
                    return;
                };
                if instr.effects.contains(name) {
                    self.scanner
                        .syntax_error(format!("duplicate name {} for effect", name));
                    return;
                }
                let local = instr.locals.lookup(name).and_then(|ty| self.model.lookup_form(ty));
                match local {
                    Some(form) if form.as_operand().is_some() => {}
                    Some(form) if form.is_opclass() => {
                        let class = form.ident().unwrap_or(name);
                        self.scanner.syntax_error(format!(
                            "operand classes are illegal in effect lists (found {} {})",
                            class, name
                        ));
                        return;
                    }
                    _ => {
                        self.scanner
                            .syntax_error(format!("undefined operand {} in effect list", name));
                        return;
                    }
                }
                instr.effects.insert(name, usedef);
                log::trace!("\tEffect {} {}", usedef.name(), name);
            }
            self.scanner.skip_ws();
            if self.scanner.cur() != b',' {
                break;
            }
        }
        if self.scanner.cur() != b')' {
            self.scanner.syntax_error("missing ')'");
            return;
        }
        self.scanner.next_char();
        self.expect(b';', "missing ';' in Effect definition");
    }

    /// `expand %{ new operands and instructions %}`
    fn expand(&mut self, instr: &mut InstructForm<'a>) -> Option<ExpandRule<'a>> {
        if !self.open_block() {
            self.scanner.syntax_error("missing '%{' in expand definition");
            return None;
        }
        let mut rule = ExpandRule::default();
        while !self.at_body_end() {
            let Some(name) = self.scanner.ident() else {
                continue;
            };
            let (is_operand, is_instruction) = match self.model.lookup_form(name) {
                Some(form) => (form.as_operand().is_some(), form.as_instruct().is_some()),
                None => {
                    self.scanner.skip_ws();
                    (false, self.scanner.cur() == b'(')
                }
            };
            if is_operand {
                self.expand_operand(name, instr, &mut rule);
            } else if is_instruction {
                self.expand_instruction(name, instr, &mut rule);
            } else {
                self.scanner.syntax_error(format!(
                    "instruction/operand name expected at {}",
                    name
                ));
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' in expand rule definition");
            return None;
        }
        Some(rule)
    }

    /// `oper_type NAME ;` or `oper_type NAME %{ constructor %}`
    fn expand_operand(
        &mut self,
        ty: &'a str,
        instr: &mut InstructForm<'a>,
        rule: &mut ExpandRule<'a>,
    ) {
        let Some(name) = self.scanner.ident() else {
            return;
        };
        if instr.locals.contains(name) {
            self.scanner
                .syntax_error(format!("duplicate name {} for Operand", name));
            return;
        }
        rule.new_operands.add_name(name);
        instr.locals.insert(name, ty);
        self.scanner.skip_ws();
        if self.scanner.cur() == b'%' {
            match self.scanner.cpp_block("Operand Constructor") {
                Some(code) => {
                    rule.constructors.insert(name, code);
                }
                None => self
                    .scanner
                    .syntax_error("Invalid code block for operand constructor"),
            }
        } else if self.scanner.cur() == b';' {
            self.scanner.next_char();
        } else {
            self.scanner
                .syntax_error("Missing ; in expand rule operand declaration");
        }
    }

    /// `instr_name ( operand, ... );`
    fn expand_instruction(
        &mut self,
        name: &'a str,
        instr: &InstructForm<'a>,
        rule: &mut ExpandRule<'a>,
    ) {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("missing '(' in expand instruction declaration");
            return;
        }
        let mut operands = NameList::new();
        loop {
            self.scanner.next_char();
            self.scanner.skip_ws();
            if self.scanner.cur() == b')' {
                break;
            }
            let Some(operand) = self.scanner.ident() else {
                return;
            };
            if !instr.locals.contains(operand) {
                self.scanner
                    .syntax_error(format!("operand name expected at {}", operand));
                return;
            }
            operands.add_name(operand);
            self.scanner.skip_ws();
            if self.scanner.cur() != b',' {
                break;
            }
        }
        if self.scanner.cur() != b')' {
            self.scanner
                .syntax_error("missing ')'in expand instruction declaration");
            return;
        }
        self.scanner.next_char();
        if !self.expect(b';', "missing ';'in expand instruction declaration") {
            return;
        }
        rule.instructions.push(ExpandInstruction { name, operands });
    }

    /// `rewrite ( params ) %{ code %}`
    fn rewrite(&mut self) -> Option<RewriteRule<'a>> {
        let params = self.required_paren_expr(
            "rewrite parameters",
            false,
            "missing '(' in rewrite rule",
        )?;
        self.scanner.skip_ws();
        let Some(code) = self.scanner.cpp_block("rewrite block") else {
            self.scanner
                .syntax_error("incorrect or missing block for 'rewrite'.");
            return None;
        };
        Some(RewriteRule { params, code })
    }

    /// `opcode ( primary [, secondary [, tertiary]] );`
    fn opcode(&mut self) -> Option<Opcode<'a>> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("missing '(' in expand instruction declaration");
            return None;
        }
        self.scanner.next_char();
        let mut opcode = Opcode::default();
        self.scanner.skip_ws();
        if self.scanner.cur() != b')' {
            let fields = ["primary", "secondary", "tertiary"];
            for (i, field) in fields.iter().enumerate() {
                if i > 0 && !self.accept(b',') {
                    break;
                }
                let Some(value) = self.scanner.ident_or_literal(&format!("{} opcode", field)) else {
                    let c = self.scanner.cur() as char;
                    self.scanner
                        .syntax_error(format!("{} hex opcode expected at {}", field, c));
                    return None;
                };
                match i {
                    0 => opcode.primary = Some(value),
                    1 => opcode.secondary = Some(value),
                    _ => opcode.tertiary = Some(value),
                }
            }
            self.scanner.skip_ws();
            if self.scanner.cur() != b')' {
                self.scanner
                    .syntax_error("Missing ')' in opcode description");
                return None;
            }
        }
        self.scanner.next_char();
        if !self.expect(b';', "missing ';' in ins_attrib definition") {
            return None;
        }
        Some(opcode)
    }

    /// `size ( expr );`
    fn size(&mut self) -> Option<&'a str> {
        self.scanner.skip_ws();
        let Some(size) = self.scanner.paren_expr("size expression", false) else {
            let c = self.scanner.cur() as char;
            self.scanner
                .syntax_error(format!("size of opcode expected at {}", c));
            return None;
        };
        if !self.expect(b';', "missing ';' in ins_attrib definition") {
            return None;
        }
        Some(size)
    }

    /// `ins_pipe ( class );`
    fn ins_pipe(&mut self, instr: &mut InstructForm<'a>) {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("missing \"(\" in ins_pipe definition");
            return;
        }
        self.scanner.next_char();
        let Some(class) = self.scanner.ident() else {
            return;
        };
        self.scanner.skip_ws();
        if self.scanner.cur() != b')' {
            self.scanner
                .syntax_error("missing \")\" in ins_pipe definition");
            return;
        }
        self.scanner.next_char();
        if self.scanner.cur() != b';' {
            self.scanner.syntax_error("missing ; in return value entry.");
            return;
        }
        self.scanner.next_char();

        if let Some(pipeline) = self.model.pipeline() {
            if pipeline.class(class).is_none() {
                self.scanner
                    .syntax_error(format!("\"{}\" is not a valid pipeline class", class));
                return;
            }
        }
        instr.ins_pipe = Some(class);
    }
}

#[cfg(test)]
mod tests {
    use crate::adl::forms::FormKind;
    use crate::adl::parser::{AdlParser, ParseOutput};
    use crate::core::{AdlSession, SessionConfig};
    use bumpalo::Bump;

    const PRELUDE: &str = "\
register %{
  reg_def RAX(SOC, SOC, Op_RegI, 0, rax->as_VMReg());
  reg_def RBX(SOC, SOE, Op_RegI, 3, rbx->as_VMReg());
  reg_class int_reg(RAX, RBX);
  alloc_class chunk0(RAX, RBX);
%}
ins_attrib ins_cost(100);
op_attrib op_cost(0);
operand rRegI() %{
  constraint(ALLOC_IN_RC(int_reg));
  match(RegI);
  format %{ %}
  interface(REG_INTER);
%}
operand immI() %{
  match(ConI);
  op_cost(10);
  format %{ %}
  interface(CONST_INTER);
%}
operand memory(rRegI reg) %{
  match(reg);
  format %{ %}
  interface(MEMORY_INTER) %{
    base($reg);
    index(0x4);
    scale(0x0);
    disp(0x0);
  %}
%}
";

    fn parse<'a>(arena: &'a Bump, body: &str) -> ParseOutput<'a> {
        let _ = env_logger::builder().is_test(true).try_init();
        let session = AdlSession::new(arena, SessionConfig::new("x86.ad"));
        let text = format!("{}{}", PRELUDE, body);
        AdlParser::new(&session, &text).parse().unwrap()
    }

    #[test]
    fn test_simple_instruction() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI_rReg(rRegI dst, rRegI src) %{
  match(Set dst (AddI dst src));
  effect(KILL cr);
  ins_cost(150);
  format %{ \"addl    $dst, $src\" %}
  opcode(0x03);
  ins_encode(OpcP);
%}
",
        );
        // `cr` is not a parameter.
        assert_eq!(out.diagnostics.count_containing("undefined operand cr in effect list"), 1);
        let instr = out.model.instruction("addI_rReg").unwrap();
        assert_eq!(instr.cost(), Some("150"));
        assert_eq!(instr.params.as_slice(), &["dst", "src"]);
        assert_eq!(instr.opcode.unwrap().primary, Some("0x03"));
        assert_eq!(instr.rule().unwrap().to_string(), " (Set dst (AddI dst src))");
        assert!(out.model.matched_ideal().search("AddI"));
    }

    #[test]
    fn test_commutative_clone_is_declared() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI_mem(rRegI dst, memory mem, rRegI src) %{
  match(Set dst (AddI (LoadI mem) src));
  ins_cost(125);
  ins_encode();
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let names: Vec<_> = out.model.instructions().map(|i| i.ident).collect();
        assert_eq!(names, vec!["addI_mem", "addI_mem_0"]);
        let clone = out.model.instruction("addI_mem_0").unwrap();
        assert_eq!(clone.cloned_from, Some("addI_mem"));
        assert_eq!(clone.cost(), Some("125"));
        assert_eq!(
            clone.rule().unwrap().to_string(),
            " (Set dst (AddI src (LoadI mem)))"
        );
    }

    #[test]
    fn test_chain_rule_from_set_of_leaf() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct loadConI(rRegI dst, immI src) %{
  match(Set dst src);
  ins_encode();
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let from_ideal = out.model.chain_rules("ConI");
        assert_eq!(from_ideal.len(), 1);
        assert_eq!(from_ideal[0].result, "rRegI");
        assert_eq!(from_ideal[0].cost, "100");
        assert_eq!(from_ideal[0].instruction, "loadConI");
        assert!(out.model.has_chain_rule("immI", "rRegI"));
    }

    #[test]
    fn test_duplicate_instruction_keeps_first() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct nop() %{ ins_cost(1); %}
instruct nop() %{ ins_cost(2); %}
",
        );
        assert_eq!(out.diagnostics.semantic_errors(), 1);
        assert_eq!(out.diagnostics.count_containing("duplicate name nop for instruction"), 1);
        assert_eq!(out.model.count(FormKind::Instruct), 1);
        assert_eq!(out.model.instruction("nop").unwrap().cost(), Some("1"));
    }

    #[test]
    fn test_duplicate_instruction_files_no_chain_rules() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct movI(rRegI dst, immI src) %{
  match(AddI dst src);
%}
instruct movI(rRegI dst, immI src) %{
  match(Set dst src);
  ins_cost(999);
%}
",
        );
        assert_eq!(out.diagnostics.semantic_errors(), 1, "{}", out.diagnostics);
        assert_eq!(out.diagnostics.count_containing("duplicate name movI for instruction"), 1);
        assert_eq!(out.model.num_chain_rules(), 0);
        assert!(out.model.chain_rules("ConI").is_empty());
        assert!(!out.model.has_chain_rule("immI", "rRegI"));
        assert_eq!(out.model.instruction("movI").unwrap().cost(), None);
    }

    #[test]
    fn test_clone_name_collision_is_reported() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI_mem_0(rRegI dst) %{
  match(Set dst (SubI dst dst));
  ins_encode();
%}
instruct addI_mem(rRegI dst, memory mem, rRegI src) %{
  match(Set dst (AddI (LoadI mem) src));
  ins_encode();
%}
",
        );
        let diags = &out.diagnostics;
        assert_eq!(diags.semantic_errors(), 1, "{}", diags);
        assert_eq!(diags.count_containing("duplicate name addI_mem_0 for instruct"), 1);
        assert_eq!(out.model.count(FormKind::Instruct), 2);
        let kept = out.model.instruction("addI_mem_0").unwrap();
        assert_eq!(kept.cloned_from, None);
        assert_eq!(kept.rule().unwrap().to_string(), " (Set dst (SubI dst dst))");
    }

    #[test]
    fn test_control_instruction_takes_single_rule() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct Ret() %{
  match(Return);
  match(Return);
%}
",
        );
        assert_eq!(out.diagnostics.count_containing("unique match rule expected"), 1);
        assert!(out.model.instruction("Ret").is_none());
    }

    #[test]
    fn test_expand_rule() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct addI_imm(rRegI dst, immI src) %{
  match(Set dst (AddI dst src));
  expand %{
    rRegI tmp;
    immI one %{ 1 %}
    addI_imm(tmp, one);
  %}
%}
",
        );
        assert!(out.is_success(), "{}", out.diagnostics);
        let expand = out.model.instruction("addI_imm").unwrap().expand.as_ref().unwrap();
        assert_eq!(expand.new_operands.as_slice(), &["tmp", "one"]);
        assert_eq!(expand.constructors.lookup("one").map(str::trim), Some("1"));
        assert_eq!(expand.instructions[0].operands.as_slice(), &["tmp", "one"]);
    }

    #[test]
    fn test_wrong_keyword_in_instruction() {
        let arena = Bump::new();
        let out = parse(
            &arena,
            "instruct bad(rRegI dst) %{
  encode %{ %}
  constraint(ALLOC_IN_RC(int_reg));
  bogus(1);
%}
",
        );
        let diags = &out.diagnostics;
        assert_eq!(diags.count_containing("Instructions specify ins_encode, not encode"), 1);
        assert_eq!(diags.count_containing("Instructions do not specify a constraint"), 1);
        assert_eq!(diags.count_containing("instruction attribute at bogus"), 1);
    }
}
