// The pipeline block: resource and stage declarations, pipe classes, the `define` block binding
// machine nodes to pipe classes, and the global bundle attributes. The pipeline form is
// installed first so machine nodes defined inside it follow it in source order; the block is
// built locally and written back when it ends.

use crate::adl::forms::{Form, MachNodeForm};
use crate::adl::parser::AdlParser;
use crate::adl::pipeline::{OperandUsage, PipeClassForm, PipelineForm, ResourceUsage};
use crate::core::DiagnosticKind;

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `pipeline %{ ... %}`
    pub(super) fn pipeline(&mut self) {
        let id = self.model.set_pipeline(PipelineForm::new());
        self.session.record_form("pipeline");
        let mut pipe = PipelineForm::new();
        self.pipeline_body(&mut pipe);
        log::debug!(
            "Pipeline: {} stages, {} resources, {} classes",
            pipe.stages().len(),
            pipe.resource_names().len(),
            pipe.class_count()
        );
        if let Some(Form::Pipeline(slot)) = self.model.form_mut(id) {
            *slot = pipe;
        }
    }

    fn pipeline_body(&mut self, pipe: &mut PipelineForm<'a>) {
        if !self.open_block() {
            self.scanner
                .syntax_error("missing '%{' in pipeline definition");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            match token {
                "resources" => self.resources(pipe),
                "pipe_desc" => self.pipe_desc(pipe),
                "pipe_class" => self.pipe_class(pipe),
                "define" => self.pipe_define(pipe),
                "attributes" => self.pipe_attributes(pipe),
                _ => {
                    self.scanner.syntax_error(format!(
                        "expected one of \"resources\", \"pipe_desc\", \"pipe_class\", found \"{}\"",
                        token
                    ));
                    return;
                }
            }
            self.accept(b';');
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing \"%}\" in pipeline definition");
        }
    }

    /// `resources ( A, B, C = A | B, ... )`
    fn resources(&mut self, pipe: &mut PipelineForm<'a>) {
        pipe.begin_resources();
        if !self.expect(b'(', "missing \"(\" in resource definition") {
            return;
        }
        loop {
            let Some(name) = self.scanner.ident() else {
                return;
            };
            if self.accept(b'=') {
                let mut parts = Vec::new();
                loop {
                    let Some(part) = self.scanner.ident() else {
                        return;
                    };
                    parts.push(part);
                    if !self.accept(b'|') {
                        break;
                    }
                }
                if let Err(missing) = pipe.add_union(name, &parts) {
                    self.scanner
                        .syntax_error(format!("resource \"{}\" is not defined", missing));
                    return;
                }
            } else {
                pipe.add_unit(name);
            }
            if !self.accept(b',') {
                break;
            }
        }
        self.expect(b')', "\")\" expected in resource definition");
    }

    /// `pipe_desc ( S0, S1, ... )`
    fn pipe_desc(&mut self, pipe: &mut PipelineForm<'a>) {
        if !self.expect(b'(', "missing \"(\" in pipe_desc definition") {
            return;
        }
        loop {
            let Some(stage) = self.scanner.ident() else {
                return;
            };
            pipe.add_stage(stage);
            if !self.accept(b',') {
                break;
            }
        }
        self.expect(b')', "\")\" expected in pipe_desc definition");
    }

    /// `pipe_class NAME ( params ) %{ entries %}`
    fn pipe_class(&mut self, pipe: &mut PipelineForm<'a>) {
        let line = self.scanner.line();
        let Some(name) = self.scanner.ident() else {
            return;
        };
        if pipe.add_class(name, line).is_some() {
            self.pipe_class_body(pipe, name);
            return;
        }
        self.scanner.report_at(
            DiagnosticKind::Semantic,
            line,
            format!("duplicate name {} for pipe_class", name),
        );
        // The repeated body is still checked, against a copy that is dropped.
        let mut scratch = pipe.clone();
        scratch.reset_class(name, line);
        self.pipe_class_body(&mut scratch, name);
    }

    fn pipe_class_body(&mut self, pipe: &mut PipelineForm<'a>, name: &'a str) {
        self.scanner.skip_ws();
        if self.scanner.cur() == b'(' {
            let (mut params, mut locals) = Default::default();
            self.oplist(&mut params, &mut locals);
            if let Some(class) = pipe.class_mut(name) {
                class.params = params;
                class.locals = locals;
            }
        } else {
            self.scanner
                .syntax_error("missing \"(\" in pipe_class definition");
        }
        if !self.open_block() {
            self.scanner
                .syntax_error("missing \"%{\" in pipe_class definition");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            if !self.pipe_class_entry(pipe, name, token) {
                return;
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing \"%}\" in pipe_class definition");
        }
    }

    /// One statement of a pipe class body. False ends the body.
    fn pipe_class_entry(&mut self, pipe: &mut PipelineForm<'a>, class: &'a str, token: &'a str) -> bool {
        let count = match token {
            "fixed_latency" => {
                let Some(latency) = self.pipe_count("latency definition") else {
                    return false;
                };
                if let Some(c) = pipe.class_mut(class) {
                    c.fixed_latency = Some(latency);
                }
                return self.expect(b';', "missing \";\" in latency definition");
            }
            "zero_instructions" | "no_instructions" => Some(0),
            "one_instruction" | "single_instruction" => Some(1),
            "one_instruction_with_delay_slot" | "single_instruction_with_delay_slot" => {
                if let Some(c) = pipe.class_mut(class) {
                    c.has_branch_delay = true;
                }
                Some(1)
            }
            "instruction_count" | "instructions_in_first_bundle" => {
                let Some(n) = self.pipe_count("instruction count") else {
                    return false;
                };
                Some(n)
            }
            _ => None,
        };
        if let Some(n) = count {
            if let Some(c) = pipe.class_mut(class) {
                c.instruction_count = Some(n);
            }
            return self.expect(b';', "missing \";\" in latency definition");
        }

        let flag: Option<fn(&mut PipeClassForm<'a>)> = match token {
            "multiple_bundles" => Some(|c| c.multiple_bundles = true),
            "has_delay_slot" => Some(|c| c.has_branch_delay = true),
            "force_serialization" => Some(|c| c.force_serialization = true),
            "may_have_no_code" => Some(|c| c.may_have_no_code = true),
            _ => None,
        };
        if let Some(set) = flag {
            if let Some(c) = pipe.class_mut(class) {
                set(c);
            }
            return self.expect(b';', &format!("missing \";\" after \"{}\"", token));
        }

        // `name : stage ...` or the same written without blanks
        let (target, glued_stage) = match token.split_once(':') {
            Some((target, stage)) => (target, Some(stage).filter(|s| !s.is_empty())),
            None => (token, None),
        };
        let is_operand = pipe
            .class(class)
            .is_some_and(|c| c.locals.contains(target));
        let is_resource = pipe.resource(target).is_some();
        if !is_operand && !is_resource {
            self.scanner
                .syntax_error(format!("resource expected at \"{}\"", token));
            return false;
        }
        let stage = match glued_stage {
            Some(stage) => stage,
            None => {
                if !token.ends_with(':') && !self.expect(b':', "\":\" expected") {
                    return true;
                }
                let Some(stage) = self.scanner.ident() else {
                    return false;
                };
                stage
            }
        };

        if is_operand {
            let Some(usage) = self.operand_usage(stage) else {
                return true;
            };
            if let Some(c) = pipe.class_mut(class) {
                c.set_operand_usage(target, usage);
            }
        } else {
            let mut cycles = 1;
            if self.accept(b'(') {
                let Some(n) = self.scanner.int() else {
                    return false;
                };
                cycles = n.max(0) as u32;
                if !self.expect(b')', "\")\" expected in resource usage") {
                    return true;
                }
            }
            pipe.add_resource_usage(
                class,
                ResourceUsage {
                    resource: target,
                    stage,
                    cycles,
                },
            );
        }
        if self.at_body_end() {
            return true;
        }
        self.expect(b';', "\";\" expected in pipe_class definition");
        true
    }

    /// `( n )` holding a non-negative count.
    fn pipe_count(&mut self, desc: &str) -> Option<u32> {
        if !self.expect(b'(', &format!("missing \"(\" in {}", desc)) {
            return None;
        }
        let n = self.scanner.int()?;
        if !self.expect(b')', &format!("missing \")\" in {}", desc)) {
            return None;
        }
        Some(n.max(0) as u32)
    }

    /// `( read | write ) [ + n ]` after an operand's stage.
    fn operand_usage(&mut self, stage: &'a str) -> Option<OperandUsage<'a>> {
        if !self.expect(b'(', "\"(\" expected after pipeline stage") {
            return None;
        }
        let is_write = match self.scanner.ident()? {
            "read" => false,
            "write" => true,
            _ => {
                self.scanner
                    .syntax_error("\"read\" or \"write\" expected");
                return None;
            }
        };
        if !self.expect(b')', "\")\" expected after read or write") {
            return None;
        }
        let mut more_instrs = 0;
        if self.accept(b'+') {
            self.scanner.skip_ws();
            if !self.scanner.cur().is_ascii_digit() {
                self.scanner.syntax_error("<number> expected");
                return None;
            }
            more_instrs = self.scanner.int()?.max(0) as u32;
        }
        Some(OperandUsage {
            stage,
            is_write,
            more_instrs,
        })
    }

    /// `define %{ node = pipe_class; %}`
    fn pipe_define(&mut self, pipe: &mut PipelineForm<'a>) {
        if !self.open_block() {
            self.scanner.syntax_error("expected '%{'");
            return;
        }
        let line = self.scanner.line();
        let Some(node) = self.scanner.ident() else {
            return;
        };
        self.scanner.skip_ws();
        if !matches!(self.scanner.cur(), b'=' | b',') {
            self.scanner.syntax_error(format!(
                "expected `=`, found '{}'",
                self.scanner.cur() as char
            ));
            return;
        }
        self.scanner.next_char();
        let Some(class) = self.scanner.ident() else {
            return;
        };
        if !self.expect(b';', "expected `;` after pipeline class") {
            return;
        }
        if !self.close_block() {
            self.scanner.syntax_error("expected '%}'");
        }
        let Some(pipe_class) = pipe.class_mut(class) else {
            self.scanner
                .syntax_error(format!("\"{}\" is not a valid pipeline class", class));
            return;
        };
        pipe_class.instructs.add_name(node);
        self.model.add_form(Form::MachNode(MachNodeForm {
            ident: node,
            line,
            pipe_class: class,
        }));
        self.session.record_form("machnode");
    }

    /// `attributes %{ ... %}` followed by the required-item checks.
    fn pipe_attributes(&mut self, pipe: &mut PipelineForm<'a>) {
        if !self.open_block() {
            self.scanner.syntax_error("expected '%{'");
            return;
        }
        let mut size_kind_seen = false;
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            match token {
                "variable_size_instructions" | "fixed_size_instructions" => {
                    pipe.variable_size_instrs = token == "variable_size_instructions";
                    size_kind_seen = true;
                }
                "branch_has_delay_slot" => pipe.branch_has_delay_slot = true,
                "max_instructions_per_bundle"
                | "max_bundles_per_cycle"
                | "instruction_unit_size"
                | "bundle_unit_size"
                | "instruction_fetch_unit_size"
                | "instruction_fetch_units" => {
                    if !self.expect(b'=', "expected `=`") {
                        continue;
                    }
                    let Some(value) = self.scanner.int() else {
                        continue;
                    };
                    let value = value.max(0) as u32;
                    let field = match token {
                        "max_instructions_per_bundle" => &mut pipe.max_instrs_per_bundle,
                        "max_bundles_per_cycle" => &mut pipe.max_bundles_per_cycle,
                        "instruction_unit_size" => &mut pipe.instr_unit_size,
                        "bundle_unit_size" => &mut pipe.bundle_unit_size,
                        "instruction_fetch_unit_size" => &mut pipe.instr_fetch_unit_size,
                        _ => &mut pipe.instr_fetch_units,
                    };
                    *field = value;
                }
                "nops" => {
                    if !self.expect(b'(', "expected `(` after nops") {
                        continue;
                    }
                    self.scanner.skip_ws();
                    while self.scanner.cur() != b')' {
                        let Some(nop) = self.scanner.ident() else {
                            return;
                        };
                        pipe.nops.add_name(nop);
                        self.accept(b',');
                        self.scanner.skip_ws();
                    }
                    self.scanner.next_char();
                }
                _ => {
                    self.scanner
                        .syntax_error(format!("unknown specifier \"{}\"", token));
                    continue;
                }
            }
            self.accept(b';');
        }
        if !self.close_block() {
            self.scanner.syntax_error("expected '%}'");
            return;
        }

        let line = self.scanner.line();
        let mut missing = Vec::new();
        if pipe.max_instrs_per_bundle == 0 {
            missing.push("\"max_instructions_per_bundle\" unspecified");
        }
        if pipe.instr_unit_size == 0 && pipe.bundle_unit_size == 0 {
            missing.push("\"instruction_unit_size\" and \"bundle_unit_size\" unspecified");
        }
        if pipe.instr_fetch_unit_size == 0 {
            missing.push("\"instruction_fetch_unit_size\" unspecified");
        }
        if pipe.instr_fetch_units == 0 {
            missing.push("\"instruction_fetch_units\" unspecified");
        }
        if !size_kind_seen {
            missing.push(
                "\"variable_size_instruction\" or \"fixed_size_instruction\" unspecified",
            );
        }
        for message in missing {
            self.scanner
                .report_at(DiagnosticKind::Syntax, line, message);
        }
    }
}
