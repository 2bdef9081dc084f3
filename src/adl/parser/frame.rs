// The frame block. Every entry is `name ( expr );` except the return value entries, which hold
// a `%{ %}` code block, and the return address entries, whose expression is prefixed with the
// location kind REG or STACK. Tokens from older descriptions are accepted with a warning.

use crate::adl::frame::FrameForm;
use crate::adl::parser::AdlParser;

const OBSOLETE_FRAME_TOKENS: &[&str] = &[
    "compiler_method_oop_reg",
    "interpreter_method_oop_reg",
    "interpreter_method_reg",
    "in_preserve_stack_slots",
    "out_preserve_stack_slots",
    "calling_convention",
    "c_calling_convention",
];

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `frame %{ entries %}`
    pub(super) fn frame(&mut self) {
        let mut frame = FrameForm::new(self.scanner.line());
        if !self.open_block() {
            self.scanner
                .syntax_error("Missing %{ ... %} block after frame keyword.");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            match token {
                "sync_stack_slots" => {
                    frame.sync_stack_slots = self.frame_arg("sync stack slots entry")
                }
                "frame_pointer" => frame.frame_pointer = self.frame_arg("frame pointer entry"),
                "c_frame_pointer" => {
                    frame.c_frame_pointer = self.frame_arg("frame pointer entry")
                }
                "interpreter_frame_pointer" => {
                    frame.interpreter_frame_pointer =
                        self.frame_arg("interpreter frame pointer entry")
                }
                "inline_cache_reg" => {
                    frame.inline_cache_reg = self.frame_arg("inline cache reg entry")
                }
                "cisc_spilling_operand_name" => {
                    frame.cisc_spilling_operand_name =
                        self.frame_arg("cisc spilling operand name")
                }
                "stack_alignment" => frame.alignment = self.frame_arg("stack alignment entry"),
                "varargs_C_out_slots_killed" => {
                    frame.varargs_c_out_slots_killed =
                        self.frame_arg("varargs C out slots killed")
                }
                "return_addr" => {
                    if let Some((in_reg, addr)) = self.return_addr() {
                        frame.return_addr_in_reg = in_reg;
                        frame.return_addr = Some(addr);
                    }
                }
                "c_return_addr" => {
                    if let Some((in_reg, addr)) = self.return_addr() {
                        frame.c_return_addr_in_reg = in_reg;
                        frame.c_return_addr = Some(addr);
                    }
                }
                "return_value" => frame.return_value = self.return_value(),
                "c_return_value" => frame.c_return_value = self.return_value(),
                obsolete if OBSOLETE_FRAME_TOKENS.contains(&obsolete) => {
                    self.scanner
                        .warning(format!("Using obsolete token, {}", obsolete));
                }
                other => {
                    self.scanner
                        .syntax_error(format!("unexpected token {} inside frame block.", other));
                }
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of frame block.");
            return;
        }

        if let Some(missing) = frame.missing_entry() {
            self.scanner
                .syntax_error(format!("missing {} in frame section.", missing));
            return;
        }
        frame.apply_native_defaults();
        log::debug!("Frame Form: line {}", frame.line);
        self.session.record_form("frame");
        self.model.set_frame(frame);
    }

    /// `( expr );`, trimmed.
    fn frame_arg(&mut self, desc: &str) -> Option<&'a str> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error(format!("Missing '(' in {}.", desc));
            return None;
        }
        self.scanner.next_char();
        self.scanner.skip_ws();
        let Some(value) = self.scanner.expr(desc, ")") else {
            self.scanner
                .syntax_error(format!("missing value inside {}.", desc));
            return None;
        };
        self.scanner.next_char();
        if !self.expect(b';', &format!("missing ';' in {}.", desc)) {
            return None;
        }
        Some(value.trim())
    }

    /// `( REG expr );` or `( STACK expr );`
    fn return_addr(&mut self) -> Option<(bool, &'a str)> {
        if !self.expect(b'(', "Missing '(' in return address entry.") {
            return None;
        }
        let in_reg = match self.scanner.ident()? {
            "REG" => true,
            "STACK" => false,
            _ => {
                self.scanner
                    .syntax_error("invalid value inside return_address entry.");
                return None;
            }
        };
        self.scanner.skip_ws();
        let addr = self.scanner.expr("return address entry", ")")?;
        self.scanner.next_char();
        if !self.expect(b';', "missing ';' in return address entry.") {
            return None;
        }
        Some((in_reg, addr.trim()))
    }

    fn return_value(&mut self) -> Option<&'a str> {
        self.scanner.skip_ws();
        let block = self.scanner.cpp_block("return value block");
        if block.is_none() {
            self.scanner
                .syntax_error("incorrect or missing block for 'return_value'.");
        }
        block
    }
}
