// Operand declarations and the operand-only clauses: register constraints and the four
// interface kinds through which generated code reads an operand's fields.

use crate::adl::forms::{AttrKind, CondInterface, Constraint, Form, Interface, OperandForm};
use crate::adl::parser::AdlParser;

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `operand NAME ( params ) %{ ... %}`
    pub(super) fn operand(&mut self) {
        let line = self.scanner.line();
        let Some((ident, duplicate)) = self.declared_name("operand") else {
            return;
        };
        log::debug!("Parsing Operand Form {}", ident);
        let mut oper = OperandForm::new(ident, line);

        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner.syntax_error("missing '(' in operand definition");
            return;
        }
        self.oplist(&mut oper.params, &mut oper.locals);
        if !self.open_block() {
            self.scanner.syntax_error("missing '%{' in operand definition");
            return;
        }

        while !self.at_body_end() {
            let Some(keyword) = self.scanner.ident() else {
                continue;
            };
            match keyword {
                "predicate" => oper.predicate = self.predicate(),
                "match" => {
                    if let Some(mut rule) = self.match_rule(&oper.locals) {
                        rule.set_result(ident);
                        oper.rules.push(rule);
                    }
                }
                "encode" | "interface" => oper.interface = self.interface(),
                "ins_encode" => self
                    .scanner
                    .syntax_error("Operands specify 'encode', not 'ins_encode'"),
                "opcode" => self
                    .scanner
                    .syntax_error("Operands do not specify an opcode"),
                "effect" => self
                    .scanner
                    .syntax_error("Operands do not specify an effect"),
                "expand" => self
                    .scanner
                    .syntax_error("Operands do not specify an expand"),
                "rewrite" => self
                    .scanner
                    .syntax_error("Operands do not specify a rewrite"),
                "constraint" => oper.constraint = self.constraint(),
                "construct" => {
                    self.scanner.skip_ws();
                    oper.construct = self.scanner.cpp_block("construct block");
                }
                "format" => oper.format = self.format(),
                name if self.is_attribute(name, AttrKind::Operand) => {
                    if let Some(attr) = self.attribute(name, AttrKind::Operand) {
                        oper.attribs.insert(0, attr);
                    }
                }
                other => self.scanner.syntax_error(format!(
                    "expected one of - constraint, predicate, match, encode, format, \
                     construct, or the name of a defined operand attribute at {}",
                    other
                )),
            }
        }
        if !self.close_block() {
            self.scanner.syntax_error("missing '%}' in operand definition");
            return;
        }
        if !duplicate {
            self.add_declared(ident, Form::Operand(oper));
        }
    }

    /// `constraint ( ALLOC_IN_RC ( class ) );`
    fn constraint(&mut self) -> Option<Constraint<'a>> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("missing constraint expression, (...)");
            return None;
        }
        self.scanner.next_char();
        let func = self.scanner.ident()?;
        if func != "ALLOC_IN_RC" && func != "IS_R_CLASS" {
            self.scanner
                .syntax_error(format!("Invalid constraint function {}", func));
            return None;
        }
        if !self.expect(b'(', "missing '(' for constraint function's argument.") {
            return None;
        }
        let arg = self.scanner.ident()?;
        if !self.expect(
            b')',
            &format!("missing ')' after constraint function argument {}", arg),
        ) {
            return None;
        }
        if !self.expect(b')', &format!("Missing ')' for constraint function {}", func)) {
            return None;
        }
        if !self.expect(b';', "Missing ';' after constraint.") {
            return None;
        }
        Some(Constraint { func, arg })
    }

    /// `interface ( KIND ) ;` or `interface ( KIND ) %{ fields %}`
    fn interface(&mut self) -> Option<Interface<'a>> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("Missing '(' at start of interface description.");
            return None;
        }
        self.scanner.next_char();
        let name = self.scanner.ident()?;
        if !self.expect(b')', "Missing ')' after name of interface.") {
            return None;
        }

        self.scanner.skip_ws();
        let interface = if self.scanner.cur() == b';' {
            self.scanner.next_char();
            match name {
                "REG_INTER" => Some(Interface::Reg),
                "CONST_INTER" => Some(Interface::Const),
                _ => None,
            }
        } else {
            let interface = match name {
                "MEMORY_INTER" => self.memory_interface(),
                "COND_INTER" => self.cond_interface(),
                _ => None,
            };
            self.scanner.skip_ws();
            if self.scanner.cur() == b';' {
                self.scanner
                    .syntax_error("Extra ';' after defining interface block.");
                return None;
            }
            interface
        };
        if interface.is_none() {
            log::warn!("Ignoring interface {}", name);
        }
        interface
    }

    fn interface_block_start(&mut self, desc: &str) -> bool {
        if !self.open_block() {
            self.scanner
                .syntax_error(format!("Missing '%{{' for '{}' block.", desc));
            return false;
        }
        true
    }

    fn interface_block_end(&mut self) -> bool {
        if !self.close_block() {
            self.scanner
                .syntax_error("Missing '%}' for 'interface' block.");
            return false;
        }
        true
    }

    fn memory_interface(&mut self) -> Option<Interface<'a>> {
        if !self.interface_block_start("interface") {
            return None;
        }
        let (mut base, mut index, mut scale, mut disp) = (None, None, None, None);
        while !self.at_body_end() {
            let field = self.scanner.ident()?;
            let slot = match field {
                "base" => &mut base,
                "index" => &mut index,
                "scale" => &mut scale,
                "disp" => &mut disp,
                _ => {
                    self.scanner.syntax_error(
                        "Expected keyword, base|index|scale|disp,  or '%}' ending interface.",
                    );
                    return None;
                }
            };
            *slot = self.interface_field(None);
        }
        if !self.interface_block_end() {
            return None;
        }
        Some(Interface::Memory {
            base,
            index,
            scale,
            disp,
        })
    }

    fn cond_interface(&mut self) -> Option<Interface<'a>> {
        if !self.interface_block_start("cond_interface") {
            return None;
        }
        let mut cond = CondInterface::new();
        while !self.at_body_end() {
            let name = self.scanner.ident()?;
            let Some(field) = cond.field_mut(name) else {
                self.scanner.syntax_error(
                    "Expected keyword, base|index|scale|disp,  or '%}' ending interface.",
                );
                return None;
            };
            let mut format = field.format;
            field.value = self.interface_field(Some(&mut format));
            field.format = format;
        }
        if !self.interface_block_end() {
            return None;
        }
        Some(Interface::Cond(cond))
    }

    /// `( $var | 0xNN [, "fmt"] );`
    fn interface_field(&mut self, format: Option<&mut &'a str>) -> Option<&'a str> {
        self.scanner.skip_ws();
        if self.scanner.cur() != b'(' {
            self.scanner
                .syntax_error("Missing '(' at start of interface field.");
            return None;
        }
        self.scanner.next_char();
        self.scanner.skip_ws();
        let value = match self.scanner.cur() {
            b'$' => self.scanner.rep_var(true),
            b'0' => self.scanner.ident(),
            _ => None,
        };
        let Some(value) = value else {
            self.scanner
                .syntax_error("missing or invalid interface field contents.");
            return None;
        };

        self.scanner.skip_ws();
        if let Some(format) = format {
            if self.scanner.cur() == b',' {
                self.scanner.next_char();
                self.scanner.skip_ws();
                if self.scanner.cur() != b'"' {
                    self.scanner.syntax_error("Missing '\"' in field format .");
                    return None;
                }
                self.scanner.next_char();
                let start = self.scanner.mark();
                while !matches!(self.scanner.cur(), b'"' | b'%' | b'\n' | 0) {
                    if self.scanner.cur() == b'\\' {
                        self.scanner.next_char();
                    }
                    self.scanner.next_char();
                }
                if self.scanner.cur() != b'"' {
                    self.scanner
                        .syntax_error("Missing '\"' at end of field format .");
                    return None;
                }
                let text = self.scanner.slice_from(start);
                if !text.is_empty() {
                    *format = text;
                }
                self.scanner.next_char();
            }
        }
        if !self.expect(b')', "Missing ')' after interface field.") {
            return None;
        }
        if !self.expect(b';', "Missing ';' at end of interface field.") {
            return None;
        }
        Some(value)
    }
}
