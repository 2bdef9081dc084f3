// The register block: register definitions, register classes (lists, code snippets and
// dynamic classes) and allocation classes. Allocation classes number the registers they list
// in order, so the order of alloc_class statements fixes every register's number.

use crate::adl::parser::AdlParser;
use crate::adl::register::{AllocClass, CallConv, RegClass, RegClassKind, RegDef, RegisterForm};
use crate::core::DiagnosticKind;

impl<'s, 'a> AdlParser<'s, 'a> {
    /// `register %{ reg_def ... reg_class ... alloc_class ... %}`
    pub(super) fn register_block(&mut self) {
        if self.model.registers().is_none() {
            self.session.record_form("register");
        }
        self.model.ensure_registers();
        if !self.open_block() {
            self.scanner
                .syntax_error("Missing %{ ... %} block after register keyword.");
            return;
        }
        while !self.at_body_end() {
            let Some(token) = self.scanner.ident() else {
                return;
            };
            match token {
                "reg_def" => self.reg_def(),
                "reg_class" => self.reg_class(),
                "reg_class_dynamic" => self.reg_class_dynamic(),
                "alloc_class" => self.alloc_class(),
                "#define" => self.scanner.define_directive(),
                _ => {
                    self.scanner
                        .syntax_error(format!("bad token {} inside register block.", token));
                }
            }
        }
        if !self.close_block() {
            self.scanner
                .syntax_error("missing '%}' at end of register block.");
        }
    }

    fn registers(&mut self) -> Option<&mut RegisterForm<'a>> {
        self.model.ensure_registers()
    }

    fn callconv(&mut self, missing: &str) -> Option<CallConv> {
        let Some(name) = self.scanner.ident() else {
            self.scanner.syntax_error(missing);
            return None;
        };
        let conv = CallConv::from_name(name);
        if conv.is_none() {
            self.scanner
                .syntax_error("invalid value for register calling convention");
        }
        conv
    }

    fn comma(&mut self) -> bool {
        self.expect(b',', "missing comma in register definition statement")
    }

    /// The first declaration of a register-block name stays.
    fn duplicate_register_name(&mut self, line: usize, name: &str, desc: &str) {
        self.scanner.report_at(
            DiagnosticKind::Semantic,
            line,
            format!("duplicate name {} for {}", name, desc),
        );
    }

    fn add_reg_class(&mut self, line: usize, class: RegClass<'a>) {
        let name = class.name;
        let added = self.registers().is_some_and(|regs| regs.add_reg_class(class));
        if !added {
            self.duplicate_register_name(line, name, "register class");
        }
    }

    /// `reg_def NAME ( CC, C_CC, IDEAL, ENCODING, CONCRETE );`
    fn reg_def(&mut self) {
        let line = self.scanner.line();
        let Some(name) = self.scanner.ident() else {
            return;
        };
        if !self.expect(b'(', "missing '(' in register definition statement") {
            return;
        }
        let Some(callconv) = self.callconv("missing register calling convention value") else {
            return;
        };
        if !self.comma() {
            return;
        }
        let Some(c_callconv) = self.callconv("missing register native calling convention value")
        else {
            return;
        };
        if !self.comma() {
            return;
        }
        let Some(ideal) = self.scanner.ident() else {
            return;
        };
        if !self.comma() {
            return;
        }
        self.scanner.skip_ws();
        let Some(encoding) = self.scanner.expr("encoding", ",") else {
            return;
        };
        if !self.comma() {
            return;
        }
        self.scanner.skip_ws();
        let Some(concrete) = self.scanner.expr("concrete", ")") else {
            return;
        };
        if !self.expect(b')', "missing ')' in register definition statement") {
            return;
        }
        if !self.expect(b';', "missing ';' after reg_def") {
            return;
        }
        log::trace!(
            "Register Definition: {} ( {}, {} {} )",
            name,
            callconv.name(),
            c_callconv.name(),
            concrete
        );
        let def = RegDef {
            name,
            callconv,
            c_callconv,
            ideal,
            encoding: encoding.trim(),
            concrete: concrete.trim(),
            number: None,
        };
        let added = self.registers().is_some_and(|regs| regs.add_reg_def(def));
        if !added {
            self.duplicate_register_name(line, name, "register definition");
        }
    }

    /// `reg_class NAME ( r, ... );` or `reg_class NAME %{ code %}`
    fn reg_class(&mut self) {
        let line = self.scanner.line();
        let Some(name) = self.scanner.ident() else {
            return;
        };
        log::trace!("Register Class: {}", name);
        self.scanner.skip_ws();
        match self.scanner.cur() {
            b'(' => {
                self.scanner.next_char();
                let mut class = RegClass::list(name);
                let Some(members) = self.reg_names("reg_class", |regs, reg| regs.reg_def(reg).is_some())
                else {
                    return;
                };
                if let RegClassKind::List { regs } = &mut class.kind {
                    for member in members {
                        regs.add_name(member);
                    }
                }
                self.add_reg_class(line, class);
                self.expect(b';', "missing ';' at end of reg_class definition.");
            }
            b'%' => {
                let Some(code) = self.scanner.cpp_block("reg class") else {
                    self.scanner
                        .syntax_error("missing code declaration for reg class.");
                    return;
                };
                let class = RegClass {
                    name,
                    kind: RegClassKind::CodeSnippet { code },
                    stack_version: false,
                };
                self.add_reg_class(line, class);
            }
            _ => {
                self.scanner
                    .syntax_error("missing '(' or '%{' in reg_class definition.");
            }
        }
    }

    /// Register names up to ')'. Names failing `known` are reported as
    /// semantic errors and left out.
    fn reg_names(
        &mut self,
        desc: &str,
        known: impl Fn(&RegisterForm<'a>, &str) -> bool,
    ) -> Option<Vec<&'a str>> {
        let mut names = Vec::new();
        self.scanner.skip_ws();
        while self.scanner.cur() != b')' {
            let Some(reg) = self.scanner.ident() else {
                return None;
            };
            let found = self.model.registers().is_some_and(|regs| known(regs, reg));
            if found {
                names.push(reg);
            } else {
                self.scanner.report_at(
                    DiagnosticKind::Semantic,
                    self.scanner.line(),
                    format!("unknown identifier {} inside {} list.", reg, desc),
                );
            }
            self.accept(b',');
            self.scanner.skip_ws();
        }
        self.scanner.next_char();
        Some(names)
    }

    /// `reg_class_dynamic NAME ( first, second, %{ condition %} );`
    fn reg_class_dynamic(&mut self) {
        let line = self.scanner.line();
        let Some(name) = self.scanner.ident() else {
            return;
        };
        if !self.expect(
            b'(',
            "missing '(' at the beginning of reg_class_dynamic definition",
        ) {
            return;
        }
        let mut classes = [""; 2];
        for slot in classes.iter_mut() {
            let Some(class) = self.scanner.ident() else {
                return;
            };
            if self
                .model
                .registers()
                .is_some_and(|regs| regs.reg_class(class).is_some())
            {
                *slot = class;
            } else {
                self.scanner.report_at(
                    DiagnosticKind::Semantic,
                    self.scanner.line(),
                    format!("unknown identifier {} inside reg_class_dynamic list.", class),
                );
            }
            if !self.expect(b',', "missing separator ',' inside reg_class_dynamic list.") {
                return;
            }
        }
        self.scanner.skip_ws();
        if self.scanner.cur() != b'%' {
            self.scanner.syntax_error(
                "missing % at the beginning of code block in reg_class_dynamic definition",
            );
            return;
        }
        let Some(condition) = self.scanner.cpp_block("reg class dynamic") else {
            self.scanner
                .syntax_error("missing code declaration for reg_class_dynamic.");
            return;
        };
        if !self.expect(b')', "missing ')' at the end of reg_class_dynamic definition") {
            return;
        }
        if !self.expect(b';', "missing ';' at the end of reg_class_dynamic definition.") {
            return;
        }
        let class = RegClass {
            name,
            kind: RegClassKind::Conditional { classes, condition },
            stack_version: false,
        };
        self.add_reg_class(line, class);
    }

    /// `alloc_class NAME ( r, ... );` numbers each register as it is listed.
    fn alloc_class(&mut self) {
        let line = self.scanner.line();
        let Some(name) = self.scanner.ident() else {
            return;
        };
        log::trace!("Allocation Class: {}", name);
        let added = self.registers().is_some_and(|regs| {
            regs.add_alloc_class(AllocClass {
                name,
                ..AllocClass::default()
            })
        });
        if !added {
            self.duplicate_register_name(line, name, "allocation class");
        }
        if !self.expect(b'(', "missing '(' in alloc_class definition.") {
            return;
        }
        self.scanner.skip_ws();
        while self.scanner.cur() != b')' {
            let Some(reg) = self.scanner.ident() else {
                return;
            };
            // Registers of a repeated class keep their first numbers.
            let numbered = if added {
                self.registers().is_some_and(|regs| regs.alloc_reg(name, reg))
            } else {
                self.model
                    .registers()
                    .is_some_and(|regs| regs.reg_def(reg).is_some())
            };
            if !numbered {
                self.scanner.syntax_error(format!(
                    "name {} should be a previously defined reg_def.",
                    reg
                ));
                return;
            }
            self.accept(b',');
            self.scanner.skip_ws();
        }
        self.scanner.next_char();
        self.expect(b';', "missing ';' at end of alloc_class definition.");
    }
}
