// Encode classes are the named code templates instructions invoke to emit machine code. A class
// has typed formal parameters and a body stored as segments: literal C++ text interleaved with
// `$name` replacement variables that the code generator substitutes per instruction. Classes
// written inline in an instruction (`ins_encode %{ %}`, `postalloc_expand %{ %}`, constant
// table expressions) are synthesized here under generated names so the backend sees a single
// uniform table.

//! Encode classes and the encode block.

use crate::core::{Dict, NameList, Segment};

/// Preamble of an inline `ins_encode` body.
pub const MASM_PREAMBLE: &str = "    C2_MacroAssembler _masm(&cbuf);\n";

/// Name of the encode class synthesized for an inline instruction body.
pub fn inline_class_name(instr: &str) -> String {
    format!("__ins_encode_{}", instr)
}

/// Name of the encode class holding an instruction's constant expression.
pub fn constant_class_name(instr: &str) -> String {
    format!("__constant_{}", instr)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncClass<'a> {
    pub name: &'a str,
    pub line: usize,
    /// `(type, name)` per formal parameter.
    pub params: Vec<(&'a str, &'a str)>,
    pub code: Vec<Segment<'a>>,
}

impl<'a> EncClass<'a> {
    pub fn new(name: &'a str, line: usize) -> Self {
        Self {
            name,
            line,
            ..Self::default()
        }
    }

    pub fn add_parameter(&mut self, ty: &'a str, name: &'a str) {
        self.params.push((ty, name));
    }

    pub fn add_code(&mut self, text: &'a str) {
        self.code.push(Segment::Text(text));
    }

    pub fn add_rep_var(&mut self, name: &'a str) {
        self.code.push(Segment::RepVar(name));
    }

    pub fn rep_vars(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.code.iter().filter(|s| s.is_rep_var()).map(|s| s.text())
    }

    /// Type of formal parameter `name`.
    pub fn param_type(&self, name: &str) -> Option<&'a str> {
        self.params.iter().find(|(_, n)| *n == name).map(|(t, _)| *t)
    }

    /// The body with replacement variables spelled `$name`.
    pub fn body(&self) -> String {
        self.code
            .iter()
            .map(|s| match s {
                Segment::RepVar(v) | Segment::TemplateRepVar(v) => format!("${}", v),
                other => other.text().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeForm<'a> {
    classes: Dict<'a, EncClass<'a>>,
    order: NameList<'a>,
}

impl<'a> EncodeForm<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class; a repeated name replaces the earlier body but keeps its
    /// place in the order.
    pub fn add_class(&mut self, class: EncClass<'a>) {
        let name = class.name;
        if self.classes.insert(name, class).is_none() {
            self.order.add_name(name);
        }
    }

    pub fn class(&self, name: &str) -> Option<&EncClass<'a>> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &EncClass<'a>> + '_ {
        self.order.iter().filter_map(move |n| self.classes.get(n))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enc_class_body() {
        let mut class = EncClass::new("OpcP", 3);
        class.add_parameter("rRegI", "dst");
        class.add_code("emit_opcode(cbuf, ");
        class.add_rep_var("primary");
        class.add_code(");");

        assert_eq!(class.body(), "emit_opcode(cbuf, $primary);");
        assert_eq!(class.rep_vars().collect::<Vec<_>>(), vec!["primary"]);
        assert_eq!(class.param_type("dst"), Some("rRegI"));
    }

    #[test]
    fn test_encode_form_order() {
        let mut enc = EncodeForm::new();
        enc.add_class(EncClass::new("b", 1));
        enc.add_class(EncClass::new("a", 2));
        enc.add_class(EncClass::new("b", 3));
        let names: Vec<_> = enc.classes().map(|c| (c.name, c.line)).collect();
        assert_eq!(names, vec![("b", 3), ("a", 2)]);
        assert_eq!(inline_class_name("addI"), "__ins_encode_addI");
        assert_eq!(constant_class_name("loadConF"), "__constant_loadConF");
    }
}
