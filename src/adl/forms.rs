// This module defines the declarations of an architecture description as one closed sum type.
// Every top-level declaration, and every built-in name of the ideal graph, is a Form stored in
// the model's form arena and referenced by a generation-checked FormId. Instructions and
// operands carry their formal parameters, a local table mapping each parameter to its operand
// type, match rules, effects and the clauses of their bodies; the other variants are smaller
// records or whole sub-models (registers, pipeline, encode classes, frame). Typed accessors
// replace downcasts: `is_opclass` answers for operands too, since an operand is an operand
// class with a single member.

//! The form model.

use crate::adl::components::{ComponentList, UseDef};
use crate::adl::encode::EncodeForm;
use crate::adl::frame::FrameForm;
use crate::adl::ideal;
use crate::adl::match_rule::MatchRule;
use crate::adl::peephole::Peephole;
use crate::adl::pipeline::PipelineForm;
use crate::adl::register::RegisterForm;
use crate::core::{Dict, Handle, NameList, Segment};

/// Handle of a form in the model arena.
pub type FormId<'a> = Handle<Form<'a>>;

/// Global name table.
pub type FormDict<'a> = Dict<'a, FormId<'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Instruct,
    Operand,
    OpClass,
    Attribute,
    Effect,
    Register,
    Pipeline,
    MachNode,
    Encode,
    Source,
    Frame,
    Peephole,
}

impl FormKind {
    pub fn name(self) -> &'static str {
        match self {
            FormKind::Instruct => "instruct",
            FormKind::Operand => "operand",
            FormKind::OpClass => "opclass",
            FormKind::Attribute => "attribute",
            FormKind::Effect => "effect",
            FormKind::Register => "register",
            FormKind::Pipeline => "pipeline",
            FormKind::MachNode => "machnode",
            FormKind::Encode => "encode",
            FormKind::Source => "source",
            FormKind::Frame => "frame",
            FormKind::Peephole => "peephole",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Form<'a> {
    Instruct(InstructForm<'a>),
    Operand(OperandForm<'a>),
    OpClass(OpClassForm<'a>),
    Attribute(AttributeForm<'a>),
    Effect(EffectForm<'a>),
    Register(RegisterForm<'a>),
    Pipeline(PipelineForm<'a>),
    MachNode(MachNodeForm<'a>),
    Encode(EncodeForm<'a>),
    Source(SourceForm<'a>),
    Frame(FrameForm<'a>),
    Peephole(Peephole<'a>),
}

macro_rules! form_accessors {
    ($($variant:ident => $as_ref:ident, $as_mut:ident, $ty:ident;)*) => {
        $(
            pub fn $as_ref(&self) -> Option<&$ty<'a>> {
                match self {
                    Form::$variant(f) => Some(f),
                    _ => None,
                }
            }

            pub fn $as_mut(&mut self) -> Option<&mut $ty<'a>> {
                match self {
                    Form::$variant(f) => Some(f),
                    _ => None,
                }
            }
        )*
    };
}

impl<'a> Form<'a> {
    form_accessors! {
        Instruct => as_instruct, as_instruct_mut, InstructForm;
        Operand => as_operand, as_operand_mut, OperandForm;
        OpClass => as_opclass, as_opclass_mut, OpClassForm;
        Attribute => as_attribute, as_attribute_mut, AttributeForm;
        Effect => as_effect, as_effect_mut, EffectForm;
        Register => as_register, as_register_mut, RegisterForm;
        Pipeline => as_pipeline, as_pipeline_mut, PipelineForm;
        MachNode => as_machnode, as_machnode_mut, MachNodeForm;
        Encode => as_encode, as_encode_mut, EncodeForm;
        Source => as_source, as_source_mut, SourceForm;
        Frame => as_frame, as_frame_mut, FrameForm;
        Peephole => as_peephole, as_peephole_mut, Peephole;
    }

    pub fn kind(&self) -> FormKind {
        match self {
            Form::Instruct(_) => FormKind::Instruct,
            Form::Operand(_) => FormKind::Operand,
            Form::OpClass(_) => FormKind::OpClass,
            Form::Attribute(_) => FormKind::Attribute,
            Form::Effect(_) => FormKind::Effect,
            Form::Register(_) => FormKind::Register,
            Form::Pipeline(_) => FormKind::Pipeline,
            Form::MachNode(_) => FormKind::MachNode,
            Form::Encode(_) => FormKind::Encode,
            Form::Source(_) => FormKind::Source,
            Form::Frame(_) => FormKind::Frame,
            Form::Peephole(_) => FormKind::Peephole,
        }
    }

    /// Operands and operand classes can both type a parameter.
    pub fn is_opclass(&self) -> bool {
        matches!(self, Form::Operand(_) | Form::OpClass(_))
    }

    /// Built-in form of the ideal graph.
    pub fn ideal_only(&self) -> bool {
        match self {
            Form::Instruct(i) => i.ideal_only,
            Form::Operand(o) => o.ideal_only,
            _ => false,
        }
    }

    pub fn ident(&self) -> Option<&'a str> {
        match self {
            Form::Instruct(f) => Some(f.ident),
            Form::Operand(f) => Some(f.ident),
            Form::OpClass(f) => Some(f.ident),
            Form::Attribute(f) => Some(f.ident),
            Form::Effect(f) => Some(f.name),
            Form::MachNode(f) => Some(f.ident),
            _ => None,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Form::Instruct(f) => f.line,
            Form::Operand(f) => f.line,
            Form::OpClass(f) => f.line,
            Form::Attribute(f) => f.line,
            Form::MachNode(f) => f.line,
            Form::Source(f) => f.line,
            Form::Frame(f) => f.line,
            Form::Peephole(f) => f.line,
            Form::Effect(_) | Form::Register(_) | Form::Pipeline(_) | Form::Encode(_) => 0,
        }
    }
}

/// Instruction or operand attribute declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Instruction,
    Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeForm<'a> {
    pub ident: &'a str,
    pub line: usize,
    pub kind: AttrKind,
    /// Default value expression.
    pub default: &'a str,
}

/// An attribute set in an instruction or operand body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub kind: AttrKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectForm<'a> {
    pub name: &'a str,
    pub usedef: UseDef,
}

/// Operand interface kind and its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interface<'a> {
    Reg,
    Const,
    Memory {
        base: Option<&'a str>,
        index: Option<&'a str>,
        scale: Option<&'a str>,
        disp: Option<&'a str>,
    },
    Cond(CondInterface<'a>),
}

impl Interface<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Reg => "REG_INTER",
            Interface::Const => "CONST_INTER",
            Interface::Memory { .. } => "MEMORY_INTER",
            Interface::Cond(_) => "COND_INTER",
        }
    }
}

/// Condition-code fields in declaration order of the interface block.
pub const COND_FIELDS: [&str; 8] = [
    "equal",
    "not_equal",
    "less",
    "greater_equal",
    "less_equal",
    "greater",
    "overflow",
    "no_overflow",
];

pub const COND_DEFAULT_FORMATS: [&str; 8] = ["eq", "ne", "lt", "ge", "le", "gt", "o", "no"];

/// One condition-code field: encoding and the mnemonic suffix printed for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CondField<'a> {
    pub value: Option<&'a str>,
    pub format: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondInterface<'a> {
    pub fields: [CondField<'a>; 8],
}

impl<'a> CondInterface<'a> {
    pub fn new() -> Self {
        Self {
            fields: COND_DEFAULT_FORMATS.map(|format| CondField {
                value: None,
                format,
            }),
        }
    }

    pub fn field(&self, name: &str) -> Option<&CondField<'a>> {
        COND_FIELDS
            .iter()
            .position(|f| *f == name)
            .map(|i| &self.fields[i])
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut CondField<'a>> {
        COND_FIELDS
            .iter()
            .position(|f| *f == name)
            .map(move |i| &mut self.fields[i])
    }
}

impl Default for CondInterface<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// `ALLOC_IN_RC(class)` or `IS_R_CLASS(class)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint<'a> {
    pub func: &'a str,
    pub arg: &'a str,
}

impl Constraint<'_> {
    pub fn stack_slots_only(&self) -> bool {
        self.func == "ALLOC_IN_RC" && self.arg == "stack_slots"
    }
}

/// One encode class invocation with its actual arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeCall<'a> {
    pub name: &'a str,
    pub args: NameList<'a>,
}

/// `ins_encode(...)` or `postalloc_expand(...)` of an instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsEncode<'a> {
    pub line: usize,
    pub calls: Vec<EncodeCall<'a>>,
}

impl<'a> InsEncode<'a> {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            calls: Vec::new(),
        }
    }

    pub fn add_call(&mut self, name: &'a str) -> &mut EncodeCall<'a> {
        self.calls.push(EncodeCall {
            name,
            args: NameList::new(),
        });
        let last = self.calls.len() - 1;
        &mut self.calls[last]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Opcode<'a> {
    pub primary: Option<&'a str>,
    pub secondary: Option<&'a str>,
    pub tertiary: Option<&'a str>,
}

impl Opcode<'_> {
    /// Replacement variables naming an opcode field.
    pub fn is_opcode_name(name: &str) -> bool {
        matches!(name, "primary" | "secondary" | "tertiary")
    }
}

/// An instruction invocation inside an expand rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandInstruction<'a> {
    pub name: &'a str,
    pub operands: NameList<'a>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandRule<'a> {
    /// Operands introduced by the rule, in order.
    pub new_operands: NameList<'a>,
    /// Constructor code per new operand that has one.
    pub constructors: Dict<'a, &'a str>,
    pub instructions: Vec<ExpandInstruction<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteRule<'a> {
    pub params: &'a str,
    pub code: &'a str,
}

/// A format rule; template rules keep their C++ text separate from
/// the text printed by `$$emit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatRule<'a> {
    pub segments: Vec<Segment<'a>>,
    pub is_template: bool,
}

impl<'a> FormatRule<'a> {
    pub fn rep_vars(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.segments
            .iter()
            .filter(|s| s.is_rep_var())
            .map(|s| s.text())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `source %{ %}`.
    Source,
    /// `source_hpp` after the register block.
    Header,
    /// `source_hpp` before the register block.
    PreHeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceForm<'a> {
    pub kind: SourceKind,
    pub line: usize,
    pub code: &'a str,
}

/// Machine node bound to a pipe class by the pipeline's `define` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachNodeForm<'a> {
    pub ident: &'a str,
    pub line: usize,
    pub pipe_class: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpClassForm<'a> {
    pub ident: &'a str,
    pub line: usize,
    /// Member operand names in declaration order.
    pub members: NameList<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct OperandForm<'a> {
    pub ident: &'a str,
    pub line: usize,
    pub ideal_only: bool,
    pub params: NameList<'a>,
    /// Parameter name to operand type.
    pub locals: Dict<'a, &'a str>,
    pub predicate: Option<&'a str>,
    pub rules: Vec<MatchRule<'a>>,
    pub interface: Option<Interface<'a>>,
    pub constraint: Option<Constraint<'a>>,
    pub construct: Option<&'a str>,
    pub format: Option<FormatRule<'a>>,
    pub attribs: Vec<Attribute<'a>>,
    /// Operand classes listing this operand.
    pub classes: NameList<'a>,
    pub components: ComponentList<'a>,
}

impl<'a> OperandForm<'a> {
    pub fn new(ident: &'a str, line: usize) -> Self {
        Self {
            ident,
            line,
            ..Self::default()
        }
    }

    pub fn ideal(ident: &'a str) -> Self {
        Self {
            ident,
            ideal_only: true,
            ..Self::default()
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.interface, Some(Interface::Const))
    }

    pub fn is_register(&self) -> bool {
        matches!(self.interface, Some(Interface::Reg))
    }

    pub fn stack_slots_only(&self) -> bool {
        self.constraint.is_some_and(|c| c.stack_slots_only())
    }

    /// Value of the `op_cost` attribute.
    pub fn cost(&self) -> Option<&'a str> {
        attribute_value(&self.attribs, ideal::OP_COST)
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        attribute_value(&self.attribs, name)
    }

    pub fn num_leaves(&self) -> usize {
        self.rules.first().map_or(0, |r| r.num_leaves)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstructForm<'a> {
    pub ident: &'a str,
    pub line: usize,
    pub ideal_only: bool,
    pub params: NameList<'a>,
    /// Parameter name to operand type.
    pub locals: Dict<'a, &'a str>,
    /// Use/def effect per parameter.
    pub effects: Dict<'a, UseDef>,
    pub has_call: bool,
    pub predicate: Option<&'a str>,
    /// The rule of this form first; on the declaring form, the rules of
    /// its clones follow.
    pub rules: Vec<MatchRule<'a>>,
    pub attribs: Vec<Attribute<'a>>,
    pub ins_encode: Option<InsEncode<'a>>,
    pub is_postalloc_expand: bool,
    /// Constant table entry built from a `$constantaddress(...)` argument.
    pub constant: Option<InsEncode<'a>>,
    pub is_mach_constant: bool,
    pub needs_constant_base: bool,
    pub opcode: Option<Opcode<'a>>,
    pub size: Option<&'a str>,
    pub expand: Option<ExpandRule<'a>>,
    pub rewrite: Option<RewriteRule<'a>>,
    pub format: Option<FormatRule<'a>>,
    pub ins_pipe: Option<&'a str>,
    pub peepholes: Vec<FormId<'a>>,
    pub components: ComponentList<'a>,
    /// Declaring instruction of a match-rule clone.
    pub cloned_from: Option<&'a str>,
}

impl<'a> InstructForm<'a> {
    pub fn new(ident: &'a str, line: usize) -> Self {
        Self {
            ident,
            line,
            ..Self::default()
        }
    }

    pub fn ideal(ident: &'a str) -> Self {
        Self {
            ident,
            ideal_only: true,
            ..Self::default()
        }
    }

    /// Copy of `self` for an additional match rule.
    pub fn clone_for_rule(&self, ident: &'a str, rule: MatchRule<'a>) -> Self {
        let mut clone = self.clone();
        clone.ident = ident;
        clone.rules = vec![rule];
        clone.peepholes = Vec::new();
        clone.components = ComponentList::new();
        clone.cloned_from = Some(self.ident);
        clone
    }

    pub fn rule(&self) -> Option<&MatchRule<'a>> {
        self.rules.first()
    }

    /// Number of match rules declared or derived for this instruction.
    pub fn num_match_rules(&self) -> usize {
        self.rules.len()
    }

    /// Value of the `ins_cost` attribute.
    pub fn cost(&self) -> Option<&'a str> {
        attribute_value(&self.attribs, ideal::INS_COST)
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        attribute_value(&self.attribs, name)
    }

    pub fn expands(&self) -> bool {
        self.expand.is_some()
    }

    pub fn postalloc_expands(&self) -> bool {
        self.is_postalloc_expand
    }

    pub fn is_ideal_control(&self) -> bool {
        self.rule().is_some_and(|r| r.is_ideal_control())
    }

    /// `(Set dst src)` with a leaf on the right.
    pub fn is_chain_of_leaf(&self) -> bool {
        self.rule().is_some_and(|r| {
            r.op_type() == "Set" && r.right().is_some_and(|right| right.is_leaf())
        })
    }
}

/// Attributes are prepended as they are parsed, so the latest setting
/// comes first.
fn attribute_value<'a>(attribs: &[Attribute<'a>], name: &str) -> Option<&'a str> {
    attribs.iter().find(|a| a.name == name).map(|a| a.value)
}
