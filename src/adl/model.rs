// ArchModel is the in-memory architecture description handed to a code-generation backend. It
// owns every form in a generation-checked arena, the global name table binding each declared
// name to its form, and the source-ordered form list. The singleton blocks (registers,
// pipeline, encode classes, frame) are ordinary forms reachable through typed accessors. The
// model also carries what the parser derives while reading: the chain-rule table keyed by
// operand type, the internal operand names built from match subtrees, `int_def` definitions,
// the final preprocessor symbols and the ideal opcodes that received a match rule. A fresh
// model already knows the built-in names of the ideal graph; those forms are global but are
// not part of the ordered list, which only holds what the description declared.

//! The architecture model.

use std::fmt;

use crate::adl::components::{ComponentList, UseDef};
use crate::adl::encode::EncodeForm;
use crate::adl::forms::{
    AttrKind, AttributeForm, Constraint, EffectForm, Form, FormDict, FormId, FormKind,
    InstructForm, MachNodeForm, OpClassForm, OperandForm, SourceForm,
};
use crate::adl::frame::FrameForm;
use crate::adl::ideal;
use crate::adl::match_rule::InternalOps;
use crate::adl::peephole::Peephole;
use crate::adl::pipeline::PipelineForm;
use crate::adl::register::RegisterForm;
use crate::core::{Arena, Dict, FormList, NameList};

/// One way to produce `result` from the operand type the rule is
/// filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainRule<'a> {
    pub result: &'a str,
    /// Cost expression, kept as written.
    pub cost: &'a str,
    pub instruction: &'a str,
}

/// `int_def NAME (value, description);`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntDef<'a> {
    pub name: &'a str,
    pub value: i64,
    pub description: Option<&'a str>,
}

/// A problem found by a whole-model pass, attributed to a declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIssue {
    pub line: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ArchModel<'a> {
    forms: Arena<Form<'a>>,
    globals: FormDict<'a>,
    order: FormList<FormId<'a>>,
    register: Option<FormId<'a>>,
    pipeline: Option<FormId<'a>>,
    encode: Option<FormId<'a>>,
    frame: Option<FormId<'a>>,
    peepholes: Vec<FormId<'a>>,
    chain_rules: Dict<'a, Vec<ChainRule<'a>>>,
    chain_order: NameList<'a>,
    internal_ops: InternalOps<'a>,
    int_defs: Dict<'a, IntDef<'a>>,
    int_def_order: NameList<'a>,
    preproc_defs: Dict<'a, &'a str>,
    matched_ideal: NameList<'a>,
}

impl<'a> ArchModel<'a> {
    /// Empty model with the ideal graph's names pre-registered.
    pub fn new() -> Self {
        let mut model = Self {
            forms: Arena::new(),
            globals: Dict::new(),
            order: FormList::new(),
            register: None,
            pipeline: None,
            encode: None,
            frame: None,
            peepholes: Vec::new(),
            chain_rules: Dict::new(),
            chain_order: NameList::new(),
            internal_ops: InternalOps::new(),
            int_defs: Dict::new(),
            int_def_order: NameList::new(),
            preproc_defs: Dict::new(),
            matched_ideal: NameList::new(),
        };
        model.register_ideal_forms();
        model
    }

    fn register_ideal_forms(&mut self) {
        let operands = ideal::IDEAL_OPERANDS.iter().chain(ideal::IDEAL_CONSTANTS);
        for &name in operands {
            self.add_builtin(name, Form::Operand(OperandForm::ideal(name)));
        }
        for &name in ideal::IDEAL_OPCODES {
            if !self.globals.contains(name) {
                self.add_builtin(name, Form::Instruct(InstructForm::ideal(name)));
            }
        }
        for &(name, class) in ideal::SPECIAL_OPERANDS {
            let mut oper = OperandForm::ideal(name);
            oper.constraint = class.map(|arg| Constraint {
                func: "ALLOC_IN_RC",
                arg,
            });
            self.add_builtin(name, Form::Operand(oper));
        }
        for &name in ideal::EFFECT_NAMES {
            if let Some(usedef) = UseDef::from_name(name) {
                self.add_builtin(name, Form::Effect(EffectForm { name, usedef }));
            }
        }
    }

    fn add_builtin(&mut self, name: &'a str, form: Form<'a>) {
        let id = self.forms.alloc(form);
        self.globals.insert(name, id);
    }

    // ----- forms and names -----

    /// Append a form to the source-ordered list without naming it.
    pub fn add_form(&mut self, form: Form<'a>) -> FormId<'a> {
        let id = self.forms.alloc(form);
        self.order.push(id);
        id
    }

    /// Append a named form. A name already in the global table is left
    /// bound to its form and the new one is dropped.
    pub fn declare(&mut self, name: &'a str, form: Form<'a>) -> Result<FormId<'a>, FormId<'a>> {
        if let Some(existing) = self.globals.lookup(name) {
            return Err(existing);
        }
        let id = self.add_form(form);
        self.globals.insert(name, id);
        Ok(id)
    }

    pub fn register_global(&mut self, name: &'a str, id: FormId<'a>) -> bool {
        self.globals.insert_new(name, id)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn lookup(&self, name: &str) -> Option<FormId<'a>> {
        self.globals.lookup(name)
    }

    pub fn lookup_form(&self, name: &str) -> Option<&Form<'a>> {
        self.lookup(name).and_then(|id| self.forms.get(id))
    }

    pub fn lookup_form_mut(&mut self, name: &str) -> Option<&mut Form<'a>> {
        let id = self.lookup(name)?;
        self.forms.get_mut(id)
    }

    pub fn form(&self, id: FormId<'a>) -> Option<&Form<'a>> {
        self.forms.get(id)
    }

    pub fn form_mut(&mut self, id: FormId<'a>) -> Option<&mut Form<'a>> {
        self.forms.get_mut(id)
    }

    /// Declared forms in source order.
    pub fn forms(&self) -> impl Iterator<Item = (FormId<'a>, &Form<'a>)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.forms.get(id).map(|f| (id, f)))
    }

    pub fn num_forms(&self) -> usize {
        self.order.len()
    }

    pub fn count(&self, kind: FormKind) -> usize {
        self.forms().filter(|(_, f)| f.kind() == kind).count()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &InstructForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_instruct())
    }

    pub fn operands(&self) -> impl Iterator<Item = &OperandForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_operand())
    }

    pub fn opclasses(&self) -> impl Iterator<Item = &OpClassForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_opclass())
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_attribute())
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_source())
    }

    pub fn mach_nodes(&self) -> impl Iterator<Item = &MachNodeForm<'a>> + '_ {
        self.forms().filter_map(|(_, f)| f.as_machnode())
    }

    pub fn instruction(&self, name: &str) -> Option<&InstructForm<'a>> {
        self.lookup_form(name).and_then(Form::as_instruct)
    }

    pub fn instruction_mut(&mut self, name: &str) -> Option<&mut InstructForm<'a>> {
        self.lookup_form_mut(name).and_then(Form::as_instruct_mut)
    }

    pub fn operand(&self, name: &str) -> Option<&OperandForm<'a>> {
        self.lookup_form(name).and_then(Form::as_operand)
    }

    pub fn operand_mut(&mut self, name: &str) -> Option<&mut OperandForm<'a>> {
        self.lookup_form_mut(name).and_then(Form::as_operand_mut)
    }

    /// Attribute declaration `name` of the given kind.
    pub fn attribute(&self, name: &str, kind: AttrKind) -> Option<&AttributeForm<'a>> {
        self.lookup_form(name)
            .and_then(Form::as_attribute)
            .filter(|a| a.kind == kind)
    }

    // ----- singleton blocks -----

    pub fn registers(&self) -> Option<&RegisterForm<'a>> {
        self.register.and_then(|id| self.forms.get(id)?.as_register())
    }

    pub fn registers_mut(&mut self) -> Option<&mut RegisterForm<'a>> {
        let id = self.register?;
        self.forms.get_mut(id)?.as_register_mut()
    }

    /// The register block, created and appended on first use.
    pub fn ensure_registers(&mut self) -> Option<&mut RegisterForm<'a>> {
        if self.register.is_none() {
            self.register = Some(self.add_form(Form::Register(RegisterForm::new())));
        }
        self.registers_mut()
    }

    pub fn pipeline(&self) -> Option<&PipelineForm<'a>> {
        self.pipeline.and_then(|id| self.forms.get(id)?.as_pipeline())
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut PipelineForm<'a>> {
        let id = self.pipeline?;
        self.forms.get_mut(id)?.as_pipeline_mut()
    }

    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Install the pipeline block; a later block replaces the earlier one.
    pub fn set_pipeline(&mut self, pipeline: PipelineForm<'a>) -> FormId<'a> {
        let id = self.add_form(Form::Pipeline(pipeline));
        self.pipeline = Some(id);
        id
    }

    pub fn encode(&self) -> Option<&EncodeForm<'a>> {
        self.encode.and_then(|id| self.forms.get(id)?.as_encode())
    }

    pub fn encode_mut(&mut self) -> Option<&mut EncodeForm<'a>> {
        let id = self.encode?;
        self.forms.get_mut(id)?.as_encode_mut()
    }

    /// The encode block, created and appended on first use.
    pub fn ensure_encode(&mut self) -> Option<&mut EncodeForm<'a>> {
        if self.encode.is_none() {
            self.encode = Some(self.add_form(Form::Encode(EncodeForm::new())));
        }
        self.encode_mut()
    }

    pub fn frame(&self) -> Option<&FrameForm<'a>> {
        self.frame.and_then(|id| self.forms.get(id)?.as_frame())
    }

    /// Install the frame block; a later block replaces the earlier one.
    pub fn set_frame(&mut self, frame: FrameForm<'a>) -> FormId<'a> {
        let id = self.add_form(Form::Frame(frame));
        self.frame = Some(id);
        id
    }

    // ----- peepholes -----

    /// Store a peephole and attach it to its root instruction. Peepholes
    /// are not part of the ordered form list.
    pub fn add_peephole(&mut self, peep: Peephole<'a>) -> FormId<'a> {
        let root = peep.root();
        let id = self.forms.alloc(Form::Peephole(peep));
        self.peepholes.push(id);
        if let Some(instr) = root.and_then(|name| self.instruction_mut(name)) {
            instr.peepholes.push(id);
        }
        id
    }

    pub fn peepholes(&self) -> impl Iterator<Item = &Peephole<'a>> + '_ {
        self.peepholes
            .iter()
            .filter_map(move |&id| self.forms.get(id)?.as_peephole())
    }

    /// Peepholes rooted at instruction `name`, in declaration order.
    pub fn peepholes_of(&self, name: &str) -> Vec<&Peephole<'a>> {
        self.instruction(name)
            .map(|instr| {
                instr
                    .peepholes
                    .iter()
                    .filter_map(|&id| self.forms.get(id)?.as_peephole())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ----- chain rules -----

    /// File `rule` under operand type `key`. With `dedup`, a rule for a
    /// result already filed there is dropped. Returns whether it was added.
    pub fn add_chain_rule(&mut self, key: &'a str, rule: ChainRule<'a>, dedup: bool) -> bool {
        if !self.chain_rules.contains(key) {
            self.chain_rules.insert(key, Vec::new());
            self.chain_order.add_name(key);
        }
        let Some(list) = self.chain_rules.get_mut(key) else {
            return false;
        };
        if dedup && list.iter().any(|r| r.result == rule.result) {
            return false;
        }
        list.push(rule);
        true
    }

    /// Whether some rule filed under `key` produces `result`.
    pub fn has_chain_rule(&self, key: &str, result: &str) -> bool {
        self.chain_rules(key).iter().any(|r| r.result == result)
    }

    pub fn chain_rules(&self, key: &str) -> &[ChainRule<'a>] {
        self.chain_rules.get(key).map_or(&[], Vec::as_slice)
    }

    /// Operand types with chain rules, in the order first filed.
    pub fn chain_rule_keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.chain_order.iter()
    }

    pub fn num_chain_rules(&self) -> usize {
        self.chain_rules.iter().map(|(_, list)| list.len()).sum()
    }

    // ----- derived tables -----

    pub fn internal_ops(&self) -> &InternalOps<'a> {
        &self.internal_ops
    }

    pub fn internal_ops_mut(&mut self) -> &mut InternalOps<'a> {
        &mut self.internal_ops
    }

    /// Record an `int_def`; a repeated name keeps the first definition.
    pub fn define_int(&mut self, def: IntDef<'a>) -> bool {
        if !self.int_defs.insert_new(def.name, def) {
            return false;
        }
        self.int_def_order.add_name(def.name);
        true
    }

    pub fn int_def(&self, name: &str) -> Option<&IntDef<'a>> {
        self.int_defs.get(name)
    }

    pub fn int_defs(&self) -> impl Iterator<Item = &IntDef<'a>> + '_ {
        self.int_def_order
            .iter()
            .filter_map(move |n| self.int_defs.get(n))
    }

    pub fn set_preproc_defs(&mut self, defs: Dict<'a, &'a str>) {
        self.preproc_defs = defs;
    }

    pub fn preproc_def(&self, name: &str) -> Option<&'a str> {
        self.preproc_defs.lookup(name)
    }

    pub fn preproc_defs(&self) -> &Dict<'a, &'a str> {
        &self.preproc_defs
    }

    pub fn mark_matched_ideal(&mut self, op: &'a str) {
        self.matched_ideal.add_unique(op);
    }

    /// Ideal opcodes named at the root of some match rule.
    pub fn matched_ideal(&self) -> &NameList<'a> {
        &self.matched_ideal
    }

    // ----- components -----

    /// Fill in the component lists of every declared instruction and
    /// operand. Returns the problems found on the way.
    pub fn build_components(&mut self) -> Vec<ModelIssue> {
        let ids: Vec<_> = self.order.iter().collect();
        let mut issues = Vec::new();
        for id in ids {
            let built = match self.forms.get(id) {
                Some(Form::Instruct(instr)) => self.instruct_components(instr, &mut issues),
                Some(Form::Operand(oper)) => self.operand_components(oper),
                _ => continue,
            };
            match self.forms.get_mut(id) {
                Some(Form::Instruct(instr)) => instr.components = built,
                Some(Form::Operand(oper)) => oper.components = built,
                _ => {}
            }
        }
        issues
    }

    fn instruct_components(
        &self,
        instr: &InstructForm<'a>,
        issues: &mut Vec<ModelIssue>,
    ) -> ComponentList<'a> {
        let mut comps = ComponentList::new();
        if let Some(rule) = instr.rule() {
            rule.append_components(self, &mut comps);
        }
        let has_rule = instr.rule().is_some();
        let mut issue = |message: String| {
            issues.push(ModelIssue {
                line: instr.line,
                message,
            })
        };

        let mut has_temp = false;
        let mut kill: Option<(&'a str, &'a str)> = None;
        for name in instr.params.iter() {
            let Some(ty) = instr.locals.lookup(name) else {
                continue;
            };
            let effect = instr.effects.lookup(name);
            if let Some(e) = effect {
                has_temp |= e.is(UseDef::TEMP);
                match kill {
                    Some((kill_ty, kill_name)) if e.isa(UseDef::TEMP) && !e.isa(UseDef::DEF) => {
                        issue(format!(
                            "{}: {} {} must be at the end of the argument list",
                            instr.ident, kill_ty, kill_name
                        ));
                    }
                    _ if e.isa(UseDef::KILL) && !e.isa(UseDef::USE) => kill = Some((ty, name)),
                    _ => {}
                }
            }

            let Some(e) = effect else {
                if comps.search(name).is_none() {
                    comps.insert(name, ty, UseDef::INVALID, false);
                }
                continue;
            };
            match comps.search(name).map(|c| c.usedef) {
                None => {
                    comps.insert(name, ty, e, false);
                    let reg_operand = self.operand(ty).is_some_and(|op| op.is_register());
                    if e.isa(UseDef::USE) && !e.isa(UseDef::TEMP) && has_rule && reg_operand {
                        issue(format!(
                            "{}: illegal USE of non-input: {} {}",
                            instr.ident, ty, name
                        ));
                    }
                }
                // A USE added to a component that is not yet one needs its own slot.
                Some(usedef) if !usedef.isa(UseDef::USE) && e.intersects(UseDef::USE) => {
                    comps.insert(name, ty, e, false);
                }
                Some(_) => {
                    if let Some(comp) = comps.search_mut(name) {
                        comp.usedef |= e;
                    }
                }
            }
        }

        if !has_rule && has_temp {
            issue(format!(
                "{}: TEMPs without match rule isn't supported",
                instr.ident
            ));
        }
        comps
    }

    fn operand_components(&self, oper: &OperandForm<'a>) -> ComponentList<'a> {
        let mut comps = ComponentList::new();
        if let Some(rule) = oper.rules.first() {
            rule.append_components(self, &mut comps);
        }
        for name in oper.params.iter() {
            if comps.search(name).is_none() {
                if let Some(ty) = oper.locals.lookup(name) {
                    comps.insert(name, ty, UseDef::INVALID, false);
                }
            }
        }
        comps
    }
}

impl Default for ArchModel<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArchModel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Architecture model:")?;
        for kind in [
            FormKind::Instruct,
            FormKind::Operand,
            FormKind::OpClass,
            FormKind::Attribute,
            FormKind::Source,
            FormKind::MachNode,
        ] {
            writeln!(f, "  {:<12} {}", kind.name(), self.count(kind))?;
        }
        writeln!(f, "  {:<12} {}", "peephole", self.peepholes.len())?;
        if let Some(regs) = self.registers() {
            writeln!(
                f,
                "  registers    {} ({} reg classes, {} mask words)",
                regs.num_registers(),
                regs.reg_classes().count(),
                regs.reg_mask_words()
            )?;
        }
        if let Some(pipe) = self.pipeline() {
            writeln!(
                f,
                "  pipeline     {} stages, {} resources, {} classes",
                pipe.stages().len(),
                pipe.resource_names().len(),
                pipe.class_count()
            )?;
        }
        if let Some(enc) = self.encode() {
            writeln!(f, "  enc_class    {}", enc.len())?;
        }
        writeln!(
            f,
            "  chain rules  {} under {} operand types",
            self.num_chain_rules(),
            self.chain_order.len()
        )?;
        writeln!(f, "  internal ops {}", self.internal_ops.len())?;
        write!(f, "  int_defs     {}", self.int_def_order.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::forms::Interface;

    #[test]
    fn test_ideal_forms_are_global_but_unordered() {
        let model = ArchModel::new();
        assert!(model.lookup_form("RegI").unwrap().ideal_only());
        assert!(model.lookup_form("AddI").unwrap().as_instruct().is_some());
        assert!(model.lookup_form("ConI").unwrap().as_operand().is_some());
        let sreg = model.operand("sRegI").unwrap();
        assert!(sreg.stack_slots_only());
        assert_eq!(
            model.lookup_form("KILL").unwrap().as_effect().unwrap().usedef,
            UseDef::KILL
        );
        assert_eq!(model.num_forms(), 0);
    }

    #[test]
    fn test_declare_keeps_first() {
        let mut model = ArchModel::new();
        let first = model
            .declare("immI", Form::Operand(OperandForm::new("immI", 3)))
            .unwrap();
        let again = model.declare("immI", Form::Operand(OperandForm::new("immI", 9)));
        assert_eq!(again, Err(first));
        assert_eq!(model.operand("immI").unwrap().line, 3);
        assert_eq!(model.operands().count(), 1);
    }

    #[test]
    fn test_chain_rule_dedup() {
        let mut model = ArchModel::new();
        let rule = ChainRule {
            result: "rRegI",
            cost: "100",
            instruction: "loadConI",
        };
        assert!(model.add_chain_rule("ConI", rule, true));
        assert!(!model.add_chain_rule("ConI", rule, true));
        assert!(model.add_chain_rule("ConI", rule, false));
        assert_eq!(model.chain_rules("ConI").len(), 2);
        assert!(model.has_chain_rule("ConI", "rRegI"));
        assert!(model.chain_rules("immI").is_empty());
        assert_eq!(model.chain_rule_keys().collect::<Vec<_>>(), vec!["ConI"]);
    }

    #[test]
    fn test_components_order_and_kill_check() {
        let mut model = ArchModel::new();
        let mut reg = OperandForm::new("rRegI", 1);
        reg.interface = Some(Interface::Reg);
        model.declare("rRegI", Form::Operand(reg)).unwrap();
        let mut flags = OperandForm::new("rFlagsReg", 2);
        flags.interface = Some(Interface::Reg);
        model.declare("rFlagsReg", Form::Operand(flags)).unwrap();

        let mut instr = InstructForm::new("spill", 10);
        for (name, ty) in [("cr", "rFlagsReg"), ("tmp", "rRegI")] {
            instr.params.add_name(name);
            instr.locals.insert(name, ty);
        }
        instr.effects.insert("cr", UseDef::KILL);
        instr.effects.insert("tmp", UseDef::TEMP);
        model.declare("spill", Form::Instruct(instr)).unwrap();

        let issues = model.build_components();
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "spill: rFlagsReg cr must be at the end of the argument list",
                "spill: TEMPs without match rule isn't supported",
            ]
        );
        let comps = &model.instruction("spill").unwrap().components;
        assert_eq!(comps.len(), 2);
        assert_eq!(comps.match_count(), 0);
        assert_eq!(comps.search("cr").unwrap().usedef, UseDef::KILL);
    }

    #[test]
    fn test_int_defs_and_matched_ideal() {
        let mut model = ArchModel::new();
        let def = IntDef {
            name: "DEFAULT_COST",
            value: 100,
            description: None,
        };
        assert!(model.define_int(def));
        assert!(!model.define_int(IntDef { value: 7, ..def }));
        assert_eq!(model.int_def("DEFAULT_COST").unwrap().value, 100);

        model.mark_matched_ideal("AddI");
        model.mark_matched_ideal("AddI");
        assert_eq!(model.matched_ideal().len(), 1);
    }
}
