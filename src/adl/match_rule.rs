// This module implements the match-rule trees of instructions and operands. A match rule is
// an owned binary tree whose interior nodes name an ideal operation and whose leaves name a
// local operand; every interior subtree below the root is reduced to an internal operand
// whose name spells the subtree out (`_AddI_rRegI_memory`), registered once in the model so
// identical subtrees share a name. The tree also answers the structural questions the
// derivations need: whether it describes a control instruction, which leaves are base
// operands (following user operands into their own match rules), and which commutative
// operations with a subtree operand may have their children swapped. Swapped clones are
// whole copies of the rule; the numbering of commutative sites is stable across copies.

//! Match-rule trees and commutative-operand cloning.

use std::fmt;

use crate::adl::components::{ComponentList, UseDef};
use crate::adl::ideal;
use crate::adl::model::ArchModel;
use crate::core::{AdlSession, Dict, NameList};

/// Upper bound on match rules derived from a single instruction.
pub const MAX_MATCH_RULE_CLONES: u32 = 100;

/// Registry of internal operand names built from match subtrees.
#[derive(Debug, Default)]
pub struct InternalOps<'a> {
    names: NameList<'a>,
    known: Dict<'a, ()>,
}

impl<'a> InternalOps<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interned name for `subtree`, registering it on first sight.
    pub fn intern(&mut self, session: &AdlSession<'a>, subtree: &str) -> &'a str {
        let name = session.intern(subtree);
        if self.known.insert_new(name, ()) {
            self.names.add_name(name);
        }
        name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub fn names(&self) -> &NameList<'a> {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A base operand found in a match tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseOperand<'a> {
    pub result: Option<&'a str>,
    pub name: Option<&'a str>,
    pub op_type: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchNode<'a> {
    /// Type produced by this node: the operand type of a leaf, the
    /// internal operand of a reduced subtree.
    pub result: Option<&'a str>,
    /// Local name of a leaf, or the operation token of an interior node.
    pub name: Option<&'a str>,
    pub op_type: &'a str,
    pub internal_op: Option<&'a str>,
    pub left: Option<Box<MatchNode<'a>>>,
    pub right: Option<Box<MatchNode<'a>>>,
    /// Pre-order number of a swappable commutative site, 0 when none.
    pub commutative_id: u32,
}

impl<'a> MatchNode<'a> {
    pub fn new(
        result: Option<&'a str>,
        name: Option<&'a str>,
        op_type: &'a str,
        left: Option<Box<MatchNode<'a>>>,
        right: Option<Box<MatchNode<'a>>>,
    ) -> Self {
        Self {
            result,
            name,
            op_type,
            internal_op: None,
            left,
            right,
            commutative_id: 0,
        }
    }

    pub fn leaf(ty: &'a str, name: &'a str) -> Self {
        Self::new(Some(ty), Some(name), ty, None, None)
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Name this subtree after its operation and children and register it.
    pub fn build_internal_op(&mut self, session: &AdlSession<'a>, ops: &mut InternalOps<'a>) {
        let child = |c: &Option<Box<MatchNode<'a>>>| {
            c.as_ref()
                .map(|n| n.internal_op.unwrap_or(n.op_type))
                .unwrap_or("")
        };
        let subtree = format!("_{}_{}_{}", self.op_type, child(&self.left), child(&self.right));
        let iop = ops.intern(session, &subtree);
        self.internal_op = Some(iop);
        self.result = Some(iop);
    }

    /// Post-order search for `ty`; `position` counts the nodes passed.
    pub fn find_type(&self, ty: &str, position: &mut usize) -> bool {
        if self.left.as_ref().is_some_and(|l| l.find_type(ty, position)) {
            return true;
        }
        if self.right.as_ref().is_some_and(|r| r.find_type(ty, position)) {
            return true;
        }
        if self.op_type == ty {
            return true;
        }
        *position += 1;
        false
    }

    pub fn contains_type(&self, ty: &str) -> bool {
        let mut position = 0;
        self.find_type(ty, &mut position)
    }

    /// Number commutative sites in pre-order, starting after `count`.
    pub fn count_commutative(&mut self, model: &ArchModel<'a>, count: &mut u32) {
        if let (Some(left), Some(right)) = (&self.left, &self.right) {
            if left.left.is_some() || right.left.is_some() {
                let constant_right = right.is_leaf()
                    && model
                        .lookup_form(right.op_type)
                        .and_then(|f| f.as_operand())
                        .is_some_and(|op| op.is_constant());
                if !constant_right && ideal::is_commutative(self.op_type) {
                    *count += 1;
                    self.commutative_id = *count;
                }
            }
        }
        if let Some(left) = self.left.as_mut() {
            left.count_commutative(model, count);
        }
        if let Some(right) = self.right.as_mut() {
            right.count_commutative(model, count);
        }
    }

    /// Swap the children of site `id` and rename every reduced subtree.
    pub fn swap_commutative(
        &mut self,
        at_root: bool,
        id: u32,
        session: &AdlSession<'a>,
        ops: &mut InternalOps<'a>,
    ) {
        if self.commutative_id == id {
            std::mem::swap(&mut self.left, &mut self.right);
        }
        let is_set = self.op_type == "Set";
        if let Some(left) = self.left.as_mut() {
            left.swap_commutative(is_set, id, session, ops);
        }
        if let Some(right) = self.right.as_mut() {
            right.swap_commutative(is_set, id, session, ops);
        }
        if !at_root && !self.is_leaf() {
            self.build_internal_op(session, ops);
        }
    }

    /// The `position`-th base operand of this tree, following user
    /// operands and instructions into their own match rules.
    pub fn base_operand(&self, position: &mut usize, model: &ArchModel<'a>) -> Option<BaseOperand<'a>> {
        if !self.is_leaf() {
            if let Some(found) = self.left.as_ref().and_then(|l| l.base_operand(position, model)) {
                return Some(found);
            }
            return self.right.as_ref().and_then(|r| r.base_operand(position, model));
        }

        let this = BaseOperand {
            result: self.result,
            name: self.name,
            op_type: self.op_type,
        };
        if self.op_type != "Universe" && self.op_type != "label" {
            let nested = model.lookup_form(self.op_type).and_then(|form| {
                form.as_operand()
                    .and_then(|op| op.rules.first())
                    .or_else(|| form.as_instruct().and_then(|i| i.rules.first()))
            });
            if let Some(rule) = nested {
                return rule.root.base_operand(position, model);
            }
        }
        if *position == 0 {
            Some(this)
        } else {
            *position -= 1;
            None
        }
    }

    /// Collect the leaves that name user operands. The left child of a
    /// `Set` is the defined operand.
    pub fn append_components(
        &self,
        model: &ArchModel<'a>,
        components: &mut ComponentList<'a>,
        def_flag: bool,
    ) {
        if self.is_leaf() {
            let usedef = if def_flag { UseDef::DEF } else { UseDef::USE };
            let user_operand = model
                .lookup_form(self.op_type)
                .is_some_and(|f| !f.ideal_only() && f.is_opclass());
            if let (true, Some(name)) = (user_operand, self.name) {
                components.insert(name, self.op_type, usedef, true);
            }
            return;
        }
        let is_set = self.op_type == "Set";
        if let Some(left) = &self.left {
            left.append_components(model, components, is_set);
        }
        if let Some(right) = &self.right {
            right.append_components(model, components, false);
        }
    }
}

impl fmt::Display for MatchNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.unwrap_or(self.op_type);
        if self.is_leaf() {
            return write!(f, " {}", name);
        }
        write!(f, " ({}", name)?;
        if let Some(left) = &self.left {
            write!(f, "{}", left)?;
        }
        if let Some(right) = &self.right {
            write!(f, "{}", right)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRule<'a> {
    pub root: MatchNode<'a>,
    /// Deepest parenthesis nesting.
    pub depth: usize,
    pub num_leaves: usize,
    pub num_children: usize,
    /// Optional `%{ %}` constructor following the rule.
    pub construct: Option<&'a str>,
}

impl<'a> MatchRule<'a> {
    pub fn new(root: MatchNode<'a>, depth: usize, num_leaves: usize, construct: Option<&'a str>) -> Self {
        let num_children = root.left.is_some() as usize + root.right.is_some() as usize;
        Self {
            root,
            depth,
            num_leaves,
            num_children,
            construct,
        }
    }

    /// Name of the value this rule produces; clones carry their own name.
    pub fn result(&self) -> Option<&'a str> {
        self.root.result
    }

    pub fn set_result(&mut self, result: &'a str) {
        self.root.result = Some(result);
    }

    pub fn op_type(&self) -> &'a str {
        self.root.op_type
    }

    pub fn left(&self) -> Option<&MatchNode<'a>> {
        self.root.left.as_deref()
    }

    pub fn right(&self) -> Option<&MatchNode<'a>> {
        self.root.right.as_deref()
    }

    pub fn is_ideal_return(&self) -> bool {
        ["Return", "Rethrow", "TailCall", "TailJump"]
            .iter()
            .any(|op| self.root.contains_type(op))
    }

    pub fn is_ideal_branch(&self) -> bool {
        matches!(self.op_type(), "If" | "CountedLoopEnd" | "Goto")
    }

    pub fn is_ideal_jump(&self) -> bool {
        self.op_type() == "Jump"
    }

    pub fn is_ideal_halt(&self) -> bool {
        self.root.contains_type("Halt")
    }

    /// Control instructions produce `Universe` and take a single rule.
    pub fn is_ideal_control(&self) -> bool {
        self.is_ideal_return() || self.is_ideal_branch() || self.is_ideal_jump() || self.is_ideal_halt()
    }

    /// Number the swappable commutative sites; returns their count.
    pub fn count_commutative(&mut self, model: &ArchModel<'a>) -> u32 {
        let mut count = 0;
        self.root.count_commutative(model, &mut count);
        count
    }

    /// Copy of this rule with site `id` swapped.
    pub fn swapped(&self, id: u32, session: &AdlSession<'a>, ops: &mut InternalOps<'a>) -> Self {
        let mut clone = self.clone();
        clone.root.swap_commutative(true, id, session, ops);
        clone
    }

    pub fn append_components(&self, model: &ArchModel<'a>, components: &mut ComponentList<'a>) {
        self.root.append_components(model, components, false);
    }
}

impl fmt::Display for MatchRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Clone naming ran past [`MAX_MATCH_RULE_CLONES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooManyClones;

/// Next clone name `<ident>_<n>`.
pub fn next_clone_name<'a>(
    session: &AdlSession<'a>,
    ident: &str,
    counter: &mut u32,
) -> Result<&'a str, TooManyClones> {
    if *counter >= MAX_MATCH_RULE_CLONES {
        return Err(TooManyClones);
    }
    let name = session.intern(&format!("{}_{}", ident, counter));
    *counter += 1;
    Ok(name)
}

/// Insert swapped clones of `rules[index]` for commutative sites
/// `1..=count`, each right after the rule it was derived from. Returns
/// the number of rules inserted.
pub fn expand_commutative<'a>(
    rules: &mut Vec<MatchRule<'a>>,
    index: usize,
    count: u32,
    ident: &str,
    counter: &mut u32,
    session: &AdlSession<'a>,
    ops: &mut InternalOps<'a>,
) -> Result<usize, TooManyClones> {
    let name = next_clone_name(session, ident, counter)?;
    let mut clone = rules[index].swapped(count, session, ops);
    clone.set_result(name);
    rules.insert(index + 1, clone);
    session.record_commutative_clone();

    let mut inserted = 1;
    if count > 1 {
        let below = expand_commutative(rules, index, count - 1, ident, counter, session, ops)?;
        let clone_index = index + 1 + below;
        let beside = expand_commutative(rules, clone_index, count - 1, ident, counter, session, ops)?;
        inserted += below + beside;
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionConfig;
    use bumpalo::Bump;

    fn node<'a>(op: &'a str, left: MatchNode<'a>, right: MatchNode<'a>) -> MatchNode<'a> {
        MatchNode::new(None, Some(op), op, Some(Box::new(left)), Some(Box::new(right)))
    }

    /// (Set dst (AddI (LoadI mem) src))
    fn add_load_rule<'a>(session: &AdlSession<'a>, ops: &mut InternalOps<'a>) -> MatchRule<'a> {
        let mut load = MatchNode::new(
            None,
            Some("LoadI"),
            "LoadI",
            Some(Box::new(MatchNode::leaf("memory", "mem"))),
            None,
        );
        load.build_internal_op(session, ops);
        // Children of Set are not reduced.
        let add = node("AddI", load, MatchNode::leaf("rRegI", "src"));
        let set = node("Set", MatchNode::leaf("rRegI", "dst"), add);
        MatchRule::new(set, 2, 3, None)
    }

    #[test]
    fn test_internal_op_names_spell_subtree() {
        let arena = Bump::new();
        let session = AdlSession::new(&arena, SessionConfig::default());
        let mut ops = InternalOps::new();
        let rule = add_load_rule(&session, &mut ops);

        let add = rule.right().unwrap();
        assert_eq!(add.internal_op, None);
        assert_eq!(add.left.as_ref().unwrap().internal_op, Some("_LoadI_memory_"));
        assert_eq!(ops.len(), 1);
        assert_eq!(rule.to_string(), " (Set dst (AddI (LoadI mem) src))");
    }

    #[test]
    fn test_commutative_clone_swaps_children() {
        let arena = Bump::new();
        let session = AdlSession::new(&arena, SessionConfig::default());
        let model = ArchModel::new();
        let mut ops = InternalOps::new();

        let mut rules = vec![add_load_rule(&session, &mut ops)];
        let count = rules[0].count_commutative(&model);
        assert_eq!(count, 1);

        let mut counter = 0;
        let inserted =
            expand_commutative(&mut rules, 0, count, "addI_mem", &mut counter, &session, &mut ops)
                .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].result(), Some("addI_mem_0"));
        assert_eq!(rules[1].to_string(), " (Set dst (AddI src (LoadI mem)))");
        let swapped = rules[1].right().unwrap();
        assert_eq!(swapped.right.as_ref().unwrap().internal_op, Some("_LoadI_memory_"));
        assert_eq!(ops.len(), 1);
        assert_eq!(session.stats().commutative_clones, 1);
    }

    #[test]
    fn test_two_sites_yield_three_clones() {
        let arena = Bump::new();
        let session = AdlSession::new(&arena, SessionConfig::default());
        let model = ArchModel::new();
        let mut ops = InternalOps::new();

        // (Set dst (AddI (AddI (LoadI m) a) b))
        let load = MatchNode::new(
            None,
            Some("LoadI"),
            "LoadI",
            Some(Box::new(MatchNode::leaf("memory", "m"))),
            None,
        );
        let inner = node("AddI", load, MatchNode::leaf("rRegI", "a"));
        let outer = node("AddI", inner, MatchNode::leaf("rRegI", "b"));
        let set = node("Set", MatchNode::leaf("rRegI", "dst"), outer);
        let mut rules = vec![MatchRule::new(set, 3, 4, None)];

        let count = rules[0].count_commutative(&model);
        assert_eq!(count, 2);
        let mut counter = 0;
        let inserted =
            expand_commutative(&mut rules, 0, count, "add3", &mut counter, &session, &mut ops)
                .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(counter, 3);
        let names: Vec<_> = rules.iter().map(|r| r.result()).collect();
        assert_eq!(names, vec![None, Some("add3_1"), Some("add3_0"), Some("add3_2")]);
    }

    #[test]
    fn test_clone_limit() {
        let arena = Bump::new();
        let session = AdlSession::new(&arena, SessionConfig::default());
        let mut counter = MAX_MATCH_RULE_CLONES;
        assert_eq!(next_clone_name(&session, "x", &mut counter), Err(TooManyClones));
    }

    #[test]
    fn test_control_detection() {
        let ret = MatchNode::new(None, Some("Return"), "Return", None, None);
        let rule = MatchRule::new(ret, 0, 0, None);
        assert!(rule.is_ideal_control());
        assert!(rule.is_ideal_return());

        let goto = MatchNode::new(None, Some("Goto"), "Goto", None, None);
        assert!(MatchRule::new(goto, 0, 0, None).is_ideal_branch());
    }
}
