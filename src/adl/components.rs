// This module models the operand components of an instruction or operand: every formal
// parameter that takes part in the generated machine node, tagged with how the node uses it.
// Use/def information is a small bit set (USE, DEF, KILL, TEMP, CALL and their combinations)
// because effects on the same parameter accumulate. A ComponentList keeps the components in
// operand order: those found in the match rule first (their count is the match count), then
// parameters that only appear in effect lists or not at all. Operand positions leave slot 0
// for the result when the first component does not define it, and only the first USE_DEF
// component occupies two slots.

//! Use/def components of instructions and operands.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Use/def/kill bit set of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UseDef(u32);

impl UseDef {
    pub const INVALID: UseDef = UseDef(0);
    pub const USE: UseDef = UseDef(1);
    pub const DEF: UseDef = UseDef(2);
    pub const USE_DEF: UseDef = UseDef(3);
    pub const KILL: UseDef = UseDef(4);
    pub const USE_KILL: UseDef = UseDef(5);
    pub const TEMP: UseDef = UseDef(Self::USE.0 | 128);
    pub const TEMP_DEF: UseDef = UseDef(Self::TEMP.0 | Self::DEF.0);
    pub const CALL: UseDef = UseDef(256);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Parse an effect keyword.
    pub fn from_name(name: &str) -> Option<UseDef> {
        Some(match name {
            "USE" => Self::USE,
            "DEF" => Self::DEF,
            "USE_DEF" => Self::USE_DEF,
            "KILL" => Self::KILL,
            "USE_KILL" => Self::USE_KILL,
            "TEMP" => Self::TEMP,
            "TEMP_DEF" => Self::TEMP_DEF,
            "CALL" => Self::CALL,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::INVALID => "INVALID",
            Self::USE => "USE",
            Self::DEF => "DEF",
            Self::USE_DEF => "USE_DEF",
            Self::KILL => "KILL",
            Self::USE_KILL => "USE_KILL",
            Self::TEMP => "TEMP",
            Self::TEMP_DEF => "TEMP_DEF",
            Self::CALL => "CALL",
            _ => "Undefined Use/Def info",
        }
    }

    /// Every bit of `other` is set. `INVALID` is contained in anything.
    pub fn isa(self, other: UseDef) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is(self, other: UseDef) -> bool {
        self == other
    }

    /// At least one bit in common.
    pub fn intersects(self, other: UseDef) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for UseDef {
    type Output = UseDef;

    fn bitor(self, rhs: UseDef) -> UseDef {
        UseDef(self.0 | rhs.0)
    }
}

impl BitOrAssign for UseDef {
    fn bitor_assign(&mut self, rhs: UseDef) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for UseDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component<'a> {
    pub name: &'a str,
    pub ty: &'a str,
    pub usedef: UseDef,
}

impl<'a> Component<'a> {
    pub fn isa(&self, usedef: UseDef) -> bool {
        self.usedef.isa(usedef)
    }
}

/// Components in operand order, match-rule components first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentList<'a> {
    items: Vec<Component<'a>>,
    match_count: usize,
}

impl<'a> ComponentList<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a component; `from_match` counts it toward the match count.
    pub fn insert(&mut self, name: &'a str, ty: &'a str, usedef: UseDef, from_match: bool) {
        self.items.push(Component { name, ty, usedef });
        if from_match {
            self.match_count += 1;
        }
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Component<'a>> {
        self.items.get(i)
    }

    /// First component named `name`.
    pub fn search(&self, name: &str) -> Option<&Component<'a>> {
        self.items.iter().find(|c| c.name == name)
    }

    pub fn search_mut(&mut self, name: &str) -> Option<&mut Component<'a>> {
        self.items.iter_mut().find(|c| c.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component<'a>> {
        self.items.iter()
    }

    /// Components that came from the match rule.
    pub fn match_iter(&self) -> impl Iterator<Item = &Component<'a>> + '_ {
        self.items.iter().take(self.match_count)
    }

    /// Components added after the match rule components.
    pub fn post_match_iter(&self) -> impl Iterator<Item = &Component<'a>> + '_ {
        self.items.iter().skip(self.match_count)
    }

    /// Number of USE operands plus one slot for the result.
    pub fn num_operands(&self) -> usize {
        1 + self
            .items
            .iter()
            .enumerate()
            .filter(|(i, c)| c.isa(UseDef::USE) || (*i == 0 && !c.isa(UseDef::DEF)))
            .count()
    }

    /// Operand position of `name`, whatever its use/def flags.
    pub fn operand_position(&self, name: &str) -> Option<usize> {
        let mut position = 0;
        for comp in &self.items {
            if position == 0 && !comp.isa(UseDef::DEF) {
                position += 1;
            }
            if comp.name == name {
                return Some(position);
            }
            // Only the first USE_DEF takes two slots.
            if comp.isa(UseDef::USE_DEF) && position == 0 {
                position += 1;
            }
            position += 1;
        }
        None
    }

    /// Operand position of `name` used as `usedef`. A leading USE_DEF
    /// component answers a USE query with its input slot.
    pub fn operand_position_usedef(&self, name: &str, usedef: UseDef) -> Option<usize> {
        let mut position = 0;
        for comp in &self.items {
            if position == 0 && !comp.isa(UseDef::DEF) {
                position += 1;
            }
            if comp.name == name && comp.isa(usedef) {
                if position == 0 && usedef == UseDef::USE && comp.isa(UseDef::DEF) {
                    return Some(1);
                }
                return Some(position);
            }
            if comp.isa(UseDef::USE_DEF) && position == 0 {
                position += 1;
            }
            position += 1;
        }
        None
    }

    /// Position of the first component of type `label`.
    pub fn label_position(&self) -> Option<usize> {
        self.position_of_type("label")
    }

    /// Position of the first component of type `method`.
    pub fn method_position(&self) -> Option<usize> {
        self.position_of_type("method")
    }

    fn position_of_type(&self, ty: &str) -> Option<usize> {
        self.items
            .iter()
            .find(|c| c.ty == ty)
            .and_then(|c| self.operand_position(c.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usedef_algebra() {
        assert!(UseDef::USE_DEF.isa(UseDef::USE));
        assert!(UseDef::USE_DEF.isa(UseDef::DEF));
        assert!(UseDef::TEMP.isa(UseDef::USE));
        assert!(!UseDef::TEMP.is(UseDef::USE));
        assert!(UseDef::KILL.isa(UseDef::INVALID));

        let mut ud = UseDef::USE;
        ud |= UseDef::KILL;
        assert_eq!(ud, UseDef::USE_KILL);
        assert_eq!(UseDef::from_name("TEMP_DEF"), Some(UseDef::TEMP_DEF));
        assert_eq!(UseDef::from_name("READ"), None);
        assert_eq!(UseDef::CALL.name(), "CALL");
    }

    #[test]
    fn test_positions_leave_room_for_result() {
        let mut list = ComponentList::new();
        list.insert("src1", "rRegI", UseDef::USE, true);
        list.insert("src2", "rRegI", UseDef::USE, true);
        list.insert("cr", "rFlagsReg", UseDef::KILL, false);

        assert_eq!(list.match_count(), 2);
        assert_eq!(list.operand_position("src1"), Some(1));
        assert_eq!(list.operand_position("src2"), Some(2));
        assert_eq!(list.operand_position("cr"), Some(3));
        assert_eq!(list.operand_position("missing"), None);
        assert_eq!(list.num_operands(), 3);
    }

    #[test]
    fn test_leading_use_def_takes_two_slots() {
        let mut list = ComponentList::new();
        list.insert("dst", "rRegI", UseDef::USE_DEF, true);
        list.insert("src", "rRegI", UseDef::USE, true);

        assert_eq!(list.operand_position("dst"), Some(0));
        assert_eq!(list.operand_position_usedef("dst", UseDef::USE), Some(1));
        assert_eq!(list.operand_position("src"), Some(2));
    }

    #[test]
    fn test_match_and_post_match_iteration() {
        let mut list = ComponentList::new();
        list.insert("dst", "rRegI", UseDef::DEF, true);
        list.insert("src", "rRegI", UseDef::USE, true);
        list.insert("tmp", "rRegI", UseDef::TEMP, false);

        let matched: Vec<_> = list.match_iter().map(|c| c.name).collect();
        let rest: Vec<_> = list.post_match_iter().map(|c| c.name).collect();
        assert_eq!(matched, vec!["dst", "src"]);
        assert_eq!(rest, vec!["tmp"]);
        assert_eq!(list.operand_position("src"), Some(1));
    }
}
