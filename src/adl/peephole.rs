// Peephole rules rewrite a short window of already-allocated instructions. A rule has three
// parts parsed in order: the match, a flat pre-order list of instruction nodes where every
// entry remembers its parent entry, its own position and the input slot it feeds; the
// constraints, relations between operands of matched instructions or between an operand and
// a fixed register; and the replacement, one instruction whose operands are picked from the
// matched instructions by position. A subtree written without an instruction name is kept as
// a placeholder entry so positions stay aligned with the written tree.

//! Peephole match, constraint and replacement records.

/// One node of a peephole match tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeepMatchEntry<'a> {
    /// Position of the parent entry; -1 for the root.
    pub parent: i32,
    pub position: usize,
    /// Instruction name, `None` for an unnamed subtree.
    pub instruction: Option<&'a str>,
    /// Input slot in the parent.
    pub input: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeepMatch<'a> {
    entries: Vec<PeepMatchEntry<'a>>,
    max_position: usize,
}

impl<'a> PeepMatch<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instruction(
        &mut self,
        parent: i32,
        position: usize,
        instruction: Option<&'a str>,
        input: usize,
    ) {
        self.max_position = self.max_position.max(position);
        self.entries.push(PeepMatchEntry {
            parent,
            position,
            instruction,
            input,
        });
    }

    pub fn entries(&self) -> &[PeepMatchEntry<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_position(&self) -> usize {
        self.max_position
    }

    /// Instruction at the root of the match.
    pub fn root(&self) -> Option<&'a str> {
        self.entries.first().and_then(|e| e.instruction)
    }

    /// Instruction matched at `position`.
    pub fn instruction_at(&self, position: usize) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|e| e.position == position)
            .and_then(|e| e.instruction)
    }
}

/// `left_inst.left_op REL right_inst.right_op`. A register on the right
/// side has `right_inst == -1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeepConstraint<'a> {
    pub left_inst: i64,
    pub left_op: &'a str,
    pub relation: &'a str,
    pub right_inst: i64,
    pub right_op: &'a str,
}

impl PeepConstraint<'_> {
    pub fn is_register_constraint(&self) -> bool {
        self.right_inst == -1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeepReplace<'a> {
    pub instruction: &'a str,
    /// `(matched instruction number, operand name)` per replacement operand.
    pub operands: Vec<(i64, &'a str)>,
}

impl<'a> PeepReplace<'a> {
    pub fn new(instruction: &'a str) -> Self {
        Self {
            instruction,
            operands: Vec::new(),
        }
    }

    pub fn add_operand(&mut self, inst_num: i64, op: &'a str) {
        self.operands.push((inst_num, op));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peephole<'a> {
    /// Declaration number, starting at 0.
    pub number: usize,
    pub line: usize,
    pub matches: Option<PeepMatch<'a>>,
    pub constraints: Vec<PeepConstraint<'a>>,
    pub replace: Option<PeepReplace<'a>>,
}

impl<'a> Peephole<'a> {
    pub fn new(number: usize, line: usize) -> Self {
        Self {
            number,
            line,
            ..Self::default()
        }
    }

    /// Instruction the rule is attached to.
    pub fn root(&self) -> Option<&'a str> {
        self.matches.as_ref().and_then(PeepMatch::root)
    }

    /// A usable rule has a match and a replacement.
    pub fn is_complete(&self) -> bool {
        self.matches.is_some() && self.replace.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_positions() {
        // (incI_rReg (movI movI))
        let mut m = PeepMatch::new();
        m.add_instruction(-1, 0, Some("incI_rReg"), 0);
        m.add_instruction(0, 1, Some("movI"), 0);
        m.add_instruction(0, 2, None, 1);

        assert_eq!(m.root(), Some("incI_rReg"));
        assert_eq!(m.instruction_at(1), Some("movI"));
        assert_eq!(m.instruction_at(2), None);
        assert_eq!(m.max_position(), 2);
        assert_eq!(m.entries()[1].parent, 0);
    }

    #[test]
    fn test_peephole_completeness() {
        let mut peep = Peephole::new(0, 12);
        assert!(!peep.is_complete());
        let mut m = PeepMatch::new();
        m.add_instruction(-1, 0, Some("addI"), 0);
        peep.matches = Some(m);
        let mut replace = PeepReplace::new("leaI");
        replace.add_operand(0, "dst");
        peep.replace = Some(replace);
        assert!(peep.is_complete());
        assert_eq!(peep.root(), Some("addI"));

        let c = PeepConstraint {
            left_inst: 0,
            left_op: "dst",
            relation: "==",
            right_inst: -1,
            right_op: "RAX",
        };
        assert!(c.is_register_constraint());
    }
}
