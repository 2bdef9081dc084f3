// This module provides the ordered containers of the form model. NameList is an append-only
// sequence of interned names whose order is visible in later generated enumerations (operand
// parameters, register class members, pipeline stages, opcode fields). Segment is the element
// type of mixed sequences such as format strings and encode bodies, where literal text is
// interleaved with replacement variables; a tagged variant replaces the sentinel markers that
// would otherwise be multiplexed into one name list. FormList is the global ownership order of
// every top-level form; iterating it never disturbs another iteration, so passes may nest.

//! Insertion-ordered containers.

use std::slice;

/// Append-only ordered list of interned names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList<'a> {
    names: Vec<&'a str>,
}

impl<'a> NameList<'a> {
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    pub fn add_name(&mut self, name: &'a str) {
        self.names.push(name);
    }

    /// Add `name` unless it is already present.
    pub fn add_unique(&mut self, name: &'a str) -> bool {
        if self.search(name) {
            return false;
        }
        self.names.push(name);
        true
    }

    pub fn search(&self, name: &str) -> bool {
        self.names.iter().any(|n| *n == name)
    }

    /// Position of `name`, if present.
    pub fn index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| *n == name)
    }

    pub fn get(&self, i: usize) -> Option<&'a str> {
        self.names.get(i).copied()
    }

    pub fn first(&self) -> Option<&'a str> {
        self.names.first().copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.names.iter().copied()
    }

    pub fn as_slice(&self) -> &[&'a str] {
        &self.names
    }
}

impl<'a> FromIterator<&'a str> for NameList<'a> {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// One element of a format string or encode body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text.
    Text(&'a str),
    /// `$name` replacement variable.
    RepVar(&'a str),
    /// Literal text inside a `$$template` body.
    TemplateText(&'a str),
    /// `$name` inside a `$$template` body.
    TemplateRepVar(&'a str),
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match *self {
            Segment::Text(s)
            | Segment::RepVar(s)
            | Segment::TemplateText(s)
            | Segment::TemplateRepVar(s) => s,
        }
    }

    pub fn is_rep_var(&self) -> bool {
        matches!(self, Segment::RepVar(_) | Segment::TemplateRepVar(_))
    }
}

/// Ordered list of form handles.
#[derive(Debug, Clone)]
pub struct FormList<H> {
    items: Vec<H>,
}

impl<H: Copy> FormList<H> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: H) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<H> {
        self.items.get(i).copied()
    }

    pub fn iter(&self) -> std::iter::Copied<slice::Iter<'_, H>> {
        self.items.iter().copied()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<H: Copy> Default for FormList<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_list_order_and_search() {
        let mut list = NameList::new();
        list.add_name("RAX");
        list.add_name("RBX");
        assert!(!list.add_unique("RAX"));
        assert!(list.add_unique("RCX"));

        assert_eq!(list.len(), 3);
        assert_eq!(list.index("RBX"), Some(1));
        assert_eq!(list.index("RDX"), None);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["RAX", "RBX", "RCX"]);
    }

    #[test]
    fn test_nested_form_list_iteration() {
        let mut list = FormList::new();
        list.push(1u32);
        list.push(2);

        let mut pairs = Vec::new();
        for a in list.iter() {
            for b in list.iter() {
                pairs.push((a, b));
            }
        }
        assert_eq!(pairs, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_segment_tags() {
        let seg = Segment::RepVar("dst");
        assert!(seg.is_rep_var());
        assert_eq!(seg.text(), "dst");
        assert!(!Segment::Text("add ").is_rep_var());
    }
}
