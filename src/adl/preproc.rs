// This module holds the conditional-compilation state of the description scanner. Each
// #ifdef/#ifndef/#if opens a frame that records whether its branch is taken and whether an
// #else was already seen; a counter of untaken frames makes "are we inside skipped text" an
// O(1) question for the whitespace skipper. Nesting is bounded; exceeding the bound is the
// one preprocessor condition that aborts the whole session. The symbol table of #define and
// command-line definitions lives here too and survives into the produced model.

//! Conditional-compilation frames and preprocessor symbols.

use crate::core::Dict;

/// Deepest supported `#ifdef` nesting.
pub const MAX_NESTING: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocError {
    TooDeep,
    MultipleElse,
    ElseWithoutIf,
    EndifWithoutIf,
}

impl PreprocError {
    pub fn message(self) -> &'static str {
        match self {
            PreprocError::TooDeep => "#ifdef nesting too deep",
            PreprocError::MultipleElse => "multiple #else lines",
            PreprocError::ElseWithoutIf => "#else without #ifdef",
            PreprocError::EndifWithoutIf => "#endif without #ifdef",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IfFrame {
    taken: bool,
    else_seen: bool,
}

#[derive(Debug, Default)]
pub struct Preprocessor<'a> {
    frames: Vec<IfFrame>,
    not_taken: usize,
    defines: Dict<'a, &'a str>,
}

impl<'a> Preprocessor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when text at this point is compiled.
    pub fn is_taken(&self) -> bool {
        self.not_taken == 0
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn begin_if(&mut self, taken: bool) -> Result<(), PreprocError> {
        if self.frames.len() >= MAX_NESTING {
            return Err(PreprocError::TooDeep);
        }
        self.frames.push(IfFrame {
            taken,
            else_seen: false,
        });
        if !taken {
            self.not_taken += 1;
        }
        Ok(())
    }

    pub fn invert(&mut self) -> Result<(), PreprocError> {
        let frame = self.frames.last_mut().ok_or(PreprocError::ElseWithoutIf)?;
        if frame.else_seen {
            return Err(PreprocError::MultipleElse);
        }
        frame.else_seen = true;
        if !frame.taken {
            self.not_taken -= 1;
        }
        frame.taken = !frame.taken;
        if !frame.taken {
            self.not_taken += 1;
        }
        Ok(())
    }

    pub fn end(&mut self) -> Result<(), PreprocError> {
        let frame = self.frames.pop().ok_or(PreprocError::EndifWithoutIf)?;
        if !frame.taken {
            self.not_taken -= 1;
        }
        Ok(())
    }

    pub fn define(&mut self, name: &'a str, value: &'a str) {
        self.defines.insert(name, value);
    }

    pub fn undefine(&mut self, name: &str) {
        self.defines.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.defines.lookup(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.contains(name)
    }

    pub fn defines(&self) -> &Dict<'a, &'a str> {
        &self.defines
    }

    pub fn take_defines(&mut self) -> Dict<'a, &'a str> {
        std::mem::take(&mut self.defines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_else_restores_outer_state() {
        let mut pp = Preprocessor::new();
        pp.begin_if(false).unwrap();
        assert!(!pp.is_taken());
        pp.begin_if(true).unwrap();
        assert!(!pp.is_taken());
        pp.end().unwrap();
        pp.invert().unwrap();
        assert!(pp.is_taken());
        pp.end().unwrap();
        assert!(pp.is_taken());
        assert_eq!(pp.depth(), 0);
    }

    #[test]
    fn test_untaken_inner_else_stays_skipped() {
        let mut pp = Preprocessor::new();
        pp.begin_if(false).unwrap();
        // A nested #ifdef inside skipped text is never taken.
        pp.begin_if(false).unwrap();
        pp.invert().unwrap();
        assert!(!pp.is_taken());
        pp.end().unwrap();
        pp.end().unwrap();
        assert!(pp.is_taken());
    }

    #[test]
    fn test_frame_errors() {
        let mut pp = Preprocessor::new();
        assert_eq!(pp.invert(), Err(PreprocError::ElseWithoutIf));
        assert_eq!(pp.end(), Err(PreprocError::EndifWithoutIf));

        pp.begin_if(true).unwrap();
        pp.invert().unwrap();
        assert_eq!(pp.invert(), Err(PreprocError::MultipleElse));
    }

    #[test]
    fn test_nesting_limit() {
        let mut pp = Preprocessor::new();
        for _ in 0..MAX_NESTING {
            pp.begin_if(true).unwrap();
        }
        assert_eq!(pp.begin_if(true), Err(PreprocError::TooDeep));
    }

    #[test]
    fn test_defines() {
        let mut pp = Preprocessor::new();
        pp.define("_LP64", "1");
        assert_eq!(pp.get("_LP64"), Some("1"));
        pp.undefine("_LP64");
        assert!(!pp.is_defined("_LP64"));
    }
}
