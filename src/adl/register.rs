// This module holds the register model of an architecture description: register definitions
// with their calling-convention roles, register classes (explicit lists, code snippets
// evaluated by generated code, and dynamic classes choosing between two classes at run time)
// and allocation classes that give every register its global number. Numbers come from a
// single counter that only grows and is never reset, so numbering continues from one
// allocation class to the next. After the description is read, two implicit classes are
// added: the spill class `stack_slots`, which starts at the next multiple of eight, and
// `dynamic`.

//! Registers, register classes and allocation classes.

use crate::core::{Dict, NameList};

/// Calling-convention role of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallConv {
    /// No save.
    NS,
    /// Save on call.
    SOC,
    /// Save on entry.
    SOE,
    /// Always save.
    AS,
}

impl CallConv {
    pub fn from_name(name: &str) -> Option<CallConv> {
        match name {
            "NS" => Some(CallConv::NS),
            "SOC" => Some(CallConv::SOC),
            "SOE" => Some(CallConv::SOE),
            "AS" => Some(CallConv::AS),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CallConv::NS => "NS",
            CallConv::SOC => "SOC",
            CallConv::SOE => "SOE",
            CallConv::AS => "AS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegDef<'a> {
    pub name: &'a str,
    pub callconv: CallConv,
    pub c_callconv: CallConv,
    /// Ideal register type used to save the register.
    pub ideal: &'a str,
    pub encoding: &'a str,
    pub concrete: &'a str,
    /// Allocation number, once an allocation class lists the register.
    pub number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegClassKind<'a> {
    List { regs: NameList<'a> },
    /// Mask computed by user code.
    CodeSnippet { code: &'a str },
    /// `classes[0]` when the condition holds, else `classes[1]`.
    Conditional {
        classes: [&'a str; 2],
        condition: &'a str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegClass<'a> {
    pub name: &'a str,
    pub kind: RegClassKind<'a>,
    /// Set on the spill class.
    pub stack_version: bool,
}

impl<'a> RegClass<'a> {
    pub fn list(name: &'a str) -> Self {
        Self {
            name,
            kind: RegClassKind::List {
                regs: NameList::new(),
            },
            stack_version: false,
        }
    }

    pub fn regs(&self) -> Option<&NameList<'a>> {
        match &self.kind {
            RegClassKind::List { regs } => Some(regs),
            _ => None,
        }
    }

    /// Bits of mask word `word` for a list class: one bit per member whose
    /// register number falls in that word.
    pub fn mask_word(&self, registers: &RegisterForm<'a>, word: usize) -> u32 {
        let Some(regs) = self.regs() else {
            return 0;
        };
        regs.iter()
            .filter_map(|name| registers.reg_def(name).and_then(|d| d.number))
            .filter(|n| n >> 5 == word)
            .fold(0, |mask, n| mask | (1u32 << (n & 31)))
    }
}

/// Registers grouped for the allocator, in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocClass<'a> {
    pub name: &'a str,
    pub regs: NameList<'a>,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm<'a> {
    defs: Dict<'a, RegDef<'a>>,
    def_order: NameList<'a>,
    classes: Dict<'a, RegClass<'a>>,
    class_order: NameList<'a>,
    alloc_classes: Dict<'a, AllocClass<'a>>,
    alloc_order: NameList<'a>,
    reg_ctr: usize,
}

impl<'a> RegisterForm<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a register definition. A repeated name keeps the first one.
    pub fn add_reg_def(&mut self, def: RegDef<'a>) -> bool {
        let name = def.name;
        if !self.defs.insert_new(name, def) {
            return false;
        }
        self.def_order.add_name(name);
        true
    }

    pub fn reg_def(&self, name: &str) -> Option<&RegDef<'a>> {
        self.defs.get(name)
    }

    pub fn reg_defs(&self) -> impl Iterator<Item = &RegDef<'a>> + '_ {
        self.def_order.iter().filter_map(move |n| self.defs.get(n))
    }

    pub fn add_reg_class(&mut self, class: RegClass<'a>) -> bool {
        let name = class.name;
        if !self.classes.insert_new(name, class) {
            return false;
        }
        self.class_order.add_name(name);
        true
    }

    pub fn reg_class(&self, name: &str) -> Option<&RegClass<'a>> {
        self.classes.get(name)
    }

    pub fn reg_classes(&self) -> impl Iterator<Item = &RegClass<'a>> + '_ {
        self.class_order.iter().filter_map(move |n| self.classes.get(n))
    }

    pub fn add_alloc_class(&mut self, class: AllocClass<'a>) -> bool {
        let name = class.name;
        if !self.alloc_classes.insert_new(name, class) {
            return false;
        }
        self.alloc_order.add_name(name);
        true
    }

    /// Append `reg` to allocation class `class` and give it the next
    /// register number.
    pub fn alloc_reg(&mut self, class: &str, reg: &'a str) -> bool {
        let Some(def) = self.defs.get_mut(reg) else {
            return false;
        };
        def.number = Some(self.reg_ctr);
        self.reg_ctr += 1;
        if let Some(alloc) = self.alloc_classes.get_mut(class) {
            alloc.regs.add_name(reg);
        }
        true
    }

    pub fn alloc_class(&self, name: &str) -> Option<&AllocClass<'a>> {
        self.alloc_classes.get(name)
    }

    pub fn alloc_classes(&self) -> impl Iterator<Item = &AllocClass<'a>> + '_ {
        self.alloc_order.iter().filter_map(move |n| self.alloc_classes.get(n))
    }

    /// Registers numbered so far.
    pub fn num_registers(&self) -> usize {
        self.reg_ctr
    }

    /// Align the counter to eight and add the spill class.
    pub fn add_spill_reg_class(&mut self) {
        self.reg_ctr = (self.reg_ctr + 7) & !7;
        let mut class = RegClass::list("stack_slots");
        class.stack_version = true;
        self.add_reg_class(class);
    }

    pub fn add_dynamic_reg_class(&mut self) {
        self.add_reg_class(RegClass::list("dynamic"));
    }

    /// 32-bit words in a register mask, rounded up to an even count with
    /// room for stack slots.
    pub fn reg_mask_words(&self) -> usize {
        let words = (self.reg_ctr + 31) >> 5;
        (words + 3 + 1) & !1
    }
}
