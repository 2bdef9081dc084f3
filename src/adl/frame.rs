// The frame section describes the stack frame layout shared by compiled code and the runtime:
// which register holds the frame pointer, where the return address lives, the stack alignment,
// how many outgoing slots a varargs native call kills and the code computing return value
// locations. Each entry is kept as the opaque expression written in the description. Native
// (C) variants default to the managed entries when the description leaves them out.

//! Stack frame layout.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameForm<'a> {
    pub line: usize,
    pub sync_stack_slots: Option<&'a str>,
    pub frame_pointer: Option<&'a str>,
    pub c_frame_pointer: Option<&'a str>,
    pub interpreter_frame_pointer: Option<&'a str>,
    pub inline_cache_reg: Option<&'a str>,
    pub cisc_spilling_operand_name: Option<&'a str>,
    pub alignment: Option<&'a str>,
    pub return_addr: Option<&'a str>,
    /// Return address held in a register rather than a stack slot.
    pub return_addr_in_reg: bool,
    pub c_return_addr: Option<&'a str>,
    pub c_return_addr_in_reg: bool,
    pub varargs_c_out_slots_killed: Option<&'a str>,
    pub return_value: Option<&'a str>,
    pub c_return_value: Option<&'a str>,
}

impl<'a> FrameForm<'a> {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            return_addr_in_reg: true,
            c_return_addr_in_reg: true,
            ..Self::default()
        }
    }

    /// Description of the first required entry that is missing.
    pub fn missing_entry(&self) -> Option<&'static str> {
        if self.frame_pointer.is_none() {
            Some("frame pointer definition")
        } else if self.alignment.is_none() {
            Some("alignment definition")
        } else if self.return_addr.is_none() {
            Some("return address location")
        } else if self.varargs_c_out_slots_killed.is_none() {
            Some("varargs C out slots killed definition")
        } else if self.return_value.is_none() {
            Some("return value definition")
        } else {
            None
        }
    }

    /// Give every native entry left unset the managed value.
    pub fn apply_native_defaults(&mut self) {
        if self.c_frame_pointer.is_none() {
            self.c_frame_pointer = self.frame_pointer;
        }
        if self.c_return_addr.is_none() {
            self.c_return_addr = self.return_addr;
            self.c_return_addr_in_reg = self.return_addr_in_reg;
        }
        if self.c_return_value.is_none() {
            self.c_return_value = self.return_value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_entries_in_order() {
        let mut frame = FrameForm::new(1);
        assert_eq!(frame.missing_entry(), Some("frame pointer definition"));
        frame.frame_pointer = Some("RSP");
        frame.alignment = Some("16");
        assert_eq!(frame.missing_entry(), Some("return address location"));
        frame.return_addr = Some("STACK - 2");
        frame.varargs_c_out_slots_killed = Some("0");
        frame.return_value = Some("return OptoRegPair(0, 0);");
        assert_eq!(frame.missing_entry(), None);
    }

    #[test]
    fn test_native_defaults() {
        let mut frame = FrameForm::new(1);
        frame.frame_pointer = Some("RSP");
        frame.return_addr = Some("STACK - 2");
        frame.return_addr_in_reg = false;
        frame.c_return_value = Some("native");
        frame.apply_native_defaults();
        assert_eq!(frame.c_frame_pointer, Some("RSP"));
        assert_eq!(frame.c_return_addr, Some("STACK - 2"));
        assert!(!frame.c_return_addr_in_reg);
        assert_eq!(frame.c_return_value, Some("native"));
    }
}
