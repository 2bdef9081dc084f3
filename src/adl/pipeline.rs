// This module holds the pipeline model: functional-unit resources, the ordered pipeline stages,
// and the pipe classes that describe how an instruction occupies them. A resource is a bit mask;
// each plainly declared resource takes the next free bit and a resource declared as an OR of
// earlier ones takes the union of their masks. Stage indices are positions in the declaration
// order of `pipe_desc`. A pipe class records per-operand stage usages (read or write, with an
// optional count of extra instructions) and per-resource occupancy windows; the largest
// stage-plus-cycles seen over all classes is kept as the schedule horizon. Global bundle and
// fetch attributes live on the pipeline itself.

//! Pipeline stages, resources and pipe classes.

use crate::core::{Dict, NameList};

/// Highest resource bit available in a mask.
pub const MAX_RESOURCES: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub mask: u32,
}

impl Resource {
    /// True when the mask holds exactly one unit.
    pub fn is_single(&self) -> bool {
        self.mask.is_power_of_two()
    }
}

/// How a pipe class uses one of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandUsage<'a> {
    pub stage: &'a str,
    pub is_write: bool,
    /// Instructions issued after this one before the usage happens.
    pub more_instrs: u32,
}

/// A resource held from `stage` for `cycles` cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceUsage<'a> {
    pub resource: &'a str,
    pub stage: &'a str,
    pub cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeClassForm<'a> {
    pub name: &'a str,
    /// One-based declaration number.
    pub number: usize,
    pub line: usize,
    /// Formal parameter names in order.
    pub params: NameList<'a>,
    /// Parameter name to operand type.
    pub locals: Dict<'a, &'a str>,
    pub fixed_latency: Option<u32>,
    pub instruction_count: Option<u32>,
    pub has_branch_delay: bool,
    pub multiple_bundles: bool,
    pub force_serialization: bool,
    pub may_have_no_code: bool,
    pub operand_usages: Vec<(&'a str, OperandUsage<'a>)>,
    pub resource_usages: Vec<ResourceUsage<'a>>,
    /// Instructions and machine nodes scheduled with this class.
    pub instructs: NameList<'a>,
}

impl<'a> PipeClassForm<'a> {
    pub fn new(name: &'a str, number: usize, line: usize) -> Self {
        Self {
            name,
            number,
            line,
            params: NameList::new(),
            locals: Dict::new(),
            fixed_latency: None,
            instruction_count: None,
            has_branch_delay: false,
            multiple_bundles: false,
            force_serialization: false,
            may_have_no_code: false,
            operand_usages: Vec::new(),
            resource_usages: Vec::new(),
            instructs: NameList::new(),
        }
    }

    pub fn operand_usage(&self, name: &str) -> Option<&OperandUsage<'a>> {
        self.operand_usages
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, usage)| usage)
    }

    pub fn set_operand_usage(&mut self, name: &'a str, usage: OperandUsage<'a>) {
        match self.operand_usages.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = usage,
            None => self.operand_usages.push((name, usage)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineForm<'a> {
    resources: Dict<'a, Resource>,
    resource_order: NameList<'a>,
    rescount: u32,
    stages: NameList<'a>,
    classes: Dict<'a, PipeClassForm<'a>>,
    class_order: NameList<'a>,
    pub nops: NameList<'a>,
    pub variable_size_instrs: bool,
    pub branch_has_delay_slot: bool,
    pub max_instrs_per_bundle: u32,
    pub max_bundles_per_cycle: u32,
    pub instr_unit_size: u32,
    pub bundle_unit_size: u32,
    pub instr_fetch_unit_size: u32,
    pub instr_fetch_units: u32,
    max_cycle_used: u32,
}

impl<'a> PipelineForm<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new `resources(...)` list; bit numbering restarts.
    pub fn begin_resources(&mut self) {
        self.rescount = 0;
    }

    /// Declare a resource with the next single-bit mask.
    pub fn add_unit(&mut self, name: &'a str) -> u32 {
        let mask = 1u32.checked_shl(self.rescount).unwrap_or(0);
        self.rescount += 1;
        self.set_resource(name, mask);
        mask
    }

    /// Declare a resource whose mask is the union of `parts`. Returns the
    /// first undefined part on failure.
    pub fn add_union(&mut self, name: &'a str, parts: &[&'a str]) -> Result<u32, &'a str> {
        let mut mask = 0;
        for part in parts {
            let resource = self.resources.get(part).ok_or(*part)?;
            mask |= resource.mask;
        }
        self.set_resource(name, mask);
        Ok(mask)
    }

    fn set_resource(&mut self, name: &'a str, mask: u32) {
        self.resources.insert(name, Resource { mask });
        self.resource_order.add_name(name);
    }

    pub fn resource(&self, name: &str) -> Option<Resource> {
        self.resources.lookup(name)
    }

    pub fn resource_names(&self) -> &NameList<'a> {
        &self.resource_order
    }

    /// Number of single-bit resources declared by the last list.
    pub fn unit_count(&self) -> u32 {
        self.rescount
    }

    pub fn add_stage(&mut self, name: &'a str) {
        self.stages.add_name(name);
    }

    pub fn stages(&self) -> &NameList<'a> {
        &self.stages
    }

    pub fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages.index(name)
    }

    /// Register a pipe class under the next number. A name already
    /// registered keeps its first class and yields `None`.
    pub fn add_class(&mut self, name: &'a str, line: usize) -> Option<usize> {
        let number = self.class_order.len() + 1;
        if !self.classes.insert_new(name, PipeClassForm::new(name, number, line)) {
            return None;
        }
        self.class_order.add_name(name);
        Some(number)
    }

    /// Start `name` over as an empty class, keeping its number.
    pub fn reset_class(&mut self, name: &'a str, line: usize) {
        if let Some(class) = self.classes.get_mut(name) {
            *class = PipeClassForm::new(name, class.number, line);
        }
    }

    pub fn class(&self, name: &str) -> Option<&PipeClassForm<'a>> {
        self.classes.get(name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut PipeClassForm<'a>> {
        self.classes.get_mut(name)
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.class_order.search(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &PipeClassForm<'a>> + '_ {
        self.class_order.iter().filter_map(move |n| self.classes.get(n))
    }

    pub fn class_count(&self) -> usize {
        self.class_order.len()
    }

    /// Record a resource usage in `class` and widen the schedule horizon.
    pub fn add_resource_usage(&mut self, class: &str, usage: ResourceUsage<'a>) {
        let stage = self.stage_index(usage.stage).map_or(-1, |i| i as i64);
        let end = stage + i64::from(usage.cycles);
        if end > i64::from(self.max_cycle_used) {
            self.max_cycle_used = end as u32;
        }
        if let Some(pipe_class) = self.classes.get_mut(class) {
            pipe_class.resource_usages.push(usage);
        }
    }

    /// Largest stage index plus cycle count of any resource usage.
    pub fn max_cycle_used(&self) -> u32 {
        self.max_cycle_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_masks() {
        let mut pipe = PipelineForm::new();
        pipe.begin_resources();
        assert_eq!(pipe.add_unit("D0"), 0b001);
        assert_eq!(pipe.add_unit("D1"), 0b010);
        assert_eq!(pipe.add_union("DECODE", &["D0", "D1"]), Ok(0b011));
        assert_eq!(pipe.add_unit("ALU"), 0b100);
        assert_eq!(pipe.add_union("BAD", &["D0", "FPU"]), Err("FPU"));

        assert!(pipe.resource("ALU").unwrap().is_single());
        assert!(!pipe.resource("DECODE").unwrap().is_single());
        assert_eq!(pipe.unit_count(), 3);
        let names: Vec<_> = pipe.resource_names().iter().collect();
        assert_eq!(names, vec!["D0", "D1", "DECODE", "ALU"]);
    }

    #[test]
    fn test_stages_and_horizon() {
        let mut pipe = PipelineForm::new();
        for stage in ["S0", "S1", "S2", "S3"] {
            pipe.add_stage(stage);
        }
        pipe.begin_resources();
        pipe.add_unit("ALU");
        assert_eq!(pipe.add_class("ialu_reg", 10), Some(1));
        assert_eq!(pipe.add_class("ialu_mem", 20), Some(2));
        assert_eq!(pipe.add_class("ialu_reg", 30), None);
        assert_eq!(pipe.class("ialu_reg").unwrap().line, 10);

        pipe.add_resource_usage(
            "ialu_reg",
            ResourceUsage {
                resource: "ALU",
                stage: "S2",
                cycles: 1,
            },
        );
        pipe.add_resource_usage(
            "ialu_mem",
            ResourceUsage {
                resource: "ALU",
                stage: "S1",
                cycles: 4,
            },
        );
        assert_eq!(pipe.max_cycle_used(), 5);
        assert_eq!(pipe.stage_index("S3"), Some(3));
        assert_eq!(pipe.class("ialu_mem").unwrap().resource_usages.len(), 1);
        let order: Vec<_> = pipe.classes().map(|c| c.number).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_operand_usage_replaces() {
        let mut class = PipeClassForm::new("c", 1, 1);
        let read = OperandUsage {
            stage: "S1",
            is_write: false,
            more_instrs: 0,
        };
        class.set_operand_usage("src", read);
        class.set_operand_usage(
            "src",
            OperandUsage {
                stage: "S2",
                ..read
            },
        );
        assert_eq!(class.operand_usages.len(), 1);
        assert_eq!(class.operand_usage("src").unwrap().stage, "S2");
    }
}
