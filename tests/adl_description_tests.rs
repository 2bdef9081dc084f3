//! Integration tests over a complete architecture description.
//!
//! `tests/data/mini_x86_64.ad` carries one of every top-level section, so
//! these tests check how the sections see each other: operands used by
//! instructions, pipeline classes named by `ins_pipe`, instructions named
//! by peepholes and the preprocessor choosing between alternatives.

mod common;

use adlc::adl::{SourceKind, UseDef};
use adlc::{FormKind, SessionConfig};
use common::{check_counts, load_ad_file, TestContext};

const DESCRIPTION: &str = "mini_x86_64.ad";

#[test]
fn test_description_parses_cleanly() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    check_counts(&out.diagnostics, 0, 0, 0);
    assert!(out.is_success());
    assert_eq!(out.model.count(FormKind::Operand), 5);
    assert_eq!(out.model.count(FormKind::OpClass), 1);
    assert_eq!(out.model.count(FormKind::MachNode), 1);
    assert_eq!(out.model.attributes().count(), 3);
}

#[test]
fn test_instructions_in_source_order_with_clones() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let names: Vec<_> = out.model.instructions().map(|i| i.ident).collect();
    assert_eq!(
        names,
        vec![
            "loadConI",
            "addI_rReg",
            "addI_rReg_mem",
            "addI_rReg_mem_0",
            "leaI_rReg_immI",
            "Ret32",
        ]
    );

    let clone = out.model.instruction("addI_rReg_mem_0").unwrap();
    assert_eq!(clone.cloned_from, Some("addI_rReg_mem"));
    assert_eq!(clone.cost(), Some("150"));
    assert_eq!(
        clone.rule().unwrap().to_string(),
        " (Set dst (AddI (LoadI src) dst))"
    );
    // A leaf pair and a constant right operand are never swapped.
    assert!(out.model.lookup("addI_rReg_0").is_none());
    assert!(out.model.lookup("leaI_rReg_immI_0").is_none());
}

#[test]
fn test_sources_and_definitions() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let kinds: Vec<_> = out.model.sources().map(|s| s.kind).collect();
    assert_eq!(kinds, vec![SourceKind::PreHeader, SourceKind::Source]);
    assert!(out
        .model
        .sources()
        .last()
        .unwrap()
        .code
        .contains("static int reg_encoding(Register r)"));

    assert_eq!(out.model.int_def("HUGE_COST").unwrap().value, 1_000_000);
    assert_eq!(
        out.model.int_def("HUGE_COST").unwrap().description,
        Some("10000 * DEFAULT_COST")
    );
}

#[test]
fn test_register_numbering_follows_alloc_classes() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let regs = out.model.registers().unwrap();
    let numbers: Vec<_> = ["RAX", "RAX_H", "RCX", "RCX_H", "RSP", "RSP_H", "RFLAGS"]
        .iter()
        .map(|name| regs.reg_def(name).unwrap().number)
        .collect();
    assert_eq!(
        numbers,
        vec![Some(0), Some(1), Some(2), Some(3), Some(4), Some(5), Some(6)]
    );
    // Seven registers rounded up for the spill class.
    assert_eq!(regs.num_registers(), 8);
    assert_eq!(regs.reg_mask_words(), 4);
    assert_eq!(
        regs.reg_class("ptr_reg").unwrap().regs().unwrap().as_slice(),
        &["RAX", "RAX_H", "RCX", "RCX_H"]
    );
    assert!(regs.reg_class("stack_slots").is_some());
}

#[test]
fn test_chain_rule_from_constant_load() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let from_ideal = out.model.chain_rules("ConI");
    assert_eq!(from_ideal.len(), 1);
    assert_eq!(from_ideal[0].result, "rRegI");
    assert_eq!(from_ideal[0].cost, "50");
    assert_eq!(from_ideal[0].instruction, "loadConI");
    assert!(out.model.has_chain_rule("immI", "rRegI"));
    assert!(!out.model.has_chain_rule("rRegI", "immI"));
}

#[test]
fn test_encodings_and_components() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let encode = out.model.encode().unwrap();
    assert!(encode.class("OpcP").is_some());
    let reg_reg = encode.class("reg_reg").unwrap();
    assert_eq!(reg_reg.param_type("src"), Some("rRegI"));

    let add = out.model.instruction("addI_rReg").unwrap();
    let calls: Vec<_> = add
        .ins_encode
        .as_ref()
        .unwrap()
        .calls
        .iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(calls, vec!["OpcP", "reg_reg"]);
    assert_eq!(add.opcode.unwrap().primary, Some("0x03"));

    let comps = &add.components;
    assert_eq!(comps.search("cr").unwrap().usedef, UseDef::KILL);
    assert!(comps.search("dst").unwrap().isa(UseDef::DEF));
    assert!(comps.search("src").unwrap().isa(UseDef::USE));
}

#[test]
fn test_pipeline_classes_collect_instructions() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let pipe = out.model.pipeline().unwrap();
    assert_eq!(pipe.stages().len(), 6);
    assert_eq!(pipe.resource("ALU").unwrap().mask, 0b11000);
    assert_eq!(
        pipe.class("ialu_reg_reg").unwrap().instructs.as_slice(),
        &["loadConI", "addI_rReg", "leaI_rReg_immI"]
    );
    assert!(pipe
        .class("ialu_reg_mem")
        .unwrap()
        .instructs
        .search("addI_rReg_mem"));
    let empty = pipe.class("pipe_class_empty").unwrap();
    assert_eq!(empty.fixed_latency, Some(0));
    assert!(empty.instructs.search("MachNop"));
    assert!(empty.instructs.search("Ret32"));
}

#[test]
fn test_frame_and_peephole() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let frame = out.model.frame().unwrap();
    assert_eq!(frame.frame_pointer, Some("RSP"));
    assert_eq!(frame.c_frame_pointer, Some("RSP"));
    assert!(!frame.return_addr_in_reg);

    let peeps = out.model.peepholes_of("addI_rReg");
    assert_eq!(peeps.len(), 1);
    let peep = peeps[0];
    assert!(peep.is_complete());
    let matches = peep.matches.as_ref().unwrap();
    assert_eq!(matches.instruction_at(1), Some("loadConI"));
    assert_eq!(peep.constraints[0].right_op, "dst");
    assert_eq!(
        peep.replace.as_ref().unwrap().operands,
        vec![(0, "dst"), (0, "dst"), (1, "src")]
    );
}

#[test]
fn test_predefined_symbol_selects_branch() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let config = SessionConfig::new(DESCRIPTION).define("_LP64", "1");
    let out = ctx.parse_with(config, &text);

    check_counts(&out.diagnostics, 0, 0, 0);
    assert!(out.model.instruction("Ret").is_some());
    assert!(out.model.instruction("Ret32").is_none());
    let ret = out.model.instruction("Ret").unwrap();
    assert!(ret.is_ideal_control());
    assert_eq!(ret.rule().unwrap().result(), Some("Universe"));
}

#[test]
fn test_location_markers_wrap_code_blocks() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let config = SessionConfig::new(DESCRIPTION).with_location_markers(true);
    let out = ctx.parse_with(config, &text);

    assert!(out.is_success(), "{}", out.diagnostics);
    let body = out.model.encode().unwrap().class("OpcP").unwrap().body();
    assert!(body.contains("#line"), "{body}");
    assert!(body.contains(DESCRIPTION), "{body}");
}

#[test]
fn test_summary_mentions_every_section() {
    let ctx = TestContext::new();
    let text = load_ad_file(DESCRIPTION);
    let out = ctx.parse(DESCRIPTION, &text);

    let summary = out.model.to_string();
    assert!(summary.contains("pipeline     6 stages"), "{summary}");
    assert!(summary.contains("enc_class    2"), "{summary}");
    assert!(summary.contains("peephole"), "{summary}");
}
