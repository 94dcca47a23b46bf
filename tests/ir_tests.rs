//! Integration tests for the textual IR substrate.
//!
//! These exercise the parser, printer and structural accessors through the
//! public API, using the #[test] framework directly on inline sources.

use veil::{Global, GlobalInit, IrParseError, Module, Opcode, Operand};

/// Helper to check if output contains expected patterns
fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Output missing expected pattern: '{pattern}'\nFull output:\n{output}"
        );
    }
}

const BRANCHY: &str = r#"
@greeting = "hi"
extern puts

func(%n) {
entry:
  %cond = and %n, 1
  condbr %cond, ^odd, ^even
odd:
  %a = add %n, 1
  br ^exit
even:
  %b = sub %n, 1
  br ^exit
exit:
  ret
}
"#;

#[test]
fn parse_and_print_branchy_function() {
    let module = Module::parse(BRANCHY).unwrap();
    let output = module.print();

    check_output_contains(
        &output,
        &[
            "@greeting = \"hi\"",
            "extern puts",
            "func(%n) {",
            "entry:",
            "condbr %cond, ^odd, ^even",
            "%a = add %n, 1",
            "%b = sub %n, 1",
            "ret",
        ],
    );

    assert_eq!(module.functions.len(), 2);
    let func = module.find_function("func").unwrap();
    assert_eq!(func.blocks.len(), 4);
    assert_eq!(func.blocks[0].terminator().unwrap().op, Opcode::CondBr);
    assert!(module.find_function("puts").unwrap().is_declaration());
}

#[test]
fn printed_output_reparses_to_the_same_text() {
    let module = Module::parse(BRANCHY).unwrap();
    let printed = module.print();
    let reparsed = Module::parse(&printed).unwrap();
    assert_eq!(reparsed.print(), printed);
}

#[test]
fn operand_forms_round_trip() {
    let module = Module::parse(
        "@tbl = bytes [0, 1]\nf() {\nentry:\n  %v = load @tbl\n  indirectbr @tbl, 0, ^entry\n}\n",
    )
    .unwrap();
    let f = module.find_function("f").unwrap();
    let load = &f.blocks[0].insts[0];
    assert_eq!(load.operands[0], Operand::Global("tbl".to_string()));
    let ibr = &f.blocks[0].insts[1];
    assert_eq!(ibr.operands[1], Operand::Imm(0));
    assert_eq!(ibr.operands[2], Operand::Block("entry".to_string()));
}

#[test]
fn global_initializer_kinds() {
    let module =
        Module::parse("@s = \"text\"\n@b = bytes [7, 8]\n@z = zero\n").unwrap();
    assert_eq!(module.global("s").unwrap().init, GlobalInit::Str("text".to_string()));
    assert_eq!(module.global("b").unwrap().init, GlobalInit::Bytes(vec![7, 8]));
    assert_eq!(module.global("z").unwrap().init, GlobalInit::Zero);
}

#[test]
fn unknown_opcode_reports_line_number() {
    let err = Module::parse("f() {\nentry:\n  %x = frobnicate %y\n}\n").unwrap_err();
    match err {
        IrParseError::UnknownOpcode { line, ref opcode } => {
            assert_eq!(line, 3);
            assert_eq!(opcode, "frobnicate");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn instruction_outside_block_is_rejected() {
    let err = Module::parse("f() {\n  ret\n}\n").unwrap_err();
    assert!(matches!(err, IrParseError::Malformed { line: 2, .. }));
}

#[test]
fn unterminated_function_is_rejected() {
    let err = Module::parse("f() {\nentry:\n  ret\n").unwrap_err();
    assert!(matches!(err, IrParseError::UnterminatedFunction { .. }));
}

#[test]
fn declare_and_add_global_are_idempotent() {
    let mut module = Module::parse("extern puts\n@msg = \"x\"\n").unwrap();
    assert!(!module.declare("puts"));
    assert!(module.declare("printf"));
    assert!(!module.add_global(Global { name: "msg".to_string(), init: GlobalInit::Zero }));
    assert_eq!(module.global("msg").unwrap().init, GlobalInit::Str("x".to_string()));
    assert!(module.add_global(Global { name: "msg2".to_string(), init: GlobalInit::Zero }));
}

#[test]
fn definitions_iterator_skips_declarations() {
    let module = Module::parse("extern a\nf() {\nentry:\n  ret\n}\nextern b\n").unwrap();
    let names: Vec<&str> = module.definitions().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["f"]);
}
