// Lowering engine tests: exact listings and error paths

use super::*;
use crate::dcpu_compiler::labels::LabelGenerator;
use crate::dcpu_compiler::lexer::Lexer;
use crate::dcpu_compiler::parser::Parser;
use crate::dcpu_compiler::scope::{SlotAllocator, SCREEN_ADDRESS};
use test_log::test;

fn parse(source: &str) -> Module {
    let tokens = Lexer::new(source).tokenize().unwrap();
    Parser::new(tokens).parse().unwrap()
}

fn lower_in(ctx: &mut ProgramContext, source: &str) -> Result<String, CompilerError> {
    let module = parse(source);
    Lowerer::new(ctx)
        .with_halt_epilogue(false)
        .lower_module(&module)
        .map(|listing| listing.to_string())
}

fn lower(source: &str) -> Result<String, CompilerError> {
    lower_in(&mut ProgramContext::default(), source)
}

fn listing(source: &str) -> Vec<String> {
    lower(source)
        .unwrap()
        .lines()
        .map(|line| line.to_string())
        .collect()
}

#[test]
fn test_assign_sum() {
    assert_eq!(
        listing("x = 1 + 2;"),
        vec![
            "set a, 1",
            "set [0x2000], a",
            "set a, 2",
            "add [0x2000], a",
            "set a, [0x2000]",
            "set [0x2000], a",
            "set a, 0x2001",
            "set [a], [0x2000]",
        ]
    );
}

#[test]
fn test_names_keep_their_slots() {
    assert_eq!(
        listing("x = 5; y = x;"),
        vec![
            "set a, 5",
            "set [0x2000], a",
            "set a, 0x2001",
            "set [a], [0x2000]",
            "set a, [0x2001]",
            "set [0x2000], a",
            "set a, 0x2002",
            "set [a], [0x2000]",
        ]
    );
}

#[test]
fn test_chained_assignment_stores_each_target() {
    let lines = listing("a = b = 7;");
    assert_eq!(
        lines,
        vec![
            "set a, 7",
            "set [0x2000], a",
            "set a, 0x2001",
            "set [a], [0x2000]",
            "set a, 0x2002",
            "set [a], [0x2000]",
        ]
    );
}

#[test]
fn test_arithmetic_mnemonics() {
    for (op, mnemonic) in [
        ("-", "sub"),
        ("*", "mul"),
        ("/", "div"),
        ("%", "mod"),
        ("&", "and"),
        ("|", "bor"),
        ("^", "xor"),
        ("<<", "shl"),
        (">>", "shr"),
    ] {
        let lines = listing(&format!("6 {} 3;", op));
        assert_eq!(lines[3], format!("{} [0x2000], a", mnemonic));
    }
}

#[test]
fn test_single_comparison() {
    assert_eq!(
        listing("1 < 2;"),
        vec![
            "set a, 1",
            "set [0x2000], a",
            "set a, 2",
            "set [0x2001], a",
            "set a, 0",
            "ifl [0x2000], [0x2001]",
            "set a, 1",
        ]
    );
}

#[test]
fn test_compound_comparisons_emit_two_tests() {
    let lines = listing("1 <= 2;");
    assert_eq!(
        &lines[4..],
        &["set a, 0", "ifl [0x2000], [0x2001]", "set a, 1", "ife [0x2000], [0x2001]", "set a, 1"]
    );

    let lines = listing("1 >= 2;");
    assert_eq!(lines[5], "ifg [0x2000], [0x2001]");
    assert_eq!(lines[7], "ife [0x2000], [0x2001]");

    assert_eq!(listing("1 != 2;")[5], "ifn [0x2000], [0x2001]");
    assert_eq!(listing("1 == 2;")[5], "ife [0x2000], [0x2001]");
}

#[test]
fn test_chained_comparison_ands_stages() {
    assert_eq!(
        listing("1 < 2 < 3;"),
        vec![
            "set a, 1",
            "set [0x2000], a",
            "set a, 2",
            "set [0x2001], a",
            "set a, 0",
            "ifl [0x2000], [0x2001]",
            "set a, 1",
            "ife a, 0",
            "set PC, compare1done",
            "set [0x2000], [0x2001]",
            "set a, 3",
            "set [0x2001], a",
            "set a, 0",
            "ifl [0x2000], [0x2001]",
            "set a, 1",
            ":compare1done",
        ]
    );
}

#[test]
fn test_bool_op_emits_every_operand() {
    assert_eq!(
        listing("p and q and r;"),
        vec![
            "set a, [0x2000]",
            "ife a, 0",
            "set PC, boolop1skip",
            "set a, [0x2001]",
            "ife a, 0",
            "set PC, boolop1skip",
            "set a, [0x2002]",
            ":boolop1skip",
        ]
    );

    let lines = listing("p || q;");
    assert_eq!(lines[1], "ife a, 1");
    assert_eq!(lines[3], "set a, [0x2001]");
}

#[test]
fn test_not() {
    assert_eq!(listing("not x;"), vec!["set a, [0x2000]", "xor a, 1"]);
    assert_eq!(listing("!x;"), vec!["set a, [0x2000]", "xor a, 1"]);
}

#[test]
fn test_screen_store_and_load() {
    assert_eq!(
        listing("screen[1] = 65;"),
        vec![
            "set a, 65",
            "set [0x2000], a",
            "set a, 1",
            "set [0x2001], a",
            "set a, 0x8000",
            "add a, [0x2001]",
            "set [a], [0x2000]",
        ]
    );

    let lines = listing("y = SCREEN[2];");
    assert_eq!(
        &lines[..5],
        &["set a, 2", "set [0x2000], a", "set a, 0x8000", "add a, [0x2000]", "set a, [a]"]
    );
}

#[test]
fn test_if_else() {
    assert_eq!(
        listing("if (x) { y = 1; } else { y = 2; }"),
        vec![
            "set a, [0x2000]",
            "ifn a, 1",
            "set PC, if1else",
            "set a, 1",
            "set [0x2001], a",
            "set a, 0x2002",
            "set [a], [0x2001]",
            "set PC, if1end",
            ":if1else",
            "set a, 2",
            "set [0x2001], a",
            "set a, 0x2002",
            "set [a], [0x2001]",
            ":if1end",
        ]
    );
}

#[test]
fn test_sibling_ifs_get_distinct_tags() {
    let text = lower("if (x) { } if (y) { } if (z) { } else if (w) { }").unwrap();
    for tag in ["if1", "if2", "if3", "if4"] {
        assert!(text.contains(&format!(":{}else", tag)), "missing {}", tag);
        assert!(text.contains(&format!(":{}end", tag)), "missing {}", tag);
    }
}

#[test]
fn test_while_loop_shape() {
    assert_eq!(
        listing("while (i < 3) { i = i + 1; }"),
        vec![
            ":loop1start",
            "set a, [0x2000]",
            "set [0x2001], a",
            "set a, 3",
            "set [0x2002], a",
            "set a, 0",
            "ifl [0x2001], [0x2002]",
            "set a, 1",
            "ifn a, 1",
            "set PC, loop1end",
            "set a, [0x2000]",
            "set [0x2001], a",
            "set a, 1",
            "add [0x2001], a",
            "set a, [0x2001]",
            "set [0x2001], a",
            "set a, 0x2000",
            "set [a], [0x2001]",
            "set PC, loop1start",
            ":loop1end",
        ]
    );
}

#[test]
fn test_for_loop_runs_init_once_and_step_in_body() {
    let lines = listing("for (i = 0; i < 2; i = i + 1) { }");
    assert_eq!(
        &lines[..5],
        &["set a, 0", "set [0x2000], a", "set a, 0x2001", "set [a], [0x2000]", ":loop1start"]
    );
    let jump_back = lines.iter().position(|l| l == "set PC, loop1start").unwrap();
    assert_eq!(lines[jump_back - 1], "set [a], [0x2000]");
    assert_eq!(lines.last().unwrap(), ":loop1end");
}

#[test]
fn test_block_locals_are_released() {
    let lines = listing("if (1) { t = 1; } u = 2;");
    let stores: Vec<&String> = lines.iter().filter(|l| l.starts_with("set a, 0x")).collect();
    assert_eq!(stores, vec!["set a, 0x2001", "set a, 0x2001"]);
}

#[test]
fn test_function_returns() {
    assert_eq!(
        listing("function f() { return 4; }"),
        vec![":f", "set a, 4", "set PC, POP"]
    );
    assert_eq!(listing("function g() { }"), vec![":g", "set PC, POP"]);
    assert_eq!(
        listing("function h() { return; }"),
        vec![":h", "set PC, POP"]
    );
}

#[test]
fn test_start_and_end_have_no_implicit_return() {
    assert_eq!(
        listing("function start() { run(); } function run() { } function end() { }"),
        vec![":start", "jsr run", ":run", "set PC, POP", ":end"]
    );
}

#[test]
fn test_calls() {
    assert_eq!(
        listing("f(); function f() { exit(); }"),
        vec!["jsr f", ":f", "set PC, end", "set PC, POP"]
    );
}

#[test]
fn test_undefined_function() {
    assert_eq!(
        lower("x = 1;\nmissing();"),
        Err(CompilerError::UndefinedFunction(
            "missing".to_string(),
            SourcePos::new(2, 1)
        ))
    );
}

#[test]
fn test_routine_names_that_read_as_operands() {
    for (name, clash) in [
        ("x", "a register"),
        ("J", "a register"),
        ("pc", "a register"),
        ("SP", "a register"),
        ("push", "a stack operand"),
        ("Pop", "a stack operand"),
    ] {
        assert_eq!(
            lower(&format!("y = 1;\nfunction {}() {{ }}", name)),
            Err(CompilerError::ReservedRoutineName(
                name.to_string(),
                clash.to_string(),
                SourcePos::new(2, 1)
            ))
        );
    }
    assert!(lower("function xy() { } function pcount() { }").is_ok());
}

#[test]
fn test_routine_names_that_match_generated_labels() {
    for name in ["if1end", "loop4start", "boolop2skip", "compare9done"] {
        let err = lower(&format!("if (1) {{ function {}() {{ }} }}", name)).unwrap_err();
        assert_eq!(
            err,
            CompilerError::ReservedRoutineName(
                name.to_string(),
                "a generated jump label".to_string(),
                SourcePos::new(1, 10)
            )
        );
    }
    assert!(lower("function if1() { } function loopend() { }").is_ok());
}

#[test]
fn test_scratch_count_balances_around_calls() {
    let module = parse("x = 1 + f(); y = f() < 2 < f(); function f() { return 3; }");
    let mut ctx = ProgramContext::default();
    let mut lowerer = Lowerer::new(&mut ctx);
    lowerer.functions.insert("f".to_string(), SourcePos::new(1, 33));
    let root = lowerer.ctx.slots.root();
    for stmt in &module.body {
        lowerer.lower_statement(stmt, root).unwrap();
        assert_eq!(lowerer.live_scratch, 0);
    }

    let err = lowerer.lower_statement(&parse("z = 1 + missing();").body[0], root);
    assert!(matches!(err, Err(CompilerError::UndefinedFunction(_, _))));
    assert_eq!(lowerer.live_scratch, 0);
}

#[test]
fn test_halt_epilogue() {
    let module = parse("x = 1;");
    let mut ctx = ProgramContext::default();
    let listing = Lowerer::new(&mut ctx).lower_module(&module).unwrap();
    let lines: Vec<String> = listing.lines().iter().map(|l| l.to_string()).collect();
    assert_eq!(&lines[lines.len() - 2..], &[":end", "set PC, end"]);

    let module = parse("function end() { }");
    let mut ctx = ProgramContext::default();
    let listing = Lowerer::new(&mut ctx).lower_module(&module).unwrap();
    assert_eq!(listing.to_string(), ":end");
}

#[test]
fn test_invalid_reference_target() {
    let mut ctx = ProgramContext::default();
    let err = lower_in(&mut ctx, "x = 1;\n(a + 1) = 3;").unwrap_err();
    assert_eq!(
        err,
        CompilerError::InvalidReferenceTarget(
            "an arithmetic expression".to_string(),
            SourcePos::new(2, 2)
        )
    );
    // only x is still bound; the assignment's scratch slot was returned
    assert_eq!(ctx.slots.occupied_count(), 1);

    assert!(matches!(
        lower("3 = 4;"),
        Err(CompilerError::InvalidReferenceTarget(what, _)) if what == "an integer literal"
    ));
}

#[test]
fn test_unsupported_operators() {
    assert_eq!(
        lower("x = -y;"),
        Err(CompilerError::UnsupportedOperator(
            "-".to_string(),
            SourcePos::new(1, 5)
        ))
    );
    assert!(matches!(
        lower("x = 2 ** 3;"),
        Err(CompilerError::UnsupportedOperator(op, _)) if op == "**"
    ));
}

#[test]
fn test_scope_released_after_error() {
    let mut ctx = ProgramContext::default();
    let result = lower_in(&mut ctx, "function f() { t = 1; u = -1; }");
    assert!(matches!(result, Err(CompilerError::UnsupportedOperator(_, _))));
    assert_eq!(ctx.slots.occupied_count(), 0);
}

#[test]
fn test_memory_exhausted() {
    let mut ctx = ProgramContext {
        slots: SlotAllocator::new(0x2000..=0x2001, SCREEN_ADDRESS),
        labels: LabelGenerator::new(),
    };
    let err = lower_in(&mut ctx, "x = 1; y = 2;").unwrap_err();
    assert_eq!(err, CompilerError::MemoryExhausted(SourcePos::new(1, 8)));
    assert_eq!(ctx.slots.occupied_count(), 1);
}

#[test]
fn test_identical_trees_give_identical_output() {
    let source = "function f() { if (a < b < c) { d = a and not b; } } f();";
    assert_eq!(lower(source).unwrap(), lower(source).unwrap());
}
