// Parser tests

use super::*;
use crate::dcpu_compiler::lexer::Lexer;

fn parse_source(source: &str) -> Result<Module, CompilerError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse()
}

fn parse_ok(source: &str) -> Vec<Stmt> {
    parse_source(source).unwrap().body
}

fn parse_expr(source: &str) -> Expr {
    let mut body = parse_ok(&format!("{};", source));
    match body.remove(0).kind {
        StmtKind::Expr(expr) => expr,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

fn name(expr: &Expr) -> &str {
    match &expr.kind {
        ExprKind::Name(name) => name,
        other => panic!("expected name, got {:?}", other),
    }
}

#[test]
fn test_empty_program() {
    assert!(parse_ok("").is_empty());
    assert!(parse_ok("// nothing here\n").is_empty());
}

#[test]
fn test_chained_assignment_targets() {
    let body = parse_ok("a = b = 3;");
    assert_eq!(body.len(), 1);
    match &body[0].kind {
        StmtKind::Assign { targets, value } => {
            assert_eq!(targets.len(), 2);
            assert_eq!(name(&targets[0]), "a");
            assert_eq!(name(&targets[1]), "b");
            assert_eq!(value.kind, ExprKind::Num(3));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_precedence_of_arithmetic() {
    let expr = parse_expr("1 + 2 * 3");
    match expr.kind {
        ExprKind::BinOp { left, op, right } => {
            assert_eq!(op, BinOp::Add);
            assert_eq!(left.kind, ExprKind::Num(1));
            assert!(matches!(right.kind, ExprKind::BinOp { op: BinOp::Mult, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bit_operators_bind_looser_than_shift() {
    let expr = parse_expr("x | 1 << 2 & y");
    match expr.kind {
        ExprKind::BinOp { op, right, .. } => {
            assert_eq!(op, BinOp::BitOr);
            match right.kind {
                ExprKind::BinOp { op, left, .. } => {
                    assert_eq!(op, BinOp::BitAnd);
                    assert!(matches!(left.kind, ExprKind::BinOp { op: BinOp::LShift, .. }));
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_chained_comparison_is_one_node() {
    let expr = parse_expr("1 < 2 <= x");
    match expr.kind {
        ExprKind::Compare { left, comparisons } => {
            assert_eq!(left.kind, ExprKind::Num(1));
            let ops: Vec<CmpOp> = comparisons.iter().map(|(op, _)| *op).collect();
            assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
            assert_eq!(name(&comparisons[1].1), "x");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bool_chains_are_flattened() {
    let expr = parse_expr("a and b && c or d");
    match expr.kind {
        ExprKind::BoolOp { op, values } => {
            assert_eq!(op, BoolOp::Or);
            assert_eq!(values.len(), 2);
            match &values[0].kind {
                ExprKind::BoolOp { op, values } => {
                    assert_eq!(*op, BoolOp::And);
                    assert_eq!(values.len(), 3);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_not_binds_looser_than_comparison() {
    let expr = parse_expr("not x == 1");
    match expr.kind {
        ExprKind::UnaryOp { op, operand } => {
            assert_eq!(op, UnaryOp::Not);
            assert!(matches!(operand.kind, ExprKind::Compare { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(
        parse_expr("!!x").kind,
        ExprKind::UnaryOp { op: UnaryOp::Not, .. }
    ));
}

#[test]
fn test_unary_minus_and_power_are_parsed() {
    assert!(matches!(
        parse_expr("-x").kind,
        ExprKind::UnaryOp { op: UnaryOp::Neg, .. }
    ));
    assert!(matches!(
        parse_expr("2 ** 3").kind,
        ExprKind::BinOp { op: BinOp::Pow, .. }
    ));
}

#[test]
fn test_subscript_and_call() {
    let expr = parse_expr("screen[i + 1]");
    match expr.kind {
        ExprKind::Subscript { value, index } => {
            assert_eq!(name(&value), "screen");
            assert!(matches!(index.kind, ExprKind::BinOp { op: BinOp::Add, .. }));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(
        parse_expr("draw()").kind,
        ExprKind::Call {
            func: "draw".to_string()
        }
    );
}

#[test]
fn test_call_arguments_are_rejected() {
    assert!(matches!(
        parse_source("draw(1);"),
        Err(CompilerError::ParseError(_, _))
    ));
    assert!(matches!(
        parse_source("3();"),
        Err(CompilerError::ParseError(_, _))
    ));
}

#[test]
fn test_function_definition() {
    let body = parse_ok("function main() { x = 1; return x; }");
    match &body[0].kind {
        StmtKind::FunctionDef { name, body } => {
            assert_eq!(name, "main");
            assert_eq!(body.len(), 2);
            assert!(matches!(body[1].kind, StmtKind::Return(Some(_))));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(
        parse_source("function f(a) { }"),
        Err(CompilerError::ParseError(_, _))
    ));
}

#[test]
fn test_else_if_nests_in_orelse() {
    let body = parse_ok("if (a) { x = 1; } else if (b) { x = 2; } else { x = 3; }");
    match &body[0].kind {
        StmtKind::If { body, orelse, .. } => {
            assert_eq!(body.len(), 1);
            assert_eq!(orelse.len(), 1);
            match &orelse[0].kind {
                StmtKind::If { orelse, .. } => assert_eq!(orelse.len(), 1),
                other => panic!("unexpected {:?}", other),
            }
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_while_and_for() {
    let body = parse_ok("while (i < 10) { i = i + 1; } for (i = 0; i < 3; i = i + 1) { f(); }");
    assert!(matches!(body[0].kind, StmtKind::While { .. }));
    match &body[1].kind {
        StmtKind::For {
            init, step, body, ..
        } => {
            assert!(matches!(init.kind, StmtKind::Assign { .. }));
            assert!(matches!(step.kind, StmtKind::Assign { .. }));
            assert_eq!(body.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bare_return() {
    let body = parse_ok("function f() { return; }");
    match &body[0].kind {
        StmtKind::FunctionDef { body, .. } => {
            assert_eq!(body[0].kind, StmtKind::Return(None));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_positions_are_recorded() {
    let body = parse_ok("x = 1;\n  while (x) { x = 0; }");
    assert_eq!(body[0].pos, SourcePos::new(1, 1));
    assert_eq!(body[1].pos, SourcePos::new(2, 3));
}

#[test]
fn test_missing_semicolon() {
    let err = parse_source("x = 1\ny = 2;").unwrap_err();
    assert_eq!(
        err,
        CompilerError::ExpectedToken(
            "';'".to_string(),
            "identifier 'y'".to_string(),
            SourcePos::new(2, 1)
        )
    );
}

#[test]
fn test_unclosed_block() {
    assert!(matches!(
        parse_source("while (1) { x = 1;"),
        Err(CompilerError::ExpectedToken(expected, found, _))
            if expected == "'}'" && found == "end of input"
    ));
}
