// The `| 0` truncation idiom and the implicit widening rules.

use super::common;
use common::{bin, err_for, fn_decl, ident, int, ir_for, ret, var};
use velo_ast::{BinOp, Type};
use veloc::diagnostics::DiagnosticKind;

#[test]
fn float_bitor_zero_truncates_to_int32() {
    // return x | 0;  (float64) -> int32
    let func = fn_decl(
        0,
        "to_int",
        &[(1, "x", Type::Float64)],
        Type::Int32,
        vec![ret(bin(
            BinOp::BitOr,
            Type::Int32,
            ident(1, "x", Type::Float64),
            int(0),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("fptosi double"), "expected truncation:\n{}", ir);
    assert!(ir.contains("ret i32"), "{}", ir);
}

#[test]
fn float_bitor_nonzero_is_rejected() {
    // `x | 1` is not the truncation idiom.
    let func = fn_decl(
        0,
        "bad",
        &[(1, "x", Type::Float64)],
        Type::Int32,
        vec![ret(bin(
            BinOp::BitOr,
            Type::Int32,
            ident(1, "x", Type::Float64),
            int(1),
        ))],
    );
    let d = err_for(func);
    assert_eq!(d.kind, DiagnosticKind::UnsupportedBinaryOperator);
}

#[test]
fn int_bitor_zero_stays_bitwise() {
    // On an int32 left operand `| 0` is an ordinary bitwise or.
    let func = fn_decl(
        0,
        "keep",
        &[(1, "x", Type::Int32)],
        Type::Int32,
        vec![ret(bin(
            BinOp::BitOr,
            Type::Int32,
            ident(1, "x", Type::Int32),
            int(0),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("or i32"), "{}", ir);
    assert!(!ir.contains("fptosi"), "{}", ir);
}

#[test]
fn float_bitwise_and_is_rejected() {
    let func = fn_decl(
        0,
        "bad_and",
        &[(1, "x", Type::Float64)],
        Type::Int32,
        vec![ret(bin(
            BinOp::BitAnd,
            Type::Int32,
            ident(1, "x", Type::Float64),
            int(0),
        ))],
    );
    let d = err_for(func);
    assert_eq!(d.kind, DiagnosticKind::UnsupportedBinaryOperator);
}

#[test]
fn int_widens_to_float_in_declarations() {
    // let f: number = i;
    let func = fn_decl(
        0,
        "widen",
        &[(1, "i", Type::Int32)],
        Type::Float64,
        vec![
            var(2, "f", Type::Float64, Some(ident(1, "i", Type::Int32))),
            ret(ident(2, "f", Type::Float64)),
        ],
    );
    let ir = ir_for(func);
    assert!(ir.contains("sitofp i32"), "expected widening:\n{}", ir);
}

#[test]
fn implicit_narrowing_is_a_type_mismatch() {
    // let i: int = x;  -- needs an explicit `| 0`
    let func = fn_decl(
        0,
        "narrow",
        &[(1, "x", Type::Float64)],
        Type::Int32,
        vec![
            var(2, "i", Type::Int32, Some(ident(1, "x", Type::Float64))),
            ret(ident(2, "i", Type::Int32)),
        ],
    );
    let d = err_for(func);
    assert_eq!(d.kind, DiagnosticKind::TypeMismatch);
}

#[test]
fn mixed_float_int_arithmetic_promotes_the_right_operand() {
    // x + 1 with x: float64 promotes the literal.
    let func = fn_decl(
        0,
        "mixed",
        &[(1, "x", Type::Float64)],
        Type::Float64,
        vec![ret(bin(
            BinOp::Add,
            Type::Float64,
            ident(1, "x", Type::Float64),
            int(1),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("sitofp i32"), "{}", ir);
    assert!(ir.contains("fadd double"), "{}", ir);
}
