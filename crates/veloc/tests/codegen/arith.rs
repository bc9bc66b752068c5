// Numeric operator dispatch: int operations for int32 operands, float
// operations for float64 operands, int tested before float.

use super::common;
use common::{bin, boolean, fn_decl, ident, ir_for, ret};
use velo_ast::{BinOp, Type};

#[test]
fn int_add_uses_integer_instruction() {
    // return a + b;  (int32, int32) -> int32
    let func = fn_decl(
        0,
        "sum",
        &[(1, "a", Type::Int32), (2, "b", Type::Int32)],
        Type::Int32,
        vec![ret(bin(
            BinOp::Add,
            Type::Int32,
            ident(1, "a", Type::Int32),
            ident(2, "b", Type::Int32),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("add i32"), "expected integer add:\n{}", ir);
    assert!(!ir.contains("fadd"), "int32 operands must not take the float path:\n{}", ir);
}

#[test]
fn float_add_uses_float_instruction() {
    // return a + b;  (float64, float64) -> float64
    let func = fn_decl(
        0,
        "fsum",
        &[(1, "a", Type::Float64), (2, "b", Type::Float64)],
        Type::Float64,
        vec![ret(bin(
            BinOp::Add,
            Type::Float64,
            ident(1, "a", Type::Float64),
            ident(2, "b", Type::Float64),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("fadd double"), "expected float add:\n{}", ir);
}

#[test]
fn int_division_is_signed() {
    let func = fn_decl(
        0,
        "quot",
        &[(1, "a", Type::Int32), (2, "b", Type::Int32)],
        Type::Int32,
        vec![ret(bin(
            BinOp::Div,
            Type::Int32,
            ident(1, "a", Type::Int32),
            ident(2, "b", Type::Int32),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("sdiv i32"), "expected signed division:\n{}", ir);
    assert!(!ir.contains("fdiv"), "int32 operands must not take the float path:\n{}", ir);
}

#[test]
fn float_remainder_uses_frem() {
    let func = fn_decl(
        0,
        "frem_fn",
        &[(1, "a", Type::Float64), (2, "b", Type::Float64)],
        Type::Float64,
        vec![ret(bin(
            BinOp::Rem,
            Type::Float64,
            ident(1, "a", Type::Float64),
            ident(2, "b", Type::Float64),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("frem double"), "expected float remainder:\n{}", ir);
}

#[test]
fn integer_shifts_pick_the_right_instruction() {
    // a << b, a >> b, a >>> b
    let body = |op| {
        ret(bin(
            op,
            Type::Int32,
            ident(1, "a", Type::Int32),
            ident(2, "b", Type::Int32),
        ))
    };
    let params = [(1u32, "a", Type::Int32), (2u32, "b", Type::Int32)];

    let ir = ir_for(fn_decl(0, "shl", &params, Type::Int32, vec![body(BinOp::Shl)]));
    assert!(ir.contains("shl i32"), "{}", ir);

    let ir = ir_for(fn_decl(0, "shr", &params, Type::Int32, vec![body(BinOp::Shr)]));
    assert!(ir.contains("ashr i32"), "sign-propagating shift:\n{}", ir);

    let ir = ir_for(fn_decl(0, "ushr", &params, Type::Int32, vec![body(BinOp::UShr)]));
    assert!(ir.contains("lshr i32"), "zero-filling shift:\n{}", ir);
}

#[test]
fn int_compare_is_signed() {
    let func = fn_decl(
        0,
        "less",
        &[(1, "a", Type::Int32), (2, "b", Type::Int32)],
        Type::Bool,
        vec![ret(bin(
            BinOp::Lt,
            Type::Bool,
            ident(1, "a", Type::Int32),
            ident(2, "b", Type::Int32),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("icmp slt i32"), "{}", ir);
}

#[test]
fn float_relational_compares_are_ordered() {
    let params = [(1u32, "a", Type::Float64), (2u32, "b", Type::Float64)];
    let body = |op| {
        ret(bin(
            op,
            Type::Bool,
            ident(1, "a", Type::Float64),
            ident(2, "b", Type::Float64),
        ))
    };

    let ir = ir_for(fn_decl(0, "flt", &params, Type::Bool, vec![body(BinOp::Lt)]));
    assert!(ir.contains("fcmp olt double"), "{}", ir);

    let ir = ir_for(fn_decl(0, "fge", &params, Type::Bool, vec![body(BinOp::Ge)]));
    assert!(ir.contains("fcmp oge double"), "{}", ir);

    let ir = ir_for(fn_decl(0, "feq", &params, Type::Bool, vec![body(BinOp::EqEq)]));
    assert!(ir.contains("fcmp oeq double"), "{}", ir);

    // NaN !== NaN must hold, so strict inequality is the one unordered
    // predicate.
    let ir = ir_for(fn_decl(0, "fne", &params, Type::Bool, vec![body(BinOp::NotEq)]));
    assert!(ir.contains("fcmp une double"), "{}", ir);
}

#[test]
fn bool_equality_lowers_to_xor() {
    let params = [(1u32, "a", Type::Bool), (2u32, "b", Type::Bool)];
    let ir = ir_for(fn_decl(
        0,
        "beq",
        &params,
        Type::Bool,
        vec![ret(bin(
            BinOp::EqEq,
            Type::Bool,
            ident(1, "a", Type::Bool),
            ident(2, "b", Type::Bool),
        ))],
    ));
    assert!(ir.contains("xor i1"), "{}", ir);
}

#[test]
fn logical_and_short_circuits_with_phi() {
    let func = fn_decl(
        0,
        "both",
        &[(1, "a", Type::Bool), (2, "b", Type::Bool)],
        Type::Bool,
        vec![ret(bin(
            BinOp::And,
            Type::Bool,
            ident(1, "a", Type::Bool),
            boolean(true),
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("and.rhs"), "{}", ir);
    assert!(ir.contains("and.merge"), "{}", ir);
    assert!(ir.contains("phi i1"), "{}", ir);
}
