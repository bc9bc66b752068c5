// Function compilation: signatures, parameters as mutable slots, calls
// between candidates, argument coercion, math intrinsics.

use anyhow::Result;
use inkwell::context::Context;
use velo_ast::{FunctionSig, Type};
use veloc::codegen::CodeGen;
use veloc::diagnostics::DiagnosticKind;

use super::common;
use common::{
    assign, call, expr_stmt, float, fn_decl, ident, int, ir_for, member, module_of, ret,
};

#[test]
fn parameters_are_materialized_into_slots() {
    let func = fn_decl(
        0,
        "id",
        &[(1, "a", Type::Int32)],
        Type::Int32,
        vec![ret(ident(1, "a", Type::Int32))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("alloca i32"), "{}", ir);
    assert!(ir.contains("store i32"), "{}", ir);
}

#[test]
fn parameters_are_assignable() {
    // a = 5; return a;
    let func = fn_decl(
        0,
        "mutate",
        &[(1, "a", Type::Int32)],
        Type::Int32,
        vec![
            expr_stmt(assign(ident(1, "a", Type::Int32), int(5))),
            ret(ident(1, "a", Type::Int32)),
        ],
    );
    let ir = ir_for(func);
    assert_eq!(ir.matches("store i32").count(), 2, "{}", ir);
}

#[test]
fn calls_between_candidates_resolve_in_any_order() -> Result<()> {
    // caller is declared before callee in the module.
    let callee_sig = FunctionSig {
        params: vec![Type::Int32],
        ret: Type::Int32,
    };
    let caller = fn_decl(
        0,
        "caller",
        &[(1, "x", Type::Int32)],
        Type::Int32,
        vec![ret(call(
            ident(10, "callee", Type::Function(Box::new(callee_sig))),
            vec![ident(1, "x", Type::Int32)],
            Type::Int32,
        ))],
    );
    let callee = fn_decl(
        10,
        "callee",
        &[(11, "y", Type::Int32)],
        Type::Int32,
        vec![ret(ident(11, "y", Type::Int32))],
    );
    let module = module_of(vec![caller, callee]);

    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let assembled = veloc::assembler::assemble(&cg, &module)
        .map_err(|errors| anyhow::anyhow!("assembly failed with {} errors", errors.len()))?;
    assert_eq!(assembled.exports, vec!["caller", "callee"]);
    let ir = cg.module.print_to_string().to_string();
    assert!(ir.contains("call i32 @callee"), "{}", ir);
    Ok(())
}

#[test]
fn int_arguments_widen_to_float_parameters() -> Result<()> {
    let callee_sig = FunctionSig {
        params: vec![Type::Float64],
        ret: Type::Float64,
    };
    let caller = fn_decl(
        0,
        "caller",
        &[],
        Type::Float64,
        vec![ret(call(
            ident(10, "sink", Type::Function(Box::new(callee_sig))),
            vec![int(3)],
            Type::Float64,
        ))],
    );
    let callee = fn_decl(
        10,
        "sink",
        &[(11, "y", Type::Float64)],
        Type::Float64,
        vec![ret(ident(11, "y", Type::Float64))],
    );
    let module = module_of(vec![caller, callee]);

    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    veloc::assembler::assemble(&cg, &module)
        .map_err(|errors| anyhow::anyhow!("assembly failed with {} errors", errors.len()))?;
    let ir = cg.module.print_to_string().to_string();
    assert!(ir.contains("sitofp i32"), "widening before the call:\n{}", ir);
    Ok(())
}

#[test]
fn float_arguments_do_not_narrow_to_int_parameters() {
    let callee_sig = FunctionSig {
        params: vec![Type::Int32],
        ret: Type::Int32,
    };
    let caller = fn_decl(
        0,
        "caller",
        &[],
        Type::Int32,
        vec![ret(call(
            ident(10, "sink", Type::Function(Box::new(callee_sig))),
            vec![float(3.5)],
            Type::Int32,
        ))],
    );
    let callee = fn_decl(
        10,
        "sink",
        &[(11, "y", Type::Int32)],
        Type::Int32,
        vec![ret(ident(11, "y", Type::Int32))],
    );
    let module = module_of(vec![caller, callee]);

    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let errors = veloc::assembler::assemble(&cg, &module).expect_err("narrowing must fail");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].function, "caller");
    assert_eq!(errors[0].diagnostic.kind, DiagnosticKind::TypeMismatch);
}

#[test]
fn arity_mismatch_is_a_type_mismatch() {
    let callee_sig = FunctionSig {
        params: vec![Type::Int32],
        ret: Type::Int32,
    };
    let caller = fn_decl(
        0,
        "caller",
        &[],
        Type::Int32,
        vec![ret(call(
            ident(10, "sink", Type::Function(Box::new(callee_sig))),
            vec![int(1), int(2)],
            Type::Int32,
        ))],
    );
    let callee = fn_decl(
        10,
        "sink",
        &[(11, "y", Type::Int32)],
        Type::Int32,
        vec![ret(ident(11, "y", Type::Int32))],
    );
    let module = module_of(vec![caller, callee]);

    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let errors = veloc::assembler::assemble(&cg, &module).expect_err("arity must fail");
    assert_eq!(errors[0].diagnostic.kind, DiagnosticKind::TypeMismatch);
}

#[test]
fn unresolved_identifier_reports_the_resolver_bug() {
    let func = fn_decl(
        0,
        "lost",
        &[],
        Type::Int32,
        vec![ret(ident(99, "ghost", Type::Int32))],
    );
    let d = common::err_for(func);
    assert_eq!(d.kind, DiagnosticKind::UnresolvedSymbol);
}

#[test]
fn math_members_lower_to_float_intrinsics() {
    // return Math.sqrt(x);
    let func = fn_decl(
        0,
        "root",
        &[(1, "x", Type::Float64)],
        Type::Float64,
        vec![ret(call(
            member(
                ident(50, "Math", Type::Float64),
                "sqrt",
                Type::Float64,
            ),
            vec![ident(1, "x", Type::Float64)],
            Type::Float64,
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("llvm.sqrt.f64"), "{}", ir);
}

#[test]
fn math_pow_takes_two_arguments() {
    let func = fn_decl(
        0,
        "power",
        &[(1, "x", Type::Float64)],
        Type::Float64,
        vec![ret(call(
            member(
                ident(50, "Math", Type::Float64),
                "pow",
                Type::Float64,
            ),
            vec![ident(1, "x", Type::Float64), float(2.0)],
            Type::Float64,
        ))],
    );
    let ir = ir_for(func);
    assert!(ir.contains("llvm.pow.f64"), "{}", ir);
}
