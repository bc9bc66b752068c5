// Module assembly: directive filtering, per-function error aggregation,
// extern identity, determinism.

use inkwell::context::Context;
use velo_ast::{BreakStmt, Stmt, Type};
use veloc::codegen::CodeGen;
use veloc::diagnostics::DiagnosticKind;

use super::common;
use common::{fn_decl, ident, int, ir_for, module_of, ret};

/// A function without the leading directive.
fn unannotated(sym: u32, name: &str) -> velo_ast::FnDecl {
    let mut func = fn_decl(sym, name, &[], Type::Int32, vec![ret(int(1))]);
    func.body.stmts.remove(0);
    func
}

#[test]
fn only_annotated_functions_are_compiled() {
    let module = module_of(vec![
        fn_decl(0, "fast", &[], Type::Int32, vec![ret(int(1))]),
        unannotated(1, "slow"),
    ]);
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let assembled = veloc::assembler::assemble(&cg, &module).expect("assembly");
    assert_eq!(assembled.exports, vec!["fast"]);
    assert!(cg.module.get_function("fast").is_some());
    assert!(cg.module.get_function("slow").is_none());
}

#[test]
fn one_malformed_function_does_not_abort_the_rest() {
    let good = fn_decl(0, "good", &[], Type::Int32, vec![ret(int(1))]);
    let bad = fn_decl(
        1,
        "bad",
        &[],
        Type::Void,
        vec![Stmt::Break(BreakStmt { span: common::sp() })],
    );
    let module = module_of(vec![bad, good]);

    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    veloc::diagnostics::set_diagnostics_enabled(false);
    let errors = veloc::assembler::assemble(&cg, &module).expect_err("bad function must fail");
    veloc::diagnostics::set_diagnostics_enabled(true);

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].function, "bad");
    assert_eq!(
        errors[0].diagnostic.kind,
        DiagnosticKind::UnstructuredControlFlow
    );
    // The good function still compiled.
    let good_fn = cg.module.get_function("good").expect("good function present");
    assert!(good_fn.verify(false));
}

#[test]
fn extern_signature_conflict_is_detected() {
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let int_ty = cg.i32_t.fn_type(&[], false);
    let float_ty = cg.f64_t.fn_type(&[], false);

    cg.declare_extern("helper", int_ty).expect("first declaration wins");
    // Same signature is a reuse, not a conflict.
    cg.declare_extern("helper", int_ty).expect("idempotent redeclaration");
    let err = cg
        .declare_extern("helper", float_ty)
        .expect_err("conflicting signature");
    assert_eq!(err.kind, DiagnosticKind::ExternSignatureConflict);
}

#[test]
fn emission_is_deterministic() {
    let build = || {
        ir_for(fn_decl(
            0,
            "same",
            &[(1, "a", Type::Int32), (2, "b", Type::Int32)],
            Type::Int32,
            vec![ret(common::bin(
                velo_ast::BinOp::Add,
                Type::Int32,
                ident(1, "a", Type::Int32),
                ident(2, "b", Type::Int32),
            ))],
        ))
    };
    assert_eq!(build(), build(), "same typed AST must produce identical IR");
}

#[test]
fn scope_and_landing_pad_stacks_are_restored() {
    let func = fn_decl(
        0,
        "loops",
        &[(1, "c", Type::Bool)],
        Type::Void,
        vec![common::while_stmt(
            ident(1, "c", Type::Bool),
            common::block(vec![common::expr_stmt(int(0))]),
        )],
    );
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    cg.compile_function(&func).expect("compile");
    assert!(cg.scopes.borrow().is_empty(), "scope chain must be restored");
    assert!(
        cg.landing_pads.borrow().is_empty(),
        "landing-pad stack must be restored"
    );
}

#[test]
fn stacks_are_restored_on_error_paths_too() {
    // The break sits inside a loop body block, so scopes and pads are
    // live when the nested error is raised.
    let func = fn_decl(
        0,
        "broken",
        &[(1, "c", Type::Bool)],
        Type::Int32,
        vec![common::while_stmt(
            ident(1, "c", Type::Bool),
            common::block(vec![ret(ident(99, "ghost", Type::Int32))]),
        )],
    );
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    let err = cg.compile_function(&func).expect_err("unresolved symbol");
    assert_eq!(err.kind, DiagnosticKind::UnresolvedSymbol);
    assert!(cg.scopes.borrow().is_empty());
    assert!(cg.landing_pads.borrow().is_empty());
}
