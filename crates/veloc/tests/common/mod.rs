//! Shared helpers for codegen tests: typed-AST builders and compilation
//! drivers. The front-end checker is out of scope, so tests construct the
//! typed AST directly, the same shape the checker would hand the core.

#![allow(dead_code)]

use inkwell::context::Context;
use velo_ast::{
    AssignExpr, BinExpr, BinOp, BlockStmt, BoolLit, CallExpr, Expr, ExprStmt, FloatLit, FnDecl,
    ForInit, ForStmt, FunctionSig, Ident, IfStmt, IndexExpr, IntLit, MemberExpr, Module, Param,
    ReturnStmt, Span, Stmt, StrLit, SymbolId, Type, UpdateExpr, UpdateOp, VarDecl, VarDeclKind,
    WhileStmt,
};
use veloc::codegen::CodeGen;
use veloc::diagnostics::Diagnostic;

pub fn sp() -> Span {
    0..0
}

pub fn int(value: i32) -> Expr {
    Expr::Int(IntLit { value, span: sp() })
}

pub fn float(value: f64) -> Expr {
    Expr::Float(FloatLit { value, span: sp() })
}

pub fn boolean(value: bool) -> Expr {
    Expr::Bool(BoolLit { value, span: sp() })
}

pub fn string(value: &str) -> Expr {
    Expr::Str(StrLit {
        value: value.to_string(),
        span: sp(),
    })
}

pub fn ident(sym: u32, name: &str, ty: Type) -> Expr {
    Expr::Ident(Ident {
        sym: SymbolId(sym),
        name: name.to_string(),
        ty,
        span: sp(),
    })
}

pub fn bin(op: BinOp, ty: Type, left: Expr, right: Expr) -> Expr {
    Expr::Bin(Box::new(BinExpr {
        op,
        left,
        right,
        ty,
        span: sp(),
    }))
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    let ty = target.ty().clone();
    Expr::Assign(Box::new(AssignExpr {
        op: None,
        target,
        value,
        ty,
        span: sp(),
    }))
}

pub fn assign_op(op: BinOp, target: Expr, value: Expr) -> Expr {
    let ty = target.ty().clone();
    Expr::Assign(Box::new(AssignExpr {
        op: Some(op),
        target,
        value,
        ty,
        span: sp(),
    }))
}

pub fn update(op: UpdateOp, prefix: bool, arg: Expr) -> Expr {
    let ty = arg.ty().clone();
    Expr::Update(Box::new(UpdateExpr {
        op,
        prefix,
        arg,
        ty,
        span: sp(),
    }))
}

pub fn call(callee: Expr, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::Call(Box::new(CallExpr {
        callee,
        args,
        ty,
        span: sp(),
    }))
}

pub fn member(obj: Expr, prop: &str, ty: Type) -> Expr {
    Expr::Member(Box::new(MemberExpr {
        obj,
        prop: prop.to_string(),
        ty,
        span: sp(),
    }))
}

pub fn index(obj: Expr, idx: Expr, ty: Type) -> Expr {
    Expr::Index(Box::new(IndexExpr {
        obj,
        index: idx,
        ty,
        span: sp(),
    }))
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt { expr, span: sp() })
}

pub fn ret(arg: Expr) -> Stmt {
    Stmt::Return(ReturnStmt {
        arg: Some(arg),
        span: sp(),
    })
}

pub fn ret_void() -> Stmt {
    Stmt::Return(ReturnStmt {
        arg: None,
        span: sp(),
    })
}

pub fn var(sym: u32, name: &str, ty: Type, init: Option<Expr>) -> Stmt {
    Stmt::VarDecl(VarDecl {
        kind: VarDeclKind::Let,
        ident: Ident {
            sym: SymbolId(sym),
            name: name.to_string(),
            ty: ty.clone(),
            span: sp(),
        },
        ty,
        init,
        span: sp(),
    })
}

pub fn block(stmts: Vec<Stmt>) -> Stmt {
    Stmt::Block(BlockStmt { stmts, span: sp() })
}

pub fn if_stmt(test: Expr, cons: Stmt, alt: Option<Stmt>) -> Stmt {
    Stmt::If(IfStmt {
        test,
        cons: Box::new(cons),
        alt: alt.map(Box::new),
        span: sp(),
    })
}

pub fn while_stmt(test: Expr, body: Stmt) -> Stmt {
    Stmt::While(WhileStmt {
        test,
        body: Box::new(body),
        span: sp(),
    })
}

pub fn for_stmt(init: Option<ForInit>, test: Option<Expr>, update: Option<Expr>, body: Stmt) -> Stmt {
    Stmt::For(Box::new(ForStmt {
        init,
        test,
        update,
        body: Box::new(body),
        span: sp(),
    }))
}

/// The `"use velo"` annotation statement.
pub fn directive() -> Stmt {
    expr_stmt(string("use velo"))
}

/// Builds an annotated function declaration; the directive is inserted as
/// the leading statement.
pub fn fn_decl(
    sym: u32,
    name: &str,
    params: &[(u32, &str, Type)],
    ret_ty: Type,
    body: Vec<Stmt>,
) -> FnDecl {
    let sig = FunctionSig {
        params: params.iter().map(|(_, _, t)| t.clone()).collect(),
        ret: ret_ty,
    };
    let mut stmts = vec![directive()];
    stmts.extend(body);
    FnDecl {
        ident: Ident {
            sym: SymbolId(sym),
            name: name.to_string(),
            ty: Type::Function(Box::new(sig.clone())),
            span: sp(),
        },
        params: params
            .iter()
            .map(|(s, n, t)| Param {
                ident: Ident {
                    sym: SymbolId(*s),
                    name: n.to_string(),
                    ty: t.clone(),
                    span: sp(),
                },
                ty: t.clone(),
                span: sp(),
            })
            .collect(),
        sig,
        body: BlockStmt {
            stmts,
            span: sp(),
        },
        span: sp(),
    }
}

pub fn module_of(functions: Vec<FnDecl>) -> Module {
    Module {
        functions,
        span: sp(),
    }
}

/// Compiles a single function and returns the module's textual IR.
pub fn ir_for(func: FnDecl) -> String {
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    cg.compile_function(&func)
        .unwrap_or_else(|d| panic!("compilation failed: {}", d));
    cg.module.print_to_string().to_string()
}

/// Compiles a single function expecting failure; returns the diagnostic.
pub fn err_for(func: FnDecl) -> Diagnostic {
    let context = Context::create();
    let cg = CodeGen::new(&context, "test_module", "");
    match cg.compile_function(&func) {
        Ok(_) => panic!("expected compilation to fail"),
        Err(d) => d,
    }
}
