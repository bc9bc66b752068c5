//! Type classification for code generation.
//!
//! The front-end checker resolves a static type for every expression; this
//! module wraps the typed AST with the small query surface the generators
//! dispatch on. The classification lattice is deliberately narrow:
//! `int_like` is a strict subset of `number_like`, and every
//! type-dispatched operator must test `int_like` before `number_like` so
//! an `int32` operand never takes the float path.

use velo_ast::{Expr, FunctionSig, SymbolId, Type};

/// Stateless wrapper over the front-end's type assignments.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeResolver;

impl TypeResolver {
    pub fn new() -> Self {
        TypeResolver
    }

    /// The static type of an expression node.
    pub fn type_of<'t>(&self, expr: &'t Expr) -> &'t Type {
        expr.ty()
    }

    /// True for the explicitly-annotated 32-bit integer type.
    pub fn is_int_like(&self, ty: &Type) -> bool {
        matches!(ty, Type::Int32)
    }

    /// True for any numeric type. `int_like` implies `number_like`;
    /// callers must test `is_int_like` first.
    pub fn is_number_like(&self, ty: &Type) -> bool {
        matches!(ty, Type::Int32 | Type::Float64)
    }

    pub fn is_bool(&self, ty: &Type) -> bool {
        matches!(ty, Type::Bool)
    }

    /// True for runtime-managed reference types.
    pub fn is_ref(&self, ty: &Type) -> bool {
        matches!(ty, Type::String | Type::Object(_) | Type::Array(_))
    }

    /// The resolved symbol of an identifier node, if the node is one.
    pub fn symbol_of(&self, expr: &Expr) -> Option<SymbolId> {
        match expr {
            Expr::Ident(id) => Some(id.sym),
            _ => None,
        }
    }

    /// The callable signature of a node typed as a function.
    pub fn signature_of<'t>(&self, expr: &'t Expr) -> Option<&'t FunctionSig> {
        match expr.ty() {
            Type::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

/// Short display name for a type, used in diagnostics.
pub fn type_name(ty: &Type) -> &'static str {
    match ty {
        Type::Int32 => "int",
        Type::Float64 => "number",
        Type::Bool => "boolean",
        Type::Void => "void",
        Type::String => "string",
        Type::Object(_) => "object",
        Type::Array(_) => "array",
        Type::Function(_) => "function",
    }
}

/// The runtime mangle letter for an array element type, following the
/// runtime archive's naming schema (`ArrayIi_geti`, `ArrayId_setid`, ...).
pub fn elem_mangle(ty: &Type) -> &'static str {
    match ty {
        Type::Bool => "b",
        Type::Int32 => "i",
        Type::Float64 => "d",
        _ => "Pv",
    }
}
