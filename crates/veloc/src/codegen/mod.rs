//! Top-level codegen module
//!
//! This module provides the `CodeGen` structure: the per-function emission
//! context described by the compiler design. It holds the LLVM `Context`,
//! `Module` and `Builder`, caches for frequently used LLVM types and
//! interned string literals, the lexical scope chain mapping resolved
//! symbols to stack slots, the landing-pad stack used by `break` and
//! `continue`, and the return context that routes every `return` through
//! the single function epilogue. The pipeline is organized across
//! submodules:
//! - `emit`    : function compilation (prologue, body, epilogue, verify)
//! - `expr`    : expression lowering behind the syntactic dispatcher
//! - `stmt`    : statement lowering
//! - `helpers` : coercions, conditions, phi merges, field addressing
//! - `runtime` : runtime extern declarations and math intrinsics
//!
//! Extern declarations are added lazily on first reference; a later
//! reference with a different signature is a hard error, so the ABI types
//! of runtime helpers stay consistent across the module.

use inkwell::AddressSpace;
use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::{BasicType, BasicTypeEnum, FunctionType};
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use velo_ast::{FunctionSig, SymbolId, Type};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};
use crate::types::TypeResolver;

pub mod emit;
pub mod expr;
pub mod helpers;
pub mod runtime;
pub mod stmt;

/// A storage slot for a local or parameter: the alloca pointer, the LLVM
/// type stored in it, and the declared Velo type.
#[derive(Debug, Clone)]
pub struct Slot<'a> {
    pub ptr: PointerValue<'a>,
    pub llvm_ty: BasicTypeEnum<'a>,
    pub ty: Type,
}

/// Landing pad for an enclosing loop or switch.
///
/// Loops push both targets; switches push only a break target. `continue`
/// binds to the nearest pad that has a continue target, `break` to the
/// nearest pad of either kind.
#[derive(Debug, Clone, Copy)]
pub struct LandingPad<'a> {
    pub continue_block: Option<BasicBlock<'a>>,
    pub break_block: BasicBlock<'a>,
}

/// Per-function return context. The epilogue block owns the single return
/// instruction; every `return` statement records its incoming value and
/// predecessor block here and branches to the epilogue.
#[derive(Debug)]
pub struct ReturnCtx<'a> {
    pub epilogue: BasicBlock<'a>,
    pub ret_ty: Type,
    pub incomings: Vec<(BasicValueEnum<'a>, BasicBlock<'a>)>,
}

/// A Velo function declared in the module, callable from other candidates.
#[derive(Debug, Clone)]
pub struct DeclaredFn<'a> {
    pub function: FunctionValue<'a>,
    pub sig: FunctionSig,
}

/// Main code generation context holding LLVM state and caches.
pub struct CodeGen<'a> {
    /// LLVM context
    pub context: &'a Context,
    /// LLVM module being generated
    pub module: Module<'a>,
    /// LLVM IR builder; its insertion block is a single-writer resource
    pub builder: Builder<'a>,
    /// Type classification queries over the typed AST
    pub resolver: TypeResolver,
    /// Cached LLVM type: f64
    pub f64_t: inkwell::types::FloatType<'a>,
    /// Cached LLVM type: i64
    pub i64_t: inkwell::types::IntType<'a>,
    /// Cached LLVM type: i32
    pub i32_t: inkwell::types::IntType<'a>,
    /// Cached LLVM type: i8
    pub i8_t: inkwell::types::IntType<'a>,
    /// Cached LLVM type: bool (i1)
    pub bool_t: inkwell::types::IntType<'a>,
    /// Cached LLVM type: opaque pointer
    pub ptr_t: inkwell::types::PointerType<'a>,
    /// Next unique string literal ID
    pub next_str_id: Cell<u32>,
    /// Cached string literal globals, keyed by content
    pub string_literals: RefCell<HashMap<String, PointerValue<'a>>>,
    /// Lexical scope chain; lookup walks outward
    pub scopes: RefCell<Vec<HashMap<SymbolId, Slot<'a>>>>,
    /// Landing-pad stack for enclosing loops and switches
    pub landing_pads: RefCell<Vec<LandingPad<'a>>>,
    /// Return context of the function currently being compiled
    pub ret: RefCell<Option<ReturnCtx<'a>>>,
    /// Velo functions declared in this module, keyed by symbol
    pub functions: RefCell<HashMap<SymbolId, DeclaredFn<'a>>>,
    /// Source text used to map spans for diagnostics
    pub source: &'a str,
}

impl<'a> CodeGen<'a> {
    pub fn new(context: &'a Context, module_name: &str, source: &'a str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        CodeGen {
            context,
            module,
            builder,
            resolver: TypeResolver::new(),
            f64_t: context.f64_type(),
            i64_t: context.i64_type(),
            i32_t: context.i32_type(),
            i8_t: context.i8_type(),
            bool_t: context.bool_type(),
            ptr_t: context.ptr_type(AddressSpace::default()),
            next_str_id: Cell::new(0),
            string_literals: RefCell::new(HashMap::new()),
            scopes: RefCell::new(Vec::new()),
            landing_pads: RefCell::new(Vec::new()),
            ret: RefCell::new(None),
            functions: RefCell::new(HashMap::new()),
            source,
        }
    }

    /// Pushes a lexical scope; the returned guard pops it on drop, so the
    /// scope chain is restored on every exit path, including errors.
    pub fn enter_scope<'c>(&'c self) -> ScopeGuard<'c, 'a> {
        self.scopes.borrow_mut().push(HashMap::new());
        ScopeGuard { cg: self }
    }

    /// Installs a slot for `sym` in the innermost scope.
    pub fn define(&self, sym: SymbolId, slot: Slot<'a>) {
        if let Some(scope) = self.scopes.borrow_mut().last_mut() {
            scope.insert(sym, slot);
        }
    }

    /// Looks up a slot for `sym`, walking the scope chain outward.
    pub fn lookup(&self, sym: SymbolId) -> Option<Slot<'a>> {
        for scope in self.scopes.borrow().iter().rev() {
            if let Some(slot) = scope.get(&sym) {
                return Some(slot.clone());
            }
        }
        None
    }

    /// Pushes a loop landing pad (continue and break targets).
    pub fn enter_loop<'c>(
        &'c self,
        continue_block: BasicBlock<'a>,
        break_block: BasicBlock<'a>,
    ) -> LandingPadGuard<'c, 'a> {
        self.landing_pads.borrow_mut().push(LandingPad {
            continue_block: Some(continue_block),
            break_block,
        });
        LandingPadGuard { cg: self }
    }

    /// Pushes a switch landing pad (break target only).
    pub fn enter_switch<'c>(&'c self, break_block: BasicBlock<'a>) -> LandingPadGuard<'c, 'a> {
        self.landing_pads.borrow_mut().push(LandingPad {
            continue_block: None,
            break_block,
        });
        LandingPadGuard { cg: self }
    }

    /// Break target of the nearest enclosing loop or switch.
    pub fn nearest_break(&self) -> Option<BasicBlock<'a>> {
        self.landing_pads.borrow().last().map(|p| p.break_block)
    }

    /// Continue target of the nearest enclosing loop (switch pads are
    /// transparent to `continue`).
    pub fn nearest_continue(&self) -> Option<BasicBlock<'a>> {
        self.landing_pads
            .borrow()
            .iter()
            .rev()
            .find_map(|p| p.continue_block)
    }

    /// Declares (or reuses) an external function. The first reference
    /// fixes the signature; a later reference with a different signature
    /// is an `ExternSignatureConflict`.
    pub fn declare_extern(
        &self,
        name: &str,
        fn_type: FunctionType<'a>,
    ) -> DiagnosticResult<FunctionValue<'a>> {
        if let Some(existing) = self.module.get_function(name) {
            if existing.get_type() == fn_type {
                return Ok(existing);
            }
            return Err(Diagnostic::new(
                DiagnosticKind::ExternSignatureConflict,
                format!("conflicting signatures for extern '{}'", name),
            ));
        }
        Ok(self.module.add_function(name, fn_type, None))
    }

    /// Maps a Velo type to its LLVM ABI type; `None` for `void`.
    pub fn basic_type_of(&self, ty: &Type) -> Option<BasicTypeEnum<'a>> {
        match ty {
            Type::Int32 => Some(self.i32_t.as_basic_type_enum()),
            Type::Float64 => Some(self.f64_t.as_basic_type_enum()),
            Type::Bool => Some(self.bool_t.as_basic_type_enum()),
            Type::Void => None,
            Type::String | Type::Object(_) | Type::Array(_) | Type::Function(_) => {
                Some(self.ptr_t.as_basic_type_enum())
            }
        }
    }

    /// Lowers a function signature to an LLVM function type.
    pub fn fn_type_of(&self, sig: &FunctionSig) -> DiagnosticResult<FunctionType<'a>> {
        let mut params: Vec<inkwell::types::BasicMetadataTypeEnum<'a>> = Vec::new();
        for p in &sig.params {
            let ty = self.basic_type_of(p).ok_or_else(|| {
                Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    "void is not a valid parameter type",
                )
            })?;
            params.push(ty.into());
        }
        Ok(match self.basic_type_of(&sig.ret) {
            Some(ret) => ret.fn_type(&params, false),
            None => self.context.void_type().fn_type(&params, false),
        })
    }

    /// The language-defined zero value for a type (used for uninitialized
    /// declarations): `0`, `0.0`, `false`, or the null reference.
    pub fn zero_value(&self, ty: &Type) -> Option<BasicValueEnum<'a>> {
        match ty {
            Type::Int32 => Some(self.i32_t.const_zero().into()),
            Type::Float64 => Some(self.f64_t.const_zero().into()),
            Type::Bool => Some(self.bool_t.const_zero().into()),
            Type::Void => None,
            Type::String | Type::Object(_) | Type::Array(_) | Type::Function(_) => {
                Some(self.ptr_t.const_null().into())
            }
        }
    }

    /// Interns a string literal as a private constant global, reusing the
    /// global for identical contents.
    pub fn intern_string_literal(&self, value: &str) -> PointerValue<'a> {
        if let Some(ptr) = self.string_literals.borrow().get(value) {
            return *ptr;
        }
        let id = self.next_str_id.get();
        self.next_str_id.set(id + 1);
        let name = format!("strlit.{}", id);
        let init = self.context.const_string(value.as_bytes(), false);
        let global = self.module.add_global(init.get_type(), None, &name);
        global.set_initializer(&init);
        global.set_constant(true);
        let ptr = global.as_pointer_value();
        self.string_literals
            .borrow_mut()
            .insert(value.to_string(), ptr);
        ptr
    }
}

/// Pops the innermost scope when dropped.
pub struct ScopeGuard<'c, 'a> {
    cg: &'c CodeGen<'a>,
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.cg.scopes.borrow_mut().pop();
    }
}

/// Pops the innermost landing pad when dropped.
pub struct LandingPadGuard<'c, 'a> {
    cg: &'c CodeGen<'a>,
}

impl Drop for LandingPadGuard<'_, '_> {
    fn drop(&mut self) {
        self.cg.landing_pads.borrow_mut().pop();
    }
}
