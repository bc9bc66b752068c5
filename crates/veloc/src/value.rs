//! The uniform handle for anything an expression evaluates to.
//!
//! A `Value` is either a computed SSA operand (r-value), an addressable
//! storage location (l-value), the absence of a value (`void`), or a
//! function reference. L-values expose `load` through `as_rvalue` and
//! `store` through `assign`; the three l-value shapes are a stack slot,
//! an object field slot, and an array element reached through the
//! runtime's bounds-checked accessors.
//!
//! A `Value`'s type is fixed at construction and never changes.

use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};

use velo_ast::{FunctionSig, Type};

use crate::codegen::CodeGen;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};

/// An addressable storage location.
#[derive(Debug, Clone)]
pub enum LValue<'a> {
    /// A stack slot created by a declaration or parameter materialization.
    Stack {
        ptr: PointerValue<'a>,
        llvm_ty: inkwell::types::BasicTypeEnum<'a>,
        ty: Type,
    },
    /// An 8-byte field slot of a runtime object.
    Field {
        base: PointerValue<'a>,
        index: u32,
        ty: Type,
    },
    /// An array element, loaded and stored through the runtime.
    Element {
        array: PointerValue<'a>,
        index: IntValue<'a>,
        elem: Type,
    },
}

impl LValue<'_> {
    pub fn ty(&self) -> &Type {
        match self {
            LValue::Stack { ty, .. } => ty,
            LValue::Field { ty, .. } => ty,
            LValue::Element { elem, .. } => elem,
        }
    }
}

/// Result of lowering one expression.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    /// A computed SSA operand of known type.
    RValue { value: BasicValueEnum<'a>, ty: Type },
    /// No value (statements, void calls).
    Void,
    /// An addressable slot.
    LValue(LValue<'a>),
    /// A callable descriptor.
    FunctionRef {
        function: FunctionValue<'a>,
        sig: FunctionSig,
    },
}

impl<'a> Value<'a> {
    pub fn rvalue(value: BasicValueEnum<'a>, ty: Type) -> Self {
        Value::RValue { value, ty }
    }

    /// The static type of this value.
    pub fn ty(&self) -> Type {
        match self {
            Value::RValue { ty, .. } => ty.clone(),
            Value::Void => Type::Void,
            Value::LValue(lv) => lv.ty().clone(),
            Value::FunctionRef { sig, .. } => Type::Function(Box::new(sig.clone())),
        }
    }

    /// True iff this value can be assigned to.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Value::LValue(_))
    }

    /// The callable signature, for function references.
    pub fn signature(&self) -> Option<&FunctionSig> {
        match self {
            Value::FunctionRef { sig, .. } => Some(sig),
            _ => None,
        }
    }

    /// Coerces to an SSA operand: identity for r-values, a load for
    /// l-values. Void and function references have no operand form.
    pub fn as_rvalue(&self, cg: &CodeGen<'a>) -> DiagnosticResult<BasicValueEnum<'a>> {
        match self {
            Value::RValue { value, .. } => Ok(*value),
            Value::Void => Err(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                "void expression used where a value is required",
            )),
            Value::FunctionRef { .. } => Err(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                "function reference used where a value is required",
            )),
            Value::LValue(lv) => match lv {
                LValue::Stack { ptr, llvm_ty, .. } => cg
                    .builder
                    .build_load(*llvm_ty, *ptr, "load")
                    .map_err(|_| Diagnostic::internal("load from stack slot failed")),
                LValue::Field { base, index, ty } => {
                    let addr = cg.field_address(*base, *index)?;
                    let llvm_ty = cg.basic_type_of(ty).ok_or_else(|| {
                        Diagnostic::new(DiagnosticKind::TypeMismatch, "void-typed field")
                    })?;
                    cg.builder
                        .build_load(llvm_ty, addr, "field.load")
                        .map_err(|_| Diagnostic::internal("load from field slot failed"))
                }
                LValue::Element { array, index, elem } => {
                    let getter = cg.array_get(elem)?;
                    let call = cg
                        .builder
                        .build_call(getter, &[(*array).into(), (*index).into()], "elem.get")
                        .map_err(|_| Diagnostic::internal("array get call failed"))?;
                    call.try_as_basic_value().left().ok_or_else(|| {
                        Diagnostic::internal("array get returned no value")
                    })
                }
            },
        }
    }

    /// Stores `value` into this l-value. The caller has already coerced
    /// `value` to this value's type.
    pub fn assign(&self, cg: &CodeGen<'a>, value: BasicValueEnum<'a>) -> DiagnosticResult<()> {
        let lv = match self {
            Value::LValue(lv) => lv,
            _ => {
                return Err(Diagnostic::new(
                    DiagnosticKind::ReadOnlyTarget,
                    "assignment target is not assignable",
                ));
            }
        };
        match lv {
            LValue::Stack { ptr, .. } => {
                cg.builder
                    .build_store(*ptr, value)
                    .map_err(|_| Diagnostic::internal("store to stack slot failed"))?;
            }
            LValue::Field { base, index, .. } => {
                let addr = cg.field_address(*base, *index)?;
                cg.builder
                    .build_store(addr, value)
                    .map_err(|_| Diagnostic::internal("store to field slot failed"))?;
            }
            LValue::Element { array, index, elem } => {
                let setter = cg.array_set(elem)?;
                cg.builder
                    .build_call(
                        setter,
                        &[(*array).into(), (*index).into(), value.into()],
                        "elem.set",
                    )
                    .map_err(|_| Diagnostic::internal("array set call failed"))?;
            }
        }
        Ok(())
    }
}
