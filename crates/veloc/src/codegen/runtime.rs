//! Runtime extern declarations.
//!
//! The garbage-collected runtime (objects, arrays, strings) is linked from
//! a precompiled archive; the compiler only declares its functions. Names
//! follow the runtime's mangling schema: `ArrayI<elem>` selects the array
//! template instance (`b` bool, `i` int32, `d` float64, `Pv` ref) and the
//! suffix encodes the parameter types, e.g. `ArrayIi_constructorPii`,
//! `ArrayId_geti`, `ArrayIPv_setiPv`. Signatures are fixed ABI; declaring
//! the same name twice with different types is a compile error.

use inkwell::types::BasicType;
use inkwell::values::FunctionValue;

use velo_ast::Type;

use crate::diagnostics::DiagnosticResult;
use crate::types::elem_mangle;

use super::CodeGen;

/// Parameter-position mangle for an array element type (`Pv` elements
/// appear as `v` behind the pointer prefix: `constructorPvi`).
fn elem_arg_mangle(ty: &Type) -> &'static str {
    match ty {
        Type::Bool => "b",
        Type::Int32 => "i",
        Type::Float64 => "d",
        _ => "v",
    }
}

impl<'a> CodeGen<'a> {
    /// The LLVM ABI type of an array element as seen by the runtime.
    pub(crate) fn elem_abi(&self, elem: &Type) -> inkwell::types::BasicTypeEnum<'a> {
        match elem {
            Type::Bool => self.bool_t.as_basic_type_enum(),
            Type::Int32 => self.i32_t.as_basic_type_enum(),
            Type::Float64 => self.f64_t.as_basic_type_enum(),
            _ => self.ptr_t.as_basic_type_enum(),
        }
    }

    /// `ArrayI?_constructori(i32 size) -> Array*`
    pub fn array_ctor_sized(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_constructori", elem_mangle(elem));
        let fn_type = self.ptr_t.fn_type(&[self.i32_t.into()], false);
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_constructorP?i(elem* values, i32 size) -> Array*`
    pub fn array_ctor_elems(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!(
            "ArrayI{}_constructorP{}i",
            elem_mangle(elem),
            elem_arg_mangle(elem)
        );
        let fn_type = self
            .ptr_t
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_geti(Array*, i32 index) -> elem` (bounds-checked).
    pub fn array_get(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_geti", elem_mangle(elem));
        let fn_type = self
            .elem_abi(elem)
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_seti?(Array*, i32 index, elem value)` (bounds-checked).
    pub fn array_set(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_seti{}", elem_mangle(elem), elem_mangle(elem));
        let fn_type = self.context.void_type().fn_type(
            &[
                self.ptr_t.into(),
                self.i32_t.into(),
                self.elem_abi(elem).into(),
            ],
            false,
        );
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_pushP?i(Array*, elem* values, i32 count) -> i32`
    pub fn array_push(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_pushP{}i", elem_mangle(elem), elem_arg_mangle(elem));
        let fn_type = self.i32_t.fn_type(
            &[self.ptr_t.into(), self.ptr_t.into(), self.i32_t.into()],
            false,
        );
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_pop(Array*) -> elem`
    pub fn array_pop(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_pop", elem_mangle(elem));
        let fn_type = self.elem_abi(elem).fn_type(&[self.ptr_t.into()], false);
        self.declare_extern(&name, fn_type)
    }

    /// `ArrayI?_length(Array*) -> i32`
    pub fn array_length(&self, elem: &Type) -> DiagnosticResult<FunctionValue<'a>> {
        let name = format!("ArrayI{}_length", elem_mangle(elem));
        let fn_type = self.i32_t.fn_type(&[self.ptr_t.into()], false);
        self.declare_extern(&name, fn_type)
    }

    /// `Object_createi(i32 fieldCount) -> ptr` — allocates a
    /// garbage-collected object with `fieldCount` zeroed 8-byte slots.
    pub fn object_create(&self) -> DiagnosticResult<FunctionValue<'a>> {
        let fn_type = self.ptr_t.fn_type(&[self.i32_t.into()], false);
        self.declare_extern("Object_createi", fn_type)
    }

    /// `String_constructorPci(i8* chars, i32 length) -> ptr` — interns or
    /// allocates a runtime string from constant bytes.
    pub fn string_ctor(&self) -> DiagnosticResult<FunctionValue<'a>> {
        let fn_type = self
            .ptr_t
            .fn_type(&[self.ptr_t.into(), self.i32_t.into()], false);
        self.declare_extern("String_constructorPci", fn_type)
    }

    /// A unary f64 LLVM float intrinsic (`llvm.sqrt.f64`, ...).
    pub fn math_unary(&self, intrinsic: &str) -> DiagnosticResult<FunctionValue<'a>> {
        let fn_type = self.f64_t.fn_type(&[self.f64_t.into()], false);
        self.declare_extern(intrinsic, fn_type)
    }

    /// A binary f64 LLVM float intrinsic (`llvm.pow.f64`).
    pub fn math_binary(&self, intrinsic: &str) -> DiagnosticResult<FunctionValue<'a>> {
        let fn_type = self
            .f64_t
            .fn_type(&[self.f64_t.into(), self.f64_t.into()], false);
        self.declare_extern(intrinsic, fn_type)
    }
}
