//! Small reusable emission utilities shared by the generators.

use inkwell::values::{BasicValueEnum, IntValue, PointerValue};

use velo_ast::Type;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};
use crate::types::type_name;

use super::CodeGen;

impl<'a> CodeGen<'a> {
    /// Implicit numeric promotion: identity for equal types, widening
    /// int32 -> float64. Narrowing float -> int is never implicit; the
    /// language's coercion for that is the explicit `| 0` idiom.
    pub fn coerce(
        &self,
        value: BasicValueEnum<'a>,
        from: &Type,
        to: &Type,
        span: usize,
    ) -> DiagnosticResult<BasicValueEnum<'a>> {
        if from == to {
            return Ok(value);
        }
        match (from, to) {
            (Type::Int32, Type::Float64) => self
                .builder
                .build_signed_int_to_float(value.into_int_value(), self.f64_t, "i2f")
                .map(Into::into)
                .map_err(|_| Diagnostic::internal("int to float promotion failed")),
            (Type::Float64, Type::Int32) => Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "cannot implicitly narrow number to int",
                span,
            )
            .note("use `| 0` to truncate explicitly")),
            _ => Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!("cannot coerce {} to {}", type_name(from), type_name(to)),
                span,
            )),
        }
    }

    /// Materializes a condition operand as `i1`. Conditions in the
    /// accepted subset are statically boolean.
    pub fn to_condition(
        &self,
        value: BasicValueEnum<'a>,
        ty: &Type,
        span: usize,
    ) -> DiagnosticResult<IntValue<'a>> {
        if self.resolver.is_bool(ty) {
            Ok(value.into_int_value())
        } else {
            Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!("condition must be boolean, found {}", type_name(ty)),
                span,
            ))
        }
    }

    /// Address of the `index`-th 8-byte field slot of a runtime object.
    pub fn field_address(
        &self,
        base: PointerValue<'a>,
        index: u32,
    ) -> DiagnosticResult<PointerValue<'a>> {
        let base_int = self
            .builder
            .build_ptr_to_int(base, self.i64_t, "obj.addr")
            .map_err(|_| Diagnostic::internal("ptr_to_int failed"))?;
        let offset = self.i64_t.const_int(index as u64 * 8, false);
        let addr = self
            .builder
            .build_int_add(base_int, offset, "field.addr")
            .map_err(|_| Diagnostic::internal("int_add failed"))?;
        self.builder
            .build_int_to_ptr(addr, self.ptr_t, "field.ptr")
            .map_err(|_| Diagnostic::internal("int_to_ptr failed"))
    }

    /// In-memory size of an array element as the runtime lays it out.
    pub(crate) fn elem_size(elem: &Type) -> u64 {
        match elem {
            Type::Bool => 1,
            Type::Int32 => 4,
            _ => 8,
        }
    }

    /// Allocates a stack buffer of `values` with the element layout the
    /// runtime's `constructorP?i`/`pushP?i` entry points expect.
    pub fn stack_buffer(
        &self,
        elem: &Type,
        values: &[BasicValueEnum<'a>],
    ) -> DiagnosticResult<PointerValue<'a>> {
        use inkwell::types::BasicType;

        let elem_ll = self.elem_abi(elem);
        let buf_ty = elem_ll.array_type(values.len() as u32);
        let buf = self
            .builder
            .build_alloca(buf_ty, "elems")
            .map_err(|_| Diagnostic::internal("alloca failed for element buffer"))?;
        let size = Self::elem_size(elem);
        let base_int = self
            .builder
            .build_ptr_to_int(buf, self.i64_t, "elems.addr")
            .map_err(|_| Diagnostic::internal("ptr_to_int failed"))?;
        for (i, v) in values.iter().enumerate() {
            let offset = self.i64_t.const_int(i as u64 * size, false);
            let addr = self
                .builder
                .build_int_add(base_int, offset, "elem.addr")
                .map_err(|_| Diagnostic::internal("int_add failed"))?;
            let ptr = self
                .builder
                .build_int_to_ptr(addr, self.ptr_t, "elem.ptr")
                .map_err(|_| Diagnostic::internal("int_to_ptr failed"))?;
            self.builder
                .build_store(ptr, *v)
                .map_err(|_| Diagnostic::internal("store into element buffer failed"))?;
        }
        Ok(buf)
    }

    /// A runtime string value built from constant bytes: the contents are
    /// interned as a module global and materialized through the runtime's
    /// string constructor.
    pub fn runtime_string(&self, value: &str) -> DiagnosticResult<BasicValueEnum<'a>> {
        let global = self.intern_string_literal(value);
        let ctor = self.string_ctor()?;
        let len = self.i32_t.const_int(value.len() as u64, false);
        let call = self
            .builder
            .build_call(ctor, &[global.into(), len.into()], "str")
            .map_err(|_| Diagnostic::internal("string constructor call failed"))?;
        call.try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("string constructor returned no value"))
    }
}
