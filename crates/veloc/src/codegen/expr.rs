//! Expression lowering.
//!
//! `generate_expr` is the syntactic dispatcher: a closed match over the
//! expression categories of the accepted subset, delegating to one
//! generator per category. The subset is closed, so the dispatch table is
//! a match and the compiler's exhaustiveness check guarantees coverage;
//! combinations a generator does not accept raise a diagnostic naming the
//! category.
//!
//! Evaluation order is the source order: left operand before right,
//! callee before arguments, arguments left to right. Every generator that
//! creates basic blocks leaves the builder positioned at its merge block.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue};
use inkwell::{FloatPredicate, IntPredicate};

use velo_ast::{
    ArrayLit, AssignExpr, BinExpr, BinOp, CallExpr, CondExpr, Expr, Ident, IndexExpr, MemberExpr,
    NewExpr, ObjectLit, StrLit, Type, UnaryExpr, UnaryOp, UpdateExpr, UpdateOp,
};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};
use crate::types::type_name;
use crate::value::{LValue, Value};

use super::CodeGen;

/// True when the node is the literal integer constant zero. This is the
/// precise trigger for the `| 0` truncation idiom.
fn is_int_zero_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Int(lit) if lit.value == 0)
}

impl<'a> CodeGen<'a> {
    /// Dispatches an expression node to its category generator.
    pub fn generate_expr(
        &self,
        expr: &Expr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        match expr {
            Expr::Int(lit) => Ok(Value::rvalue(
                self.i32_t.const_int(lit.value as i64 as u64, true).into(),
                Type::Int32,
            )),
            Expr::Float(lit) => Ok(Value::rvalue(
                self.f64_t.const_float(lit.value).into(),
                Type::Float64,
            )),
            Expr::Bool(lit) => Ok(Value::rvalue(
                self.bool_t.const_int(lit.value as u64, false).into(),
                Type::Bool,
            )),
            Expr::Str(lit) => self.gen_str_lit(lit),
            Expr::Array(lit) => self.gen_array_lit(lit, function),
            Expr::Object(lit) => self.gen_object_lit(lit, function),
            Expr::Ident(id) => self.gen_ident(id),
            Expr::Bin(bin) => self.gen_bin(bin, function),
            Expr::Assign(assign) => self.gen_assign(assign, function),
            Expr::Unary(unary) => self.gen_unary(unary, function),
            Expr::Update(update) => self.gen_update(update, function),
            Expr::Cond(cond) => self.gen_cond(cond, function),
            Expr::Call(call) => self.gen_call(call, function),
            Expr::Member(member) => self.gen_member(member, function),
            Expr::Index(index) => self.gen_index(index, function),
            Expr::New(new) => self.gen_new(new, function),
        }
    }

    fn gen_str_lit(&self, lit: &StrLit) -> DiagnosticResult<Value<'a>> {
        let value = self.runtime_string(&lit.value)?;
        Ok(Value::rvalue(value, Type::String))
    }

    /// Identifier lookup walks the scope chain outward; identifiers that
    /// name a declared function evaluate to a function reference. An
    /// identifier without a slot indicates an upstream resolver bug.
    fn gen_ident(&self, id: &Ident) -> DiagnosticResult<Value<'a>> {
        if let Some(slot) = self.lookup(id.sym) {
            return Ok(Value::LValue(LValue::Stack {
                ptr: slot.ptr,
                llvm_ty: slot.llvm_ty,
                ty: slot.ty,
            }));
        }
        if let Some(decl) = self.functions.borrow().get(&id.sym) {
            return Ok(Value::FunctionRef {
                function: decl.function,
                sig: decl.sig.clone(),
            });
        }
        Err(Diagnostic::with_span(
            DiagnosticKind::UnresolvedSymbol,
            format!("unknown identifier '{}'", id.name),
            id.span.start,
        ))
    }

    fn gen_array_lit(
        &self,
        lit: &ArrayLit,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let elem = match &lit.ty {
            Type::Array(elem) => elem.as_ref().clone(),
            other => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("array literal typed as {}", type_name(other)),
                    lit.span.start,
                ));
            }
        };

        if lit.elems.is_empty() {
            let ctor = self.array_ctor_sized(&elem)?;
            let zero = self.i32_t.const_zero();
            let call = self
                .builder
                .build_call(ctor, &[zero.into()], "arr")
                .map_err(|_| Diagnostic::internal("array constructor call failed"))?;
            let ptr = call
                .try_as_basic_value()
                .left()
                .ok_or_else(|| Diagnostic::internal("array constructor returned no value"))?;
            return Ok(Value::rvalue(ptr, lit.ty.clone()));
        }

        let mut values = Vec::with_capacity(lit.elems.len());
        for e in &lit.elems {
            let v = self.generate_expr(e, function)?;
            let raw = v.as_rvalue(self)?;
            values.push(self.coerce(raw, &v.ty(), &elem, e.span().start)?);
        }
        let buf = self.stack_buffer(&elem, &values)?;
        let len = self.i32_t.const_int(values.len() as u64, false);
        let ctor = self.array_ctor_elems(&elem)?;
        let call = self
            .builder
            .build_call(ctor, &[buf.into(), len.into()], "arr")
            .map_err(|_| Diagnostic::internal("array constructor call failed"))?;
        let ptr = call
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("array constructor returned no value"))?;
        Ok(Value::rvalue(ptr, lit.ty.clone()))
    }

    /// Object literals allocate through the runtime and store each
    /// property into its 8-byte field slot, in literal order.
    fn gen_object_lit(
        &self,
        lit: &ObjectLit,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let fields = match &lit.ty {
            Type::Object(fields) => fields.clone(),
            other => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("object literal typed as {}", type_name(other)),
                    lit.span.start,
                ));
            }
        };

        let create = self.object_create()?;
        let count = self.i32_t.const_int(fields.len() as u64, false);
        let call = self
            .builder
            .build_call(create, &[count.into()], "obj")
            .map_err(|_| Diagnostic::internal("object allocation call failed"))?;
        let obj = call
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("object allocation returned no value"))?
            .into_pointer_value();

        for prop in &lit.props {
            let (index, field_ty) = fields
                .iter()
                .enumerate()
                .find(|(_, (name, _))| name == &prop.name)
                .map(|(i, (_, ty))| (i as u32, ty.clone()))
                .ok_or_else(|| {
                    Diagnostic::with_span(
                        DiagnosticKind::TypeMismatch,
                        format!("property '{}' is not part of the object type", prop.name),
                        prop.span.start,
                    )
                })?;
            let v = self.generate_expr(&prop.value, function)?;
            let raw = v.as_rvalue(self)?;
            let coerced = self.coerce(raw, &v.ty(), &field_ty, prop.value.span().start)?;
            let slot = Value::LValue(LValue::Field {
                base: obj,
                index,
                ty: field_ty,
            });
            slot.assign(self, coerced)?;
        }
        Ok(Value::rvalue(obj.into(), lit.ty.clone()))
    }

    fn gen_bin(&self, bin: &BinExpr, function: FunctionValue<'a>) -> DiagnosticResult<Value<'a>> {
        if matches!(bin.op, BinOp::And | BinOp::Or) {
            return self.gen_logical(bin, function);
        }

        // Left before right.
        let lhs = self.generate_expr(&bin.left, function)?;
        let lv = lhs.as_rvalue(self)?;
        let tl = self.resolver.type_of(&bin.left).clone();
        let rhs = self.generate_expr(&bin.right, function)?;
        let rv = rhs.as_rvalue(self)?;
        let tr = self.resolver.type_of(&bin.right).clone();

        let (value, ty) = self.emit_binary_op(
            bin.op,
            lv,
            &tl,
            rv,
            &tr,
            is_int_zero_literal(&bin.right),
            bin.span.start,
        )?;
        Ok(Value::rvalue(value, ty))
    }

    /// The operator emission table. Dispatch tests `int_like` on the left
    /// operand's type strictly before `number_like`, so an int32 operand
    /// never takes the float path.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn emit_binary_op(
        &self,
        op: BinOp,
        lv: BasicValueEnum<'a>,
        tl: &Type,
        rv: BasicValueEnum<'a>,
        tr: &Type,
        rhs_is_int_zero: bool,
        span: usize,
    ) -> DiagnosticResult<(BasicValueEnum<'a>, Type)> {
        let unsupported = |tl: &Type| {
            Err(Diagnostic::with_span(
                DiagnosticKind::UnsupportedBinaryOperator,
                format!("operator not supported for {} operands", type_name(tl)),
                span,
            ))
        };

        if self.resolver.is_int_like(tl) {
            if !self.resolver.is_int_like(tr) {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "integer operator applied to {} right operand",
                        type_name(tr)
                    ),
                    span,
                ));
            }
            let l = lv.into_int_value();
            let r = rv.into_int_value();
            let b = &self.builder;
            let arith = |v: Result<inkwell::values::IntValue<'a>, _>| {
                v.map(|v| (v.into(), Type::Int32))
                    .map_err(|_: inkwell::builder::BuilderError| {
                        Diagnostic::internal("integer arithmetic emission failed")
                    })
            };
            let cmp = |p: IntPredicate, name: &str| {
                b.build_int_compare(p, l, r, name)
                    .map(|v| (v.into(), Type::Bool))
                    .map_err(|_| Diagnostic::internal("integer compare emission failed"))
            };
            return match op {
                BinOp::Add => arith(b.build_int_add(l, r, "add")),
                BinOp::Sub => arith(b.build_int_sub(l, r, "sub")),
                BinOp::Mul => arith(b.build_int_mul(l, r, "mul")),
                BinOp::Div => arith(b.build_int_signed_div(l, r, "div")),
                BinOp::Rem => arith(b.build_int_signed_rem(l, r, "rem")),
                BinOp::Lt => cmp(IntPredicate::SLT, "lt"),
                BinOp::Gt => cmp(IntPredicate::SGT, "gt"),
                BinOp::Le => cmp(IntPredicate::SLE, "le"),
                BinOp::Ge => cmp(IntPredicate::SGE, "ge"),
                BinOp::EqEq => cmp(IntPredicate::EQ, "eq"),
                BinOp::NotEq => cmp(IntPredicate::NE, "ne"),
                BinOp::BitOr => arith(b.build_or(l, r, "or")),
                BinOp::BitAnd => arith(b.build_and(l, r, "and")),
                BinOp::BitXor => arith(b.build_xor(l, r, "xor")),
                BinOp::Shl => arith(b.build_left_shift(l, r, "shl")),
                BinOp::Shr => arith(b.build_right_shift(l, r, true, "shr")),
                BinOp::UShr => arith(b.build_right_shift(l, r, false, "ushr")),
                BinOp::And | BinOp::Or => unreachable!("short-circuit ops handled separately"),
            };
        }

        if self.resolver.is_number_like(tl) {
            let l = lv.into_float_value();

            // `x | 0` is the canonical float -> int32 truncation; the
            // right operand must be the literal integer constant zero.
            if op == BinOp::BitOr {
                if rhs_is_int_zero {
                    let v = self
                        .builder
                        .build_float_to_signed_int(l, self.i32_t, "trunc")
                        .map_err(|_| Diagnostic::internal("float truncation emission failed"))?;
                    return Ok((v.into(), Type::Int32));
                }
                return unsupported(tl);
            }
            if matches!(
                op,
                BinOp::BitAnd | BinOp::BitXor | BinOp::Shl | BinOp::Shr | BinOp::UShr
            ) {
                return unsupported(tl);
            }

            let r = if self.resolver.is_int_like(tr) {
                self.builder
                    .build_signed_int_to_float(rv.into_int_value(), self.f64_t, "i2f")
                    .map_err(|_| Diagnostic::internal("int to float promotion failed"))?
            } else if self.resolver.is_number_like(tr) {
                rv.into_float_value()
            } else {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("numeric operator applied to {} right operand", type_name(tr)),
                    span,
                ));
            };

            let b = &self.builder;
            let arith = |v: Result<inkwell::values::FloatValue<'a>, _>| {
                v.map(|v| (v.into(), Type::Float64))
                    .map_err(|_: inkwell::builder::BuilderError| {
                        Diagnostic::internal("float arithmetic emission failed")
                    })
            };
            // Ordered predicates for all relational ops and `===`: any
            // comparison involving NaN is false. `!==` is unordered so
            // NaN !== NaN holds.
            let cmp = |p: FloatPredicate, name: &str| {
                b.build_float_compare(p, l, r, name)
                    .map(|v| (v.into(), Type::Bool))
                    .map_err(|_| Diagnostic::internal("float compare emission failed"))
            };
            return match op {
                BinOp::Add => arith(b.build_float_add(l, r, "fadd")),
                BinOp::Sub => arith(b.build_float_sub(l, r, "fsub")),
                BinOp::Mul => arith(b.build_float_mul(l, r, "fmul")),
                BinOp::Div => arith(b.build_float_div(l, r, "fdiv")),
                BinOp::Rem => arith(b.build_float_rem(l, r, "frem")),
                BinOp::Lt => cmp(FloatPredicate::OLT, "lt"),
                BinOp::Gt => cmp(FloatPredicate::OGT, "gt"),
                BinOp::Le => cmp(FloatPredicate::OLE, "le"),
                BinOp::Ge => cmp(FloatPredicate::OGE, "ge"),
                BinOp::EqEq => cmp(FloatPredicate::OEQ, "eq"),
                BinOp::NotEq => cmp(FloatPredicate::UNE, "ne"),
                _ => unsupported(tl),
            };
        }

        if self.resolver.is_bool(tl) {
            if !self.resolver.is_bool(tr) {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("boolean operator applied to {} right operand", type_name(tr)),
                    span,
                ));
            }
            let l = lv.into_int_value();
            let r = rv.into_int_value();
            return match op {
                BinOp::EqEq => {
                    let x = self
                        .builder
                        .build_xor(l, r, "xor")
                        .map_err(|_| Diagnostic::internal("xor emission failed"))?;
                    let v = self
                        .builder
                        .build_not(x, "eq")
                        .map_err(|_| Diagnostic::internal("not emission failed"))?;
                    Ok((v.into(), Type::Bool))
                }
                BinOp::NotEq => self
                    .builder
                    .build_xor(l, r, "ne")
                    .map(|v| (v.into(), Type::Bool))
                    .map_err(|_| Diagnostic::internal("xor emission failed")),
                _ => unsupported(tl),
            };
        }

        unsupported(tl)
    }

    /// Short-circuiting `&&` / `||` on boolean operands: conditional
    /// branches plus an `i1` phi at the merge block.
    fn gen_logical(
        &self,
        bin: &BinExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let prefix = if bin.op == BinOp::And { "and" } else { "or" };

        let lhs = self.generate_expr(&bin.left, function)?;
        let lv = lhs.as_rvalue(self)?;
        let cond = self.to_condition(lv, &lhs.ty(), bin.left.span().start)?;

        let rhs_bb = self
            .context
            .append_basic_block(function, &format!("{}.rhs", prefix));
        let merge_bb = self
            .context
            .append_basic_block(function, &format!("{}.merge", prefix));

        let left_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| Diagnostic::internal("builder has no insertion block"))?;
        match bin.op {
            BinOp::And => self.builder.build_conditional_branch(cond, rhs_bb, merge_bb),
            _ => self.builder.build_conditional_branch(cond, merge_bb, rhs_bb),
        }
        .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;

        self.builder.position_at_end(rhs_bb);
        let rhs = self.generate_expr(&bin.right, function)?;
        let rv = rhs.as_rvalue(self)?;
        let rcond = self.to_condition(rv, &rhs.ty(), bin.right.span().start)?;
        let rhs_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| Diagnostic::internal("builder has no insertion block"))?;
        self.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(merge_bb);
        let phi = self
            .builder
            .build_phi(self.bool_t, prefix)
            .map_err(|_| Diagnostic::internal("phi emission failed"))?;
        phi.add_incoming(&[(&cond, left_end), (&rcond, rhs_end)]);
        Ok(Value::rvalue(phi.as_basic_value(), Type::Bool))
    }

    /// Assignment: the target is evaluated first and must be assignable.
    /// The stored value is coerced to the target's declared type, and the
    /// expression evaluates to that coerced value.
    fn gen_assign(
        &self,
        assign: &AssignExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let target = self.generate_expr(&assign.target, function)?;
        let target_ty = target.ty();

        let value = match assign.op {
            None => {
                let v = self.generate_expr(&assign.value, function)?;
                let raw = v.as_rvalue(self)?;
                self.coerce(raw, &v.ty(), &target_ty, assign.value.span().start)?
            }
            Some(op) => {
                let current = target.as_rvalue(self)?;
                let rhs = self.generate_expr(&assign.value, function)?;
                let rv = rhs.as_rvalue(self)?;
                let (v, vty) = self.emit_binary_op(
                    op,
                    current,
                    &target_ty,
                    rv,
                    &rhs.ty(),
                    is_int_zero_literal(&assign.value),
                    assign.span.start,
                )?;
                self.coerce(v, &vty, &target_ty, assign.span.start)?
            }
        };

        target.assign(self, value)?;
        Ok(Value::rvalue(value, target_ty))
    }

    fn gen_unary(
        &self,
        unary: &UnaryExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let arg = self.generate_expr(&unary.arg, function)?;
        let ty = arg.ty();
        let unsupported = || {
            Err(Diagnostic::with_span(
                DiagnosticKind::UnsupportedUnaryOperator,
                format!("operator not supported for {} operand", type_name(&ty)),
                unary.span.start,
            ))
        };
        match unary.op {
            UnaryOp::Plus => {
                let v = arg.as_rvalue(self)?;
                if self.resolver.is_number_like(&ty) {
                    Ok(Value::rvalue(v, ty))
                } else {
                    unsupported()
                }
            }
            UnaryOp::Minus => {
                let v = arg.as_rvalue(self)?;
                if self.resolver.is_int_like(&ty) {
                    let neg = self
                        .builder
                        .build_int_neg(v.into_int_value(), "neg")
                        .map_err(|_| Diagnostic::internal("negation emission failed"))?;
                    Ok(Value::rvalue(neg.into(), Type::Int32))
                } else if self.resolver.is_number_like(&ty) {
                    let neg = self
                        .builder
                        .build_float_neg(v.into_float_value(), "fneg")
                        .map_err(|_| Diagnostic::internal("negation emission failed"))?;
                    Ok(Value::rvalue(neg.into(), Type::Float64))
                } else {
                    unsupported()
                }
            }
            UnaryOp::Not => {
                let v = arg.as_rvalue(self)?;
                if self.resolver.is_bool(&ty) {
                    let not = self
                        .builder
                        .build_not(v.into_int_value(), "not")
                        .map_err(|_| Diagnostic::internal("not emission failed"))?;
                    Ok(Value::rvalue(not.into(), Type::Bool))
                } else {
                    unsupported()
                }
            }
            UnaryOp::Tilde => {
                let v = arg.as_rvalue(self)?;
                if self.resolver.is_int_like(&ty) {
                    let not = self
                        .builder
                        .build_not(v.into_int_value(), "bnot")
                        .map_err(|_| Diagnostic::internal("bitwise not emission failed"))?;
                    Ok(Value::rvalue(not.into(), Type::Int32))
                } else {
                    unsupported()
                }
            }
            UnaryOp::TypeOf => {
                let name = match &ty {
                    Type::Int32 | Type::Float64 => "number",
                    Type::Bool => "boolean",
                    Type::String => "string",
                    Type::Object(_) | Type::Array(_) => "object",
                    Type::Function(_) => "function",
                    Type::Void => "undefined",
                };
                let value = self.runtime_string(name)?;
                Ok(Value::rvalue(value, Type::String))
            }
        }
    }

    /// `++`/`--` require an assignable operand; prefix evaluates to the
    /// new value, postfix to the old.
    fn gen_update(
        &self,
        update: &UpdateExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let target = self.generate_expr(&update.arg, function)?;
        if !target.is_assignable() {
            return Err(Diagnostic::with_span(
                DiagnosticKind::ReadOnlyTarget,
                "increment target is not assignable",
                update.span.start,
            ));
        }
        let ty = target.ty();
        let old = target.as_rvalue(self)?;
        let new: BasicValueEnum<'a> = if self.resolver.is_int_like(&ty) {
            let one = self.i32_t.const_int(1, false);
            let v = match update.op {
                UpdateOp::Inc => self.builder.build_int_add(old.into_int_value(), one, "inc"),
                UpdateOp::Dec => self.builder.build_int_sub(old.into_int_value(), one, "dec"),
            }
            .map_err(|_| Diagnostic::internal("update emission failed"))?;
            v.into()
        } else if self.resolver.is_number_like(&ty) {
            let one = self.f64_t.const_float(1.0);
            let v = match update.op {
                UpdateOp::Inc => self
                    .builder
                    .build_float_add(old.into_float_value(), one, "inc"),
                UpdateOp::Dec => self
                    .builder
                    .build_float_sub(old.into_float_value(), one, "dec"),
            }
            .map_err(|_| Diagnostic::internal("update emission failed"))?;
            v.into()
        } else {
            return Err(Diagnostic::with_span(
                DiagnosticKind::UnsupportedUnaryOperator,
                format!("cannot increment {} operand", type_name(&ty)),
                update.span.start,
            ));
        };
        target.assign(self, new)?;
        Ok(Value::rvalue(if update.prefix { new } else { old }, ty))
    }

    fn gen_cond(&self, cond: &CondExpr, function: FunctionValue<'a>) -> DiagnosticResult<Value<'a>> {
        let test = self.generate_expr(&cond.test, function)?;
        let tv = test.as_rvalue(self)?;
        let flag = self.to_condition(tv, &test.ty(), cond.test.span().start)?;

        let then_bb = self.context.append_basic_block(function, "cond.then");
        let else_bb = self.context.append_basic_block(function, "cond.else");
        let merge_bb = self.context.append_basic_block(function, "cond.merge");
        self.builder
            .build_conditional_branch(flag, then_bb, else_bb)
            .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;

        self.builder.position_at_end(then_bb);
        let cons = self.generate_expr(&cond.cons, function)?;
        let cons_raw = cons.as_rvalue(self)?;
        let cons_v = self.coerce(cons_raw, &cons.ty(), &cond.ty, cond.cons.span().start)?;
        let then_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| Diagnostic::internal("builder has no insertion block"))?;
        self.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(else_bb);
        let alt = self.generate_expr(&cond.alt, function)?;
        let alt_raw = alt.as_rvalue(self)?;
        let alt_v = self.coerce(alt_raw, &alt.ty(), &cond.ty, cond.alt.span().start)?;
        let else_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| Diagnostic::internal("builder has no insertion block"))?;
        self.builder
            .build_unconditional_branch(merge_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(merge_bb);
        let phi_ty = self.basic_type_of(&cond.ty).ok_or_else(|| {
            Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "conditional expression cannot be void",
                cond.span.start,
            )
        })?;
        let phi = self
            .builder
            .build_phi(phi_ty, "cond")
            .map_err(|_| Diagnostic::internal("phi emission failed"))?;
        phi.add_incoming(&[(&cons_v, then_end), (&alt_v, else_end)]);
        Ok(Value::rvalue(phi.as_basic_value(), cond.ty.clone()))
    }

    fn gen_call(&self, call: &CallExpr, function: FunctionValue<'a>) -> DiagnosticResult<Value<'a>> {
        // Builtin member calls: Math helpers and array methods.
        if let Expr::Member(member) = &call.callee {
            if let Expr::Ident(obj) = &member.obj
                && obj.name == "Math"
            {
                return self.gen_math_call(&member.prop, call, function);
            }
            if let Type::Array(elem) = self.resolver.type_of(&member.obj) {
                let elem = elem.as_ref().clone();
                match member.prop.as_str() {
                    "push" => return self.gen_array_push(&elem, member, call, function),
                    "pop" => return self.gen_array_pop(&elem, member, call, function),
                    _ => {}
                }
            }
        }

        let callee = self.generate_expr(&call.callee, function)?;
        let (target, sig) = match &callee {
            Value::FunctionRef { function, sig } => (*function, sig.clone()),
            other => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("callee of type {} is not callable", type_name(&other.ty())),
                    call.callee.span().start,
                ));
            }
        };

        if call.args.len() != sig.params.len() {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!(
                    "expected {} arguments, found {}",
                    sig.params.len(),
                    call.args.len()
                ),
                call.span.start,
            ));
        }

        // Arguments left to right, each coerced to the parameter's
        // declared type (widening only).
        let mut args: Vec<BasicMetadataValueEnum<'a>> = Vec::with_capacity(call.args.len());
        for (arg, param_ty) in call.args.iter().zip(&sig.params) {
            let v = self.generate_expr(arg, function)?;
            let raw = v.as_rvalue(self)?;
            let coerced = self.coerce(raw, &v.ty(), param_ty, arg.span().start)?;
            args.push(coerced.into());
        }

        let site = self
            .builder
            .build_call(target, &args, "call")
            .map_err(|_| Diagnostic::internal("call emission failed"))?;
        match site.try_as_basic_value().left() {
            Some(v) => Ok(Value::rvalue(v, sig.ret.clone())),
            None => Ok(Value::Void),
        }
    }

    /// Math namespace members lower to LLVM float intrinsics; arguments
    /// are widened to f64.
    fn gen_math_call(
        &self,
        prop: &str,
        call: &CallExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let (intrinsic, arity) = match prop {
            "sqrt" => ("llvm.sqrt.f64", 1),
            "abs" => ("llvm.fabs.f64", 1),
            "floor" => ("llvm.floor.f64", 1),
            "ceil" => ("llvm.ceil.f64", 1),
            "log" => ("llvm.log.f64", 1),
            "sin" => ("llvm.sin.f64", 1),
            "cos" => ("llvm.cos.f64", 1),
            "pow" => ("llvm.pow.f64", 2),
            _ => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::UnresolvedSymbol,
                    format!("unknown Math member '{}'", prop),
                    call.span.start,
                ));
            }
        };
        if call.args.len() != arity {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!("Math.{} expects {} arguments", prop, arity),
                call.span.start,
            ));
        }
        let target = if arity == 1 {
            self.math_unary(intrinsic)?
        } else {
            self.math_binary(intrinsic)?
        };
        let mut args: Vec<BasicMetadataValueEnum<'a>> = Vec::with_capacity(arity);
        for arg in &call.args {
            let v = self.generate_expr(arg, function)?;
            let raw = v.as_rvalue(self)?;
            let coerced = self.coerce(raw, &v.ty(), &Type::Float64, arg.span().start)?;
            args.push(coerced.into());
        }
        let site = self
            .builder
            .build_call(target, &args, "math")
            .map_err(|_| Diagnostic::internal("intrinsic call emission failed"))?;
        let v = site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("intrinsic returned no value"))?;
        Ok(Value::rvalue(v, Type::Float64))
    }

    fn gen_array_push(
        &self,
        elem: &Type,
        member: &MemberExpr,
        call: &CallExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let obj = self.generate_expr(&member.obj, function)?;
        let arr = obj.as_rvalue(self)?.into_pointer_value();
        if call.args.len() != 1 {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "push expects one argument",
                call.span.start,
            ));
        }
        let v = self.generate_expr(&call.args[0], function)?;
        let raw = v.as_rvalue(self)?;
        let coerced = self.coerce(raw, &v.ty(), elem, call.args[0].span().start)?;
        let buf = self.stack_buffer(elem, &[coerced])?;
        let one = self.i32_t.const_int(1, false);
        let push = self.array_push(elem)?;
        let site = self
            .builder
            .build_call(push, &[arr.into(), buf.into(), one.into()], "push")
            .map_err(|_| Diagnostic::internal("array push call failed"))?;
        let len = site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("array push returned no value"))?;
        Ok(Value::rvalue(len, Type::Int32))
    }

    fn gen_array_pop(
        &self,
        elem: &Type,
        member: &MemberExpr,
        call: &CallExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let obj = self.generate_expr(&member.obj, function)?;
        let arr = obj.as_rvalue(self)?.into_pointer_value();
        if !call.args.is_empty() {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "pop expects no arguments",
                call.span.start,
            ));
        }
        let pop = self.array_pop(elem)?;
        let site = self
            .builder
            .build_call(pop, &[arr.into()], "pop")
            .map_err(|_| Diagnostic::internal("array pop call failed"))?;
        let v = site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("array pop returned no value"))?;
        Ok(Value::rvalue(v, elem.clone()))
    }

    fn gen_member(
        &self,
        member: &MemberExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        if let Expr::Ident(obj) = &member.obj
            && obj.name == "Math"
        {
            return Err(Diagnostic::with_span(
                DiagnosticKind::UnsupportedSyntacticCategory,
                "Math members can only be called",
                member.span.start,
            ));
        }

        let obj_ty = self.resolver.type_of(&member.obj).clone();
        match &obj_ty {
            Type::Array(elem) if member.prop == "length" => {
                let obj = self.generate_expr(&member.obj, function)?;
                let arr = obj.as_rvalue(self)?.into_pointer_value();
                let length = self.array_length(elem)?;
                let site = self
                    .builder
                    .build_call(length, &[arr.into()], "len")
                    .map_err(|_| Diagnostic::internal("array length call failed"))?;
                let v = site
                    .try_as_basic_value()
                    .left()
                    .ok_or_else(|| Diagnostic::internal("array length returned no value"))?;
                Ok(Value::rvalue(v, Type::Int32))
            }
            Type::Object(fields) => {
                let (index, field_ty) = fields
                    .iter()
                    .enumerate()
                    .find(|(_, (name, _))| name == &member.prop)
                    .map(|(i, (_, ty))| (i as u32, ty.clone()))
                    .ok_or_else(|| {
                        Diagnostic::with_span(
                            DiagnosticKind::TypeMismatch,
                            format!("no property '{}' on object type", member.prop),
                            member.span.start,
                        )
                    })?;
                let obj = self.generate_expr(&member.obj, function)?;
                let base = obj.as_rvalue(self)?.into_pointer_value();
                Ok(Value::LValue(LValue::Field {
                    base,
                    index,
                    ty: field_ty,
                }))
            }
            other => Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!("no property '{}' on {}", member.prop, type_name(other)),
                member.span.start,
            )),
        }
    }

    /// Element access yields an array-element l-value; loads and stores
    /// go through the runtime's bounds-checked accessors.
    fn gen_index(
        &self,
        index: &IndexExpr,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<Value<'a>> {
        let obj_ty = self.resolver.type_of(&index.obj).clone();
        let elem = match &obj_ty {
            Type::Array(elem) => elem.as_ref().clone(),
            other => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    format!("cannot index {}", type_name(other)),
                    index.span.start,
                ));
            }
        };
        let obj = self.generate_expr(&index.obj, function)?;
        let arr = obj.as_rvalue(self)?.into_pointer_value();
        let idx = self.generate_expr(&index.index, function)?;
        let idx_ty = idx.ty();
        if !self.resolver.is_int_like(&idx_ty) {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                format!("array index must be int, found {}", type_name(&idx_ty)),
                index.index.span().start,
            )
            .note("use `| 0` to truncate explicitly"));
        }
        let idx_v = idx.as_rvalue(self)?.into_int_value();
        Ok(Value::LValue(LValue::Element {
            array: arr,
            index: idx_v,
            elem,
        }))
    }

    fn gen_new(&self, new: &NewExpr, function: FunctionValue<'a>) -> DiagnosticResult<Value<'a>> {
        let elem = match &new.ty {
            Type::Array(elem) => elem.as_ref().clone(),
            _ => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::UnsupportedSyntacticCategory,
                    format!("new expression for '{}'", new.callee),
                    new.span.start,
                ));
            }
        };
        let size: BasicValueEnum<'a> = match new.args.len() {
            0 => self.i32_t.const_zero().into(),
            1 => {
                let v = self.generate_expr(&new.args[0], function)?;
                let raw = v.as_rvalue(self)?;
                self.coerce(raw, &v.ty(), &Type::Int32, new.args[0].span().start)?
            }
            _ => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    "Array constructor expects at most one length argument",
                    new.span.start,
                ));
            }
        };
        let ctor = self.array_ctor_sized(&elem)?;
        let site = self
            .builder
            .build_call(ctor, &[size.into()], "arr")
            .map_err(|_| Diagnostic::internal("array constructor call failed"))?;
        let v = site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| Diagnostic::internal("array constructor returned no value"))?;
        Ok(Value::rvalue(v, new.ty.clone()))
    }
}
