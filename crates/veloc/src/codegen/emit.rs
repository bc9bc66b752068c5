//! Function compilation.
//!
//! Lowers one compilation candidate: create the SSA function with the
//! lowered signature, materialize every parameter into a stack slot (so
//! parameters are uniformly mutable l-values; later SSA passes remove the
//! redundant loads and stores), lower the body, then seal the epilogue.
//! The epilogue owns the function's single return instruction; when the
//! body contains more than one `return`, their values merge in a phi.
//! Finally the SSA verifier runs; a rejected function is a compile error.

use inkwell::values::{BasicValue, FunctionValue};

use velo_ast::{FnDecl, Type};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};

use super::{CodeGen, DeclaredFn, ReturnCtx, Slot};

impl<'a> CodeGen<'a> {
    /// Declares the SSA function for a candidate and records it so calls
    /// between candidates resolve regardless of compilation order.
    pub fn declare_function(&self, func: &FnDecl) -> DiagnosticResult<FunctionValue<'a>> {
        let fn_type = self.fn_type_of(&func.sig)?;
        let function = self.declare_extern(&func.ident.name, fn_type)?;
        self.functions.borrow_mut().insert(
            func.ident.sym,
            DeclaredFn {
                function,
                sig: func.sig.clone(),
            },
        );
        Ok(function)
    }

    /// Compiles one annotated function end to end.
    pub fn compile_function(&self, func: &FnDecl) -> DiagnosticResult<FunctionValue<'a>> {
        let declared = self
            .functions
            .borrow()
            .get(&func.ident.sym)
            .map(|decl| decl.function);
        let function = match declared {
            Some(function) => function,
            None => self.declare_function(func)?,
        };

        let entry = self.context.append_basic_block(function, "entry");
        let epilogue = self.context.append_basic_block(function, "epilogue");
        self.builder.position_at_end(entry);

        *self.ret.borrow_mut() = Some(ReturnCtx {
            epilogue,
            ret_ty: func.sig.ret.clone(),
            incomings: Vec::new(),
        });
        let result = self.compile_body(func, function, epilogue);
        // The return context is per-function; clear it on every exit path.
        *self.ret.borrow_mut() = None;
        result?;

        if !function.verify(false) {
            return Err(Diagnostic::with_span(
                DiagnosticKind::MalformedFunction,
                format!("SSA verification failed for function '{}'", func.ident.name),
                func.span.start,
            ));
        }
        Ok(function)
    }

    fn compile_body(
        &self,
        func: &FnDecl,
        function: FunctionValue<'a>,
        epilogue: inkwell::basic_block::BasicBlock<'a>,
    ) -> DiagnosticResult<()> {
        let _scope = self.enter_scope();

        for (i, param) in func.params.iter().enumerate() {
            let llvm_ty = self.basic_type_of(&param.ty).ok_or_else(|| {
                Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    "void is not a valid parameter type",
                    param.span.start,
                )
            })?;
            let value = function.get_nth_param(i as u32).ok_or_else(|| {
                Diagnostic::internal(format!("missing parameter {}", param.ident.name))
            })?;
            let ptr = self
                .builder
                .build_alloca(llvm_ty, &param.ident.name)
                .map_err(|_| Diagnostic::internal("alloca failed for parameter"))?;
            self.builder
                .build_store(ptr, value)
                .map_err(|_| Diagnostic::internal("store failed for parameter"))?;
            self.define(
                param.ident.sym,
                Slot {
                    ptr,
                    llvm_ty,
                    ty: param.ty.clone(),
                },
            );
        }

        // The leading directive is an annotation, not a statement.
        let stmts = if func.leading_directive().is_some() {
            &func.body.stmts[1..]
        } else {
            &func.body.stmts[..]
        };
        let terminated = self.generate_stmts(stmts, function)?;

        if !terminated {
            match func.sig.ret {
                Type::Void => {
                    self.builder
                        .build_unconditional_branch(epilogue)
                        .map_err(|_| Diagnostic::internal("branch emission failed"))?;
                }
                _ => {
                    // The checker guarantees a non-void body cannot
                    // complete without returning.
                    self.builder
                        .build_unreachable()
                        .map_err(|_| Diagnostic::internal("unreachable emission failed"))?;
                }
            }
        }

        self.builder.position_at_end(epilogue);
        match func.sig.ret {
            Type::Void => {
                self.builder
                    .build_return(None)
                    .map_err(|_| Diagnostic::internal("return emission failed"))?;
            }
            _ => {
                let incomings = self
                    .ret
                    .borrow()
                    .as_ref()
                    .map(|ctx| ctx.incomings.clone())
                    .unwrap_or_default();
                match incomings.as_slice() {
                    [] => {
                        self.builder
                            .build_unreachable()
                            .map_err(|_| Diagnostic::internal("unreachable emission failed"))?;
                    }
                    [(value, _)] => {
                        self.builder
                            .build_return(Some(value))
                            .map_err(|_| Diagnostic::internal("return emission failed"))?;
                    }
                    _ => {
                        let ret_ty = self.basic_type_of(&func.sig.ret).ok_or_else(|| {
                            Diagnostic::internal("non-void return type has no ABI type")
                        })?;
                        let phi = self
                            .builder
                            .build_phi(ret_ty, "ret")
                            .map_err(|_| Diagnostic::internal("phi emission failed"))?;
                        for (value, block) in &incomings {
                            phi.add_incoming(&[(value as &dyn BasicValue, *block)]);
                        }
                        self.builder
                            .build_return(Some(&phi.as_basic_value()))
                            .map_err(|_| Diagnostic::internal("return emission failed"))?;
                    }
                }
            }
        }
        Ok(())
    }
}
