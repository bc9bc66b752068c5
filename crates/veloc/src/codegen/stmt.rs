//! Statement lowering.
//!
//! `generate_stmt` returns `true` when the statement emitted a terminator
//! for the current block (return, break, continue, or an if whose arms
//! both terminate); callers stop emitting into the block once that
//! happens. Loops and switches publish their landing pads through the
//! emission context's guard API so `break`/`continue` resolve to the
//! nearest enclosing target and the stack is restored on every exit path.

use inkwell::values::FunctionValue;

use velo_ast::{
    BreakStmt, ContinueStmt, DoWhileStmt, Expr, ForInit, ForStmt, IfStmt, ReturnStmt, Stmt,
    SwitchStmt, Type, VarDecl, WhileStmt,
};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticResult};

use super::{CodeGen, Slot};

impl<'a> CodeGen<'a> {
    /// Lowers a statement list, stopping after the first terminator.
    pub fn generate_stmts(
        &self,
        stmts: &[Stmt],
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<bool> {
        for stmt in stmts {
            if self.generate_stmt(stmt, function)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Dispatches a statement node to its category generator.
    pub fn generate_stmt(&self, stmt: &Stmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        match stmt {
            Stmt::Expr(es) => {
                self.generate_expr(&es.expr, function)?;
                Ok(false)
            }
            Stmt::VarDecl(decl) => self.gen_var_decl(decl, function),
            Stmt::Block(block) => {
                let _scope = self.enter_scope();
                self.generate_stmts(&block.stmts, function)
            }
            Stmt::If(ifstmt) => self.gen_if(ifstmt, function),
            Stmt::While(whilestmt) => self.gen_while(whilestmt, function),
            Stmt::DoWhile(dowhile) => self.gen_do_while(dowhile, function),
            Stmt::For(forstmt) => self.gen_for(forstmt, function),
            Stmt::Switch(switch) => self.gen_switch(switch, function),
            Stmt::Break(brk) => self.gen_break(brk),
            Stmt::Continue(cont) => self.gen_continue(cont),
            Stmt::Return(ret) => self.gen_return(ret, function),
            Stmt::Empty(_) => Ok(false),
        }
    }

    /// Allocates a slot in the current scope and stores the initializer,
    /// or the language-defined zero when there is none.
    fn gen_var_decl(&self, decl: &VarDecl, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        let llvm_ty = self.basic_type_of(&decl.ty).ok_or_else(|| {
            Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "cannot declare a void variable",
                decl.span.start,
            )
        })?;
        let ptr = self
            .builder
            .build_alloca(llvm_ty, &decl.ident.name)
            .map_err(|_| Diagnostic::internal("alloca failed for local variable"))?;

        let value = match &decl.init {
            Some(init) => {
                let v = self.generate_expr(init, function)?;
                let raw = v.as_rvalue(self)?;
                self.coerce(raw, &v.ty(), &decl.ty, init.span().start)?
            }
            None => self.zero_value(&decl.ty).ok_or_else(|| {
                Diagnostic::internal("no zero value for declared type")
            })?,
        };
        self.builder
            .build_store(ptr, value)
            .map_err(|_| Diagnostic::internal("store failed for local variable"))?;

        self.define(
            decl.ident.sym,
            Slot {
                ptr,
                llvm_ty,
                ty: decl.ty.clone(),
            },
        );
        Ok(false)
    }

    fn gen_if(&self, ifstmt: &IfStmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        let test = self.generate_expr(&ifstmt.test, function)?;
        let tv = test.as_rvalue(self)?;
        let cond = self.to_condition(tv, &test.ty(), ifstmt.test.span().start)?;

        let then_bb = self.context.append_basic_block(function, "if.then");
        let else_bb = self.context.append_basic_block(function, "if.else");
        let merge_bb = self.context.append_basic_block(function, "if.merge");

        self.builder
            .build_conditional_branch(cond, then_bb, else_bb)
            .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;

        self.builder.position_at_end(then_bb);
        let then_terminated = self.generate_stmt(&ifstmt.cons, function)?;
        if !then_terminated {
            self.builder
                .build_unconditional_branch(merge_bb)
                .map_err(|_| Diagnostic::internal("branch emission failed"))?;
        }

        self.builder.position_at_end(else_bb);
        let else_terminated = match &ifstmt.alt {
            Some(alt) => self.generate_stmt(alt, function)?,
            None => false,
        };
        if !else_terminated {
            self.builder
                .build_unconditional_branch(merge_bb)
                .map_err(|_| Diagnostic::internal("branch emission failed"))?;
        }

        self.builder.position_at_end(merge_bb);
        // If both arms terminated, the merge block is unreachable.
        if then_terminated && else_terminated {
            self.builder
                .build_unreachable()
                .map_err(|_| Diagnostic::internal("unreachable emission failed"))?;
        }
        Ok(then_terminated && else_terminated)
    }

    fn gen_while(&self, whilestmt: &WhileStmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        let cond_bb = self.context.append_basic_block(function, "while.cond");
        let body_bb = self.context.append_basic_block(function, "while.body");
        let after_bb = self.context.append_basic_block(function, "while.after");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(cond_bb);
        let test = self.generate_expr(&whilestmt.test, function)?;
        let tv = test.as_rvalue(self)?;
        let cond = self.to_condition(tv, &test.ty(), whilestmt.test.span().start)?;
        self.builder
            .build_conditional_branch(cond, body_bb, after_bb)
            .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;

        {
            let _pad = self.enter_loop(cond_bb, after_bb);
            self.builder.position_at_end(body_bb);
            let terminated = self.generate_stmt(&whilestmt.body, function)?;
            if !terminated {
                self.builder
                    .build_unconditional_branch(cond_bb)
                    .map_err(|_| Diagnostic::internal("branch emission failed"))?;
            }
        }

        self.builder.position_at_end(after_bb);
        Ok(false)
    }

    fn gen_do_while(
        &self,
        dowhile: &DoWhileStmt,
        function: FunctionValue<'a>,
    ) -> DiagnosticResult<bool> {
        let body_bb = self.context.append_basic_block(function, "do.body");
        let cond_bb = self.context.append_basic_block(function, "do.cond");
        let after_bb = self.context.append_basic_block(function, "do.after");

        self.builder
            .build_unconditional_branch(body_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        {
            let _pad = self.enter_loop(cond_bb, after_bb);
            self.builder.position_at_end(body_bb);
            let terminated = self.generate_stmt(&dowhile.body, function)?;
            if !terminated {
                self.builder
                    .build_unconditional_branch(cond_bb)
                    .map_err(|_| Diagnostic::internal("branch emission failed"))?;
            }
        }

        self.builder.position_at_end(cond_bb);
        let test = self.generate_expr(&dowhile.test, function)?;
        let tv = test.as_rvalue(self)?;
        let cond = self.to_condition(tv, &test.ty(), dowhile.test.span().start)?;
        self.builder
            .build_conditional_branch(cond, body_bb, after_bb)
            .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;

        self.builder.position_at_end(after_bb);
        Ok(false)
    }

    fn gen_for(&self, forstmt: &ForStmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        // Init vars live in a scope of their own.
        let _scope = self.enter_scope();
        match &forstmt.init {
            Some(ForInit::VarDecl(decl)) => {
                self.gen_var_decl(decl, function)?;
            }
            Some(ForInit::Expr(expr)) => {
                self.generate_expr(expr, function)?;
            }
            None => {}
        }

        let cond_bb = self.context.append_basic_block(function, "for.cond");
        let body_bb = self.context.append_basic_block(function, "for.body");
        let incr_bb = self.context.append_basic_block(function, "for.incr");
        let after_bb = self.context.append_basic_block(function, "for.after");

        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(cond_bb);
        match &forstmt.test {
            Some(test) => {
                let t = self.generate_expr(test, function)?;
                let tv = t.as_rvalue(self)?;
                let cond = self.to_condition(tv, &t.ty(), test.span().start)?;
                self.builder
                    .build_conditional_branch(cond, body_bb, after_bb)
                    .map_err(|_| Diagnostic::internal("conditional branch emission failed"))?;
            }
            None => {
                self.builder
                    .build_unconditional_branch(body_bb)
                    .map_err(|_| Diagnostic::internal("branch emission failed"))?;
            }
        }

        {
            // `continue` jumps to the increment, `break` past the loop.
            let _pad = self.enter_loop(incr_bb, after_bb);
            self.builder.position_at_end(body_bb);
            let terminated = self.generate_stmt(&forstmt.body, function)?;
            if !terminated {
                self.builder
                    .build_unconditional_branch(incr_bb)
                    .map_err(|_| Diagnostic::internal("branch emission failed"))?;
            }
        }

        self.builder.position_at_end(incr_bb);
        if let Some(update) = &forstmt.update {
            self.generate_expr(update, function)?;
        }
        self.builder
            .build_unconditional_branch(cond_bb)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;

        self.builder.position_at_end(after_bb);
        Ok(false)
    }

    /// Switch over an int32 discriminant with constant integer case
    /// labels; cases fall through unless they terminate.
    fn gen_switch(&self, switch: &SwitchStmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        let disc = self.generate_expr(&switch.discriminant, function)?;
        let disc_ty = disc.ty();
        if !self.resolver.is_int_like(&disc_ty) {
            return Err(Diagnostic::with_span(
                DiagnosticKind::TypeMismatch,
                "switch discriminant must be int",
                switch.discriminant.span().start,
            ));
        }
        let disc_v = disc.as_rvalue(self)?.into_int_value();

        let after_bb = self.context.append_basic_block(function, "switch.after");
        let mut case_blocks = Vec::with_capacity(switch.cases.len());
        let mut jump_table = Vec::new();
        let mut default_bb = None;
        for (i, case) in switch.cases.iter().enumerate() {
            match &case.test {
                Some(test) => {
                    let value = match test {
                        Expr::Int(lit) => {
                            self.i32_t.const_int(lit.value as i64 as u64, true)
                        }
                        other => {
                            return Err(Diagnostic::with_span(
                                DiagnosticKind::UnsupportedSyntacticCategory,
                                format!("non-constant switch case label ({})", other.category()),
                                other.span().start,
                            ));
                        }
                    };
                    let bb = self
                        .context
                        .append_basic_block(function, &format!("switch.case{}", i));
                    jump_table.push((value, bb));
                    case_blocks.push(bb);
                }
                None => {
                    let bb = self.context.append_basic_block(function, "switch.default");
                    default_bb = Some(bb);
                    case_blocks.push(bb);
                }
            }
        }

        self.builder
            .build_switch(disc_v, default_bb.unwrap_or(after_bb), &jump_table)
            .map_err(|_| Diagnostic::internal("switch emission failed"))?;

        {
            let _pad = self.enter_switch(after_bb);
            for (i, case) in switch.cases.iter().enumerate() {
                self.builder.position_at_end(case_blocks[i]);
                let terminated = self.generate_stmts(&case.body, function)?;
                if !terminated {
                    let next = case_blocks.get(i + 1).copied().unwrap_or(after_bb);
                    self.builder
                        .build_unconditional_branch(next)
                        .map_err(|_| Diagnostic::internal("branch emission failed"))?;
                }
            }
        }

        self.builder.position_at_end(after_bb);
        Ok(false)
    }

    fn gen_break(&self, brk: &BreakStmt) -> DiagnosticResult<bool> {
        let target = self.nearest_break().ok_or_else(|| {
            Diagnostic::with_span(
                DiagnosticKind::UnstructuredControlFlow,
                "break outside of loop or switch",
                brk.span.start,
            )
        })?;
        self.builder
            .build_unconditional_branch(target)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;
        Ok(true)
    }

    fn gen_continue(&self, cont: &ContinueStmt) -> DiagnosticResult<bool> {
        let target = self.nearest_continue().ok_or_else(|| {
            Diagnostic::with_span(
                DiagnosticKind::UnstructuredControlFlow,
                "continue outside of loop",
                cont.span.start,
            )
        })?;
        self.builder
            .build_unconditional_branch(target)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;
        Ok(true)
    }

    /// `return` routes through the function epilogue, which owns the
    /// single return instruction.
    fn gen_return(&self, ret: &ReturnStmt, function: FunctionValue<'a>) -> DiagnosticResult<bool> {
        let (epilogue, ret_ty) = match &*self.ret.borrow() {
            Some(ctx) => (ctx.epilogue, ctx.ret_ty.clone()),
            None => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::UnstructuredControlFlow,
                    "return outside of function",
                    ret.span.start,
                ));
            }
        };

        match (&ret.arg, &ret_ty) {
            (None, Type::Void) => {}
            (Some(_), Type::Void) => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    "void function returns a value",
                    ret.span.start,
                ));
            }
            (None, _) => {
                return Err(Diagnostic::with_span(
                    DiagnosticKind::TypeMismatch,
                    "missing return value",
                    ret.span.start,
                ));
            }
            (Some(arg), _) => {
                let v = self.generate_expr(arg, function)?;
                let raw = v.as_rvalue(self)?;
                let coerced = self.coerce(raw, &v.ty(), &ret_ty, arg.span().start)?;
                let block = self
                    .builder
                    .get_insert_block()
                    .ok_or_else(|| Diagnostic::internal("builder has no insertion block"))?;
                if let Some(ctx) = self.ret.borrow_mut().as_mut() {
                    ctx.incomings.push((coerced, block));
                }
            }
        }

        self.builder
            .build_unconditional_branch(epilogue)
            .map_err(|_| Diagnostic::internal("branch emission failed"))?;
        Ok(true)
    }
}
