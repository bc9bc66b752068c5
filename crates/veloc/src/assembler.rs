//! Module assembly.
//!
//! The assembler gathers the compilation candidates (functions whose
//! leading statement is the `"use velo"` directive), declares them all up
//! front so calls between candidates resolve regardless of order, then
//! compiles each in declaration order. Errors are aggregated per function:
//! one malformed function does not abort the others, but any error
//! suppresses the final artifact. On success the whole module is run
//! through the LLVM verifier before serialization.

use velo_ast::{FnDecl, Module};

use crate::codegen::CodeGen;
use crate::diagnostics::{self, Diagnostic, DiagnosticKind};

/// The directive marking a function as a compilation candidate.
pub const DIRECTIVE: &str = "use velo";

/// A diagnostic attributed to the function it was raised in.
#[derive(Debug, Clone)]
pub struct FunctionError {
    pub function: String,
    pub diagnostic: Diagnostic,
}

/// Result of a successful assembly: the exported symbol set corresponds
/// exactly to the compiled candidates.
#[derive(Debug, Clone)]
pub struct AssembledModule {
    pub exports: Vec<String>,
}

/// True when the function opts into compilation.
pub fn is_candidate(func: &FnDecl) -> bool {
    func.leading_directive() == Some(DIRECTIVE)
}

/// Compiles every candidate in `module` into `cg`'s LLVM module.
pub fn assemble<'a>(
    cg: &CodeGen<'a>,
    module: &Module,
) -> Result<AssembledModule, Vec<FunctionError>> {
    let candidates: Vec<&FnDecl> = module.functions.iter().filter(|f| is_candidate(f)).collect();

    let mut errors = Vec::new();
    let mut declared = Vec::with_capacity(candidates.len());
    for func in &candidates {
        match cg.declare_function(func) {
            Ok(_) => declared.push(true),
            Err(diagnostic) => {
                diagnostics::emit_diagnostic(&diagnostic, Some(cg.source));
                errors.push(FunctionError {
                    function: func.ident.name.clone(),
                    diagnostic,
                });
                declared.push(false);
            }
        }
    }

    for (func, ok) in candidates.iter().zip(&declared) {
        if !ok {
            continue;
        }
        if let Err(diagnostic) = cg.compile_function(func) {
            diagnostics::emit_diagnostic(&diagnostic, Some(cg.source));
            errors.push(FunctionError {
                function: func.ident.name.clone(),
                diagnostic,
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    if let Err(message) = cg.module.verify() {
        return Err(vec![FunctionError {
            function: "<module>".to_string(),
            diagnostic: Diagnostic::new(
                DiagnosticKind::MalformedFunction,
                message.to_string(),
            ),
        }]);
    }

    Ok(AssembledModule {
        exports: candidates.iter().map(|f| f.ident.name.clone()).collect(),
    })
}
