//! Velo compiler core.
//!
//! Lowers a typed AST (produced by the external front-end checker) into a
//! WebAssembly module through LLVM IR. Only functions annotated with the
//! `"use velo"` leading directive are compiled; each becomes an exported
//! symbol of the produced module. The garbage-collected runtime is a
//! precompiled archive supplied at link time; the compiler declares its
//! externs by their stable mangled names.

pub mod assembler;
pub mod codegen;
pub mod diagnostics;
pub mod linking;
pub mod types;
pub mod value;

use inkwell::context::Context;

use crate::assembler::FunctionError;
use crate::codegen::CodeGen;

/// Compilation options.
///
/// The compiler accepts explicit options rather than discovering project
/// structure; CLI argument parsing and build orchestration live in the
/// driver, not here.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Name of the produced module
    pub module_name: String,

    /// Output directory for compilation artifacts; a scratch directory
    /// is used when absent
    pub out_dir: Option<String>,

    /// Override the output file stem
    pub out_name: Option<String>,

    /// Explicit linker binary (defaults to `wasm-ld`)
    pub linker: Option<String>,

    /// Stop after object emission, skip linking
    pub emit_object_only: bool,

    /// Optimization level: none, default, aggressive
    pub opt_level: Option<String>,

    /// Target CPU for code generation
    pub target_cpu: Option<String>,

    /// Target features to enable
    pub target_features: Option<String>,

    /// Path to the precompiled runtime archive to link against
    pub runtime_archive: Option<String>,
}

impl CompileOptions {
    pub fn new(module_name: impl Into<String>) -> Self {
        CompileOptions {
            module_name: module_name.into(),
            out_dir: None,
            out_name: None,
            linker: None,
            emit_object_only: false,
            opt_level: None,
            target_cpu: None,
            target_features: None,
            runtime_archive: None,
        }
    }
}

/// Outcome of one compilation: the artifact path when every candidate
/// compiled, otherwise the per-function errors. The artifact is
/// suppressed whenever any error occurred.
#[derive(Debug)]
pub struct CompileOutput {
    pub artifact: Option<std::path::PathBuf>,
    pub exports: Vec<String>,
    pub errors: Vec<FunctionError>,
}

/// Compiles a typed module.
///
/// `source` is the original source text, used only to render spans in
/// diagnostics; pass an empty string when unavailable.
pub fn compile(
    module: &velo_ast::Module,
    source: &str,
    options: &CompileOptions,
) -> anyhow::Result<CompileOutput> {
    let context = Context::create();
    let cg = CodeGen::new(&context, &options.module_name, source);

    match assembler::assemble(&cg, module) {
        Err(errors) => Ok(CompileOutput {
            artifact: None,
            exports: Vec::new(),
            errors,
        }),
        Ok(assembled) => {
            let artifact = linking::produce_artifact(&cg.module, &assembled.exports, options)?;
            Ok(CompileOutput {
                artifact: Some(artifact),
                exports: assembled.exports,
                errors: Vec::new(),
            })
        }
    }
}
