//! Object emission and linking.
//!
//! Final stages of compilation: serialize the verified LLVM module to a
//! `wasm32-unknown-unknown` object file, then drive the external linker
//! to produce the WebAssembly module, with the precompiled runtime
//! archive on the link line. The linker is a collaborator, not part of
//! the core; everything behind `Command` is replaceable via
//! `CompileOptions::linker`.

use anyhow::{Context as _, Result};
use inkwell::OptimizationLevel;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetTriple,
};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::CompileOptions;

const WASM_TRIPLE: &str = "wasm32-unknown-unknown";

fn opt_level(options: &CompileOptions) -> OptimizationLevel {
    match options.opt_level.as_deref() {
        Some("none") => OptimizationLevel::None,
        Some("aggressive") => OptimizationLevel::Aggressive,
        _ => OptimizationLevel::Default,
    }
}

/// Serializes the module to a wasm object file.
pub fn compile_to_object(
    module: &Module,
    options: &CompileOptions,
    out_obj: &Path,
) -> Result<()> {
    Target::initialize_webassembly(&InitializationConfig::default());

    let triple = TargetTriple::create(WASM_TRIPLE);
    module.set_triple(&triple);

    let target = Target::from_triple(&triple)
        .map_err(|e| anyhow::anyhow!("failed to resolve wasm target: {}", e))?;
    let cpu = options.target_cpu.clone().unwrap_or_default();
    let features = options.target_features.clone().unwrap_or_default();
    let tm = target
        .create_target_machine(
            &triple,
            &cpu,
            &features,
            opt_level(options),
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or_else(|| anyhow::anyhow!("failed to create wasm target machine"))?;

    tm.write_to_file(module, FileType::Object, out_obj)
        .map_err(|e| anyhow::anyhow!("failed to emit object file {}: {:?}", out_obj.display(), e))
}

/// Links the object file into a WebAssembly module, exporting exactly the
/// compiled candidates.
pub fn link_wasm(
    obj: &Path,
    exports: &[String],
    options: &CompileOptions,
    out_wasm: &Path,
) -> Result<()> {
    let linker = options.linker.as_deref().unwrap_or("wasm-ld");
    let mut cmd = Command::new(linker);
    cmd.arg("--no-entry");
    for export in exports {
        cmd.arg(format!("--export={}", export));
    }
    match &options.runtime_archive {
        Some(archive) => {
            cmd.arg(archive);
        }
        None => {
            // Without the runtime archive the runtime externs stay
            // imports of the produced module.
            cmd.arg("--allow-undefined");
        }
    }
    cmd.arg(obj).arg("-o").arg(out_wasm);

    let status = cmd
        .status()
        .with_context(|| format!("failed to spawn linker '{}'", linker))?;
    if !status.success() {
        anyhow::bail!("linker '{}' exited with {}", linker, status);
    }
    Ok(())
}

/// Emits the object and (unless `emit_object_only`) links the final
/// `.wasm` artifact. Returns the path of the produced file.
pub fn produce_artifact(
    module: &Module,
    exports: &[String],
    options: &CompileOptions,
) -> Result<PathBuf> {
    let out_dir: PathBuf = match &options.out_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory {}", dir))?;
            PathBuf::from(dir)
        }
        None => tempfile::Builder::new()
            .prefix("veloc-")
            .tempdir()
            .context("failed to create scratch directory")?
            .keep(),
    };

    let stem = options
        .out_name
        .clone()
        .unwrap_or_else(|| options.module_name.clone());
    let out_obj = out_dir.join(format!("{}.o", stem));
    compile_to_object(module, options, &out_obj)?;
    if options.emit_object_only {
        return Ok(out_obj);
    }

    let out_wasm = out_dir.join(format!("{}.wasm", stem));
    link_wasm(&out_obj, exports, options, &out_wasm)?;
    Ok(out_wasm)
}
