//! Pipeline orchestration.

use crate::emit::Emitter;
use crate::error::CoreError;
use crate::ir::{self, Instr};
use crate::locals::{Local, Warning};
use crate::normalize::normalize;
use crate::parser::parse;
use crate::vm;

/// Output of a compilation: the symbolic IR for the NASM backend, the
/// finalized byte stream for the VM and the hex dump, and the locals and
/// warnings for the metadata report.
#[derive(Debug)]
pub struct CompilationArtifact {
    pub module_name: String,
    pub code: Vec<Instr>,
    pub bytes: Vec<u8>,
    pub locals: Vec<Local>,
    pub warnings: Vec<Warning>,
}

/// Run the front half of the pipeline: normalize, parse, lower, finalize.
pub fn compile(source: &str) -> Result<CompilationArtifact, CoreError> {
    let core = normalize(source);
    let module = parse(&core)?;
    let lowered = Emitter::lower(&module.main)?;
    let bytes = ir::finalize(&lowered.code);
    Ok(CompilationArtifact {
        module_name: module.name,
        code: lowered.code,
        bytes,
        locals: lowered.locals,
        warnings: lowered.warnings,
    })
}

/// Compile and execute on the stack VM, returning the program result.
pub fn run(source: &str) -> Result<i64, CoreError> {
    let artifact = compile(source)?;
    let result = vm::run(&artifact.bytes, artifact.locals.len())?;
    Ok(result)
}
