use thiserror::Error;

use crate::vm::VmError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: u32, message: String },
    #[error("use of undeclared name '{name}' at line {line}")]
    UndeclaredName { name: String, line: u32 },
    #[error("call to '{name}' at line {line} expects {expected} arguments but received {given}")]
    CallArity {
        name: String,
        expected: usize,
        given: usize,
        line: u32,
    },
    #[error("unknown call '{name}' at line {line}")]
    UnknownCall { name: String, line: u32 },
    #[error(transparent)]
    Vm(#[from] VmError),
}
