//! Core compiler pipeline for the Parashade language.
//!
//! Parashade is a tiny statically-typed language with an assembly-inspired
//! surface syntax. The pipeline is roughly:
//!
//! ```text
//!   source .psd
//!     -> normalize     (long-form dialect -> core dialect)
//!     -> lexer         (tokens)
//!     -> parser        (AST)
//!     -> emit          (local slots + warnings + symbolic IR, with
//!                       constant folding of superlative calls)
//!     -> ir::finalize  (frozen little-endian byte stream)
//!
//! and then one of three back ends over the same IR:
//!
//!     -> vm            (stack VM over the bytes)          --run
//!     -> meta          (hex dump + metadata JSON)         --emit
//!     -> codegen_nasm  (Windows x64 assembly text)        --emit-nasm
//! ```
//!
//! Higher-level tools (the CLI, test harnesses) should depend on this
//! crate rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: normalization, lexing, parsing
// ---------------------------------------------------------------------

pub mod normalize;
pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic layer: builtin table, local slots, IR emission
// ---------------------------------------------------------------------

pub mod builtins;
pub mod locals;
pub mod ir;
pub mod emit;

// ---------------------------------------------------------------------
// Back-ends over the finalized IR
// ---------------------------------------------------------------------

pub mod vm;
pub mod codegen_nasm;
pub mod meta;

// ---------------------------------------------------------------------
// Utilities and orchestration
// ---------------------------------------------------------------------

pub mod capsule;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, compile, run};
pub use error::CoreError;
