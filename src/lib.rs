//! Compiler library for GoLite, a statically typed imperative subset of Go.
//!
//! The pipeline is a straight line: lex, parse, then the two-pass lowering
//! engine in [codegen] which produces a textual LLVM-compatible [llir]
//! module.
pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod llir;
pub mod parser;

use std::{error::Error, fmt::Display};

use codegen::CodegenError;
use lexer::LexError;
use parser::ParseError;

/// Any failure along the pipeline. Exactly one is reported per run; the
/// first (innermost) failure aborts compilation.
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Codegen(CodegenError),
}

impl Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex(err) => err.fmt(f),
            CompileError::Parse(err) => err.fmt(f),
            CompileError::Codegen(err) => err.fmt(f),
        }
    }
}

impl Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<CodegenError> for CompileError {
    fn from(err: CodegenError) -> Self {
        CompileError::Codegen(err)
    }
}

/// Compile GoLite source text to an LLIR module.
pub fn compile(source: &str) -> Result<llir::Module, CompileError> {
    let tokens = lexer::Lexer::new(source).lex()?;
    let file = parser::parse(tokens)?;
    let module = codegen::generate(&file)?;
    Ok(module)
}
