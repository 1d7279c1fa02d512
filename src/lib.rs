//! A compiler for a small imperative language with scoped variables, typed
//! pointers and byte buffers, targeting NASM flavoured x86-64 assembly.
//!
//! [`compile`] runs the whole pipeline over a single source file.

use tracing::debug;

use crate::{
    codegen::Target,
    token::Spanned,
    type_checker::Checker,
    util::intern::Interner,
};

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The type checker resolves the type and role of every expression of the
/// AST, annotating it in place.
pub mod type_checker;

/// The generator maps a checked AST into assembly text.
pub mod codegen;

pub mod arena;
pub mod ast;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

/// Options of a compilation.
#[derive(Copy, Clone, Debug)]
pub struct Config {
    pub target: Target,
    /// How many nodes of each kind the program may have.
    pub arena_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: Target::default(),
            arena_capacity: arena::DEFAULT_CAPACITY,
        }
    }
}

/// The first error found by any of the stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    Lexer(Spanned<lexer::Error>),
    Parser(Spanned<parser::Error>),
    Checker(Spanned<type_checker::Error>),
    Codegen(Spanned<codegen::Error>),
}

impl From<Spanned<parser::Error>> for CompileError {
    fn from(Spanned { span, inner }: Spanned<parser::Error>) -> Self {
        match inner {
            parser::Error::Lexer(error) => CompileError::Lexer(span.wrap(error)),
            error => CompileError::Parser(span.wrap(error)),
        }
    }
}

impl From<Spanned<type_checker::Error>> for CompileError {
    fn from(error: Spanned<type_checker::Error>) -> Self {
        CompileError::Checker(error)
    }
}

impl From<Spanned<codegen::Error>> for CompileError {
    fn from(error: Spanned<codegen::Error>) -> Self {
        CompileError::Codegen(error)
    }
}

/// Compiles `src` into assembly for the configured target.
///
/// Identifiers are interned into `ident_interner`, which is also what
/// diagnostics need to be displayed.
pub fn compile(
    src: &str,
    ident_interner: &mut Interner<str>,
    config: &Config,
) -> Result<String, CompileError> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    let mut program =
        parser::parse_program(src, &mut tokens, ident_interner, config.arena_capacity)?;
    debug!(
        tokens = tokens.len(),
        statements = program.nodes.stmts.len(),
        expressions = program.nodes.exprs.len(),
        "parsed program"
    );

    let symbols = Checker::with_capacity(64).check(&mut program)?;
    debug!(globals = symbols.len(), "checked program");

    let asm = codegen::generate(ident_interner, config.target, &program)?;
    debug!(triple = config.target.triple(), bytes = asm.len(), "generated assembly");
    Ok(asm)
}
