#![allow(clippy::items_after_statements)]

use std::fmt::Formatter;

use crate::{
    codegen, lexer, parser,
    token::{Span, Spanned},
    type_checker,
    util::fmt::{Context, Show},
    CompileError,
};

/// Writes the `[stage] line N: ` prefix of alternate diagnostics.
fn prefix(f: &mut Formatter<'_>, stage: &str, span: Span) -> std::fmt::Result {
    if f.alternate() {
        write!(f, "[{stage}] line {}: ", span.line)?;
    }
    Ok(())
}

impl Show for CompileError {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lexer(error) => error.show(f, ctx),
            CompileError::Parser(error) => error.show(f, ctx),
            CompileError::Checker(error) => error.show(f, ctx),
            CompileError::Codegen(error) => error.show(f, ctx),
        }
    }
}

impl Show for Spanned<lexer::Error> {
    fn show(&self, f: &mut Formatter<'_>, _: &Context<'_>) -> std::fmt::Result {
        prefix(f, "lexer", self.span)?;
        show_lexer_error(f, self.inner)
    }
}

fn show_lexer_error(f: &mut Formatter<'_>, error: lexer::Error) -> std::fmt::Result {
    use lexer::Error::*;
    match error {
        UnexpectedChar(c) => write!(f, "unexpected character '{}'", c.escape_debug()),
        UnclosedComment => write!(f, "unclosed block comment"),
        UnclosedString => write!(f, "unclosed string literal"),
        UnescapedLineBreak => write!(f, "unescaped line break in literal"),
        InvalidCharLiteral => write!(f, "invalid character literal"),
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut Formatter<'_>, _: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        use parser::Error::*;
        if let Lexer(error) = error {
            prefix(f, "lexer", *span)?;
            return show_lexer_error(f, *error);
        }

        prefix(f, "parser", *span)?;
        match error {
            Unexpected { actual, expected } => write!(
                f,
                "expected {}, but got {}",
                expected.describe(),
                actual.describe()
            ),
            ExpectedExpr { actual } => {
                write!(f, "expected an expression, but got {}", actual.describe())
            }
            ExpectedStatement { actual } => {
                write!(f, "expected a statement, but got {}", actual.describe())
            }
            ExpectedLvalue { actual } => {
                write!(f, "expected an lvalue, but got {}", actual.describe())
            }
            ExpectedScope { actual } => {
                write!(f, "expected a scope, but got {}", actual.describe())
            }
            AddressOfAsLvalue => write!(f, "cannot use an address-of expression as an lvalue"),
            InvalidElementCount => write!(f, "element count must be at least 1"),
            ParseInt => write!(f, "integer literal out of bounds"),
            ArenaExhausted { capacity } => write!(
                f,
                "program too large, more than {capacity} nodes of the same kind"
            ),
            Lexer(_) => unreachable!("handled above"),
        }
    }
}

impl Show for Spanned<type_checker::Error> {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;
        prefix(f, "checker", *span)?;

        use type_checker::Error::*;
        match error {
            UndeclaredIdentifier(name) => write!(f, "'{}' was never declared", i.get(name)),
            Redeclaration {
                name,
                other_definition_span,
            } => write!(
                f,
                "'{}' is already declared on line {}",
                i.get(name),
                other_definition_span.line
            ),
            IncompatibleOperands { op, lhs, rhs } => write!(
                f,
                "operator '{}' cannot combine {lhs} and {rhs}",
                op.symbol()
            ),
            IncompatibleAssignment { lvalue, rvalue } => {
                write!(f, "cannot assign a value of type {rvalue} to {lvalue}")
            }
            NotAssignable(name) => write!(f, "buffer '{}' is not assignable", i.get(name)),
            DerefNonPointer { actual } => {
                write!(f, "cannot dereference a value of type {actual}")
            }
            UnknownPointee => write!(f, "cannot dereference a pointer of unknown pointee"),
            OffsetNotInt { actual } => {
                write!(f, "offset must be an int, but got {actual}")
            }
            StepNotInt { actual } => {
                write!(f, "increment step must be an int, but got {actual}")
            }
            InvalidWriteOperand { actual } => {
                write!(f, "can only write a char or a char*, but got {actual}")
            }
            WriteCountNotInt { actual } => {
                write!(f, "write count must be an int, but got {actual}")
            }
            InvalidPrintOperand { actual } => {
                write!(f, "can only print an int or a char, but got {actual}")
            }
        }
    }
}

impl Show for Spanned<codegen::Error> {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;
        prefix(f, "codegen", *span)?;

        use codegen::Error::*;
        match error {
            UnboundVariable(name) => {
                write!(f, "'{}' has no stack slot in this scope", i.get(name))
            }
            Unchecked => write!(f, "expression was not type checked"),
        }
    }
}
