// program ::= stmt*
// stmt ::= exit '(' expr ')' ';'
//        | TYPE ['*'] ['<' integer '>'] ID ';'
//        | lvalue ['=' expr] ';'
//        | '{' stmt* '}'
//        | if '|' expr '|' stmt (elif '|' expr '|' stmt)* [else stmt]
//        | loop '|' expr '|' '{' stmt* '}'
//        | write '|' expr '|' [',' '|' expr '|'] ['<>'] ';'
//        | write string ['<>'] ';'
//        | print '|' expr '|' ['<>'] ';'
// lvalue ::= ID
//          | '*' lvalue ['[' expr ']']
//          | '++' lvalue ['[' expr ']']
//          | '(' lvalue ')'
// expr ::= expr op expr
//        | '&' lvalue
//        | lvalue
//        | '(' expr ')'
//        | integer
//        | char
// TYPE ::= int | char

// Precedence (tighter first, all left-associative)
//
// * / %
// + -
// > < == !=

use crate::{
    arena::{Arena, Id},
    token::Span,
    types::{DataType, Role, Type},
    util::intern::Interned,
};

pub type ExprId = Id<Expr>;
pub type StmtId = Id<Stmt>;
pub type ChainId = Id<IfChain>;

#[derive(Debug)]
pub struct Program {
    /// Top-level statements, in source order.
    pub body: Vec<StmtId>,
    pub nodes: Nodes,
}

/// Owns every node of a program.
#[derive(Debug)]
pub struct Nodes {
    pub exprs: Arena<Expr>,
    pub stmts: Arena<Stmt>,
    pub chains: Arena<IfChain>,
}

impl Nodes {
    pub fn with_capacity(capacity: usize) -> Nodes {
        Nodes {
            exprs: Arena::with_capacity(capacity),
            stmts: Arena::with_capacity(capacity),
            chains: Arena::with_capacity(capacity),
        }
    }
}

#[derive(Debug)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum StmtKind {
    Exit(ExprId),
    Declare(Declaration),
    Assign {
        lvalue: ExprId,
        /// Absent for bare side-effecting statements, such as `++i;`.
        rvalue: Option<ExprId>,
    },
    Scope(Vec<StmtId>),
    If {
        predicate: ExprId,
        body: StmtId,
        chain: Option<ChainId>,
    },
    Loop {
        predicate: ExprId,
        /// Always a scope.
        body: StmtId,
    },
    Write {
        operand: WriteOperand,
        count: Option<ExprId>,
        newline: bool,
    },
    Print {
        expr: ExprId,
        newline: bool,
    },
}

#[derive(Debug)]
pub struct Declaration {
    pub name: Ident,
    /// The written type. `Ptr` if declared with `*`.
    pub ty: DataType,
    /// Present iff `ty` is `Ptr`.
    pub pointee: Option<DataType>,
    /// Number of elements; greater than one for buffers.
    pub count: u32,
}

impl Declaration {
    pub fn is_buffer(&self) -> bool {
        self.count > 1
    }

    /// Number of bytes the declared variable occupies.
    pub fn size(&self) -> usize {
        self.ty.size() * self.count as usize
    }
}

#[derive(Debug)]
pub enum WriteOperand {
    Literal(Box<[u8]>),
    Expr(ExprId),
}

#[derive(Debug)]
pub enum IfChain {
    Elif {
        predicate: ExprId,
        body: StmtId,
        next: Option<ChainId>,
    },
    Else {
        body: StmtId,
    },
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Filled in by the type checker.
    pub info: Option<ExprInfo>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Expr {
        Expr {
            kind,
            span,
            info: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExprInfo {
    pub ty: Type,
    pub role: Role,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Char(u8),
    Id(Ident),
    Paren(ExprId),
    Binary {
        op: BinaryOperator,
        lhs: ExprId,
        rhs: ExprId,
    },
    Deref {
        target: ExprId,
        /// In elements of the pointee type.
        offset: Option<ExprId>,
    },
    Increment {
        target: ExprId,
        step: Option<ExprId>,
    },
    AddressOf {
        target: ExprId,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Eq,
    Ne,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Gt => ">",
            BinaryOperator::Lt => "<",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ident {
    pub name: Interned<str>,
    pub span: Span,
}

impl From<Ident> for Interned<str> {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned<str> {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
