use std::collections::HashMap;

use crate::{
    ast::{
        BinaryOperator, Declaration, ExprId, ExprInfo, ExprKind, IfChain, Nodes, Program, StmtId,
        StmtKind, WriteOperand,
    },
    token::{Span, Spanned},
    types::{DataType, Role, Type},
    util::intern::Interned,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// A declared variable, as seen by the checker.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: Interned<str>,
    /// For buffers, a pointer to the element type.
    pub ty: Type,
    pub count: u32,
    pub span: Span,
}

impl Symbol {
    pub fn is_buffer(&self) -> bool {
        self.count > 1
    }
}

/// Identifier to symbol mapping, organized as a stack of scopes.
///
/// A name is visible from its declaration up to the end of the enclosing
/// scope, which is when the generator releases its stack slot.
#[derive(Debug, Default)]
pub struct SymbolTable {
    map: HashMap<Interned<str>, Symbol>,
    /// Live names, in declaration order.
    stack: Vec<Interned<str>>,
    /// Length of `stack` at each scope entry.
    scopes: Vec<usize>,
}

impl SymbolTable {
    pub fn with_capacity(capacity: usize) -> SymbolTable {
        SymbolTable {
            map: HashMap::with_capacity(capacity),
            stack: Vec::with_capacity(capacity),
            scopes: Vec::with_capacity(8),
        }
    }

    pub fn get(&self, name: Interned<str>) -> Option<&Symbol> {
        self.map.get(&name)
    }

    /// Records a symbol, failing with the previous one if the name is live.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), Symbol> {
        if let Some(other) = self.map.get(&symbol.name) {
            return Err(*other);
        }
        self.stack.push(symbol.name);
        self.map.insert(symbol.name, symbol);
        Ok(())
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(self.stack.len());
    }

    pub fn exit_scope(&mut self) {
        let start = self.scopes.pop().expect("unbalanced scope exit");
        for name in self.stack.drain(start..) {
            self.map.remove(&name);
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Live symbols, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.stack.iter().map(|name| &self.map[name])
    }
}

/// Resolves the type and role of every expression of a program, writing them
/// into the expressions' `info` slots.
pub struct Checker {
    symbols: SymbolTable,
}

impl Checker {
    pub fn with_capacity(capacity: usize) -> Checker {
        Checker {
            symbols: SymbolTable::with_capacity(capacity),
        }
    }

    /// Checks the whole program, stopping at the first error. Returns the
    /// symbols declared at the top level.
    pub fn check(mut self, program: &mut Program) -> Result<SymbolTable> {
        let nodes = &mut program.nodes;
        for &stmt in &program.body {
            self.stmt(nodes, stmt)?;
        }
        Ok(self.symbols)
    }

    fn stmt(&mut self, nodes: &mut Nodes, stmt: StmtId) -> Result<()> {
        let span = nodes.stmts[stmt].span;
        // Children are copied out so that `nodes` may be mutated below.
        match &nodes.stmts[stmt].kind {
            StmtKind::Exit(expr) => {
                let expr = *expr;
                self.expr(nodes, expr, Role::Rvalue)?;
            }
            StmtKind::Declare(decl) => {
                let symbol = Symbol {
                    name: decl.name.name,
                    ty: declared_type(decl),
                    count: decl.count,
                    span: decl.name.span,
                };
                self.declare(symbol)?;
            }
            StmtKind::Assign { lvalue, rvalue } => {
                let (lvalue, rvalue) = (*lvalue, *rvalue);
                let lvalue_ty = self.expr(nodes, lvalue, Role::Lvalue)?;
                if let Some(rvalue) = rvalue {
                    self.ensure_assignable(nodes, lvalue)?;
                    let rvalue_ty = self.expr(nodes, rvalue, Role::Rvalue)?;
                    if !is_assignable(lvalue_ty, rvalue_ty) {
                        let error = Error::IncompatibleAssignment {
                            lvalue: lvalue_ty,
                            rvalue: rvalue_ty,
                        };
                        return Err(span.wrap(error));
                    }
                }
            }
            StmtKind::Scope(body) => {
                let body = body.clone();
                self.symbols.enter_scope();
                for stmt in body {
                    self.stmt(nodes, stmt)?;
                }
                self.symbols.exit_scope();
            }
            StmtKind::If {
                predicate,
                body,
                chain,
            } => {
                let (predicate, body, mut next) = (*predicate, *body, *chain);
                self.expr(nodes, predicate, Role::Rvalue)?;
                self.scoped_stmt(nodes, body)?;
                while let Some(link) = next {
                    match nodes.chains[link] {
                        IfChain::Elif {
                            predicate,
                            body,
                            next: rest,
                        } => {
                            self.expr(nodes, predicate, Role::Rvalue)?;
                            self.scoped_stmt(nodes, body)?;
                            next = rest;
                        }
                        IfChain::Else { body } => {
                            self.scoped_stmt(nodes, body)?;
                            next = None;
                        }
                    }
                }
            }
            StmtKind::Loop { predicate, body } => {
                let (predicate, body) = (*predicate, *body);
                self.expr(nodes, predicate, Role::Rvalue)?;
                self.stmt(nodes, body)?;
            }
            StmtKind::Write {
                operand,
                count,
                newline: _,
            } => {
                let count = *count;
                if let WriteOperand::Expr(expr) = operand {
                    let expr = *expr;
                    let ty = self.expr(nodes, expr, Role::Rvalue)?;
                    let writable = ty == Type::CHAR || ty == Type::pointer_to(DataType::Char);
                    if !writable {
                        let span = nodes.exprs[expr].span;
                        return Err(span.wrap(Error::InvalidWriteOperand { actual: ty }));
                    }
                }
                if let Some(count) = count {
                    self.int_operand(nodes, count, |actual| Error::WriteCountNotInt { actual })?;
                }
            }
            StmtKind::Print { expr, newline: _ } => {
                let expr = *expr;
                let ty = self.expr(nodes, expr, Role::Rvalue)?;
                if ty.is_ptr() {
                    let span = nodes.exprs[expr].span;
                    return Err(span.wrap(Error::InvalidPrintOperand { actual: ty }));
                }
            }
        }
        Ok(())
    }

    /// Checks the body of a conditional branch. Declarations made directly in
    /// it (`if |c| int x;`) are confined to the branch.
    fn scoped_stmt(&mut self, nodes: &mut Nodes, stmt: StmtId) -> Result<()> {
        self.symbols.enter_scope();
        self.stmt(nodes, stmt)?;
        self.symbols.exit_scope();
        Ok(())
    }

    fn declare(&mut self, symbol: Symbol) -> Result<()> {
        self.symbols.insert(symbol).map_err(|other| {
            symbol.span.wrap(Error::Redeclaration {
                name: symbol.name,
                other_definition_span: other.span,
            })
        })
    }

    /// Resolves the type of `expr` in the provided role and records it.
    fn expr(&mut self, nodes: &mut Nodes, expr: ExprId, role: Role) -> Result<Type> {
        let span = nodes.exprs[expr].span;
        let ty = match nodes.exprs[expr].kind {
            ExprKind::Int(_) => Type::INT,
            ExprKind::Char(_) => Type::CHAR,
            ExprKind::Id(ident) => match self.symbols.get(ident.name) {
                Some(symbol) => symbol.ty,
                None => return Err(span.wrap(Error::UndeclaredIdentifier(ident.name))),
            },
            ExprKind::Paren(inner) => self.expr(nodes, inner, role)?,
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.expr(nodes, lhs, Role::Rvalue)?;
                let rhs = self.expr(nodes, rhs, Role::Rvalue)?;
                binary_result(lhs, rhs).ok_or_else(|| {
                    span.wrap(Error::IncompatibleOperands { op, lhs, rhs })
                })?
            }
            ExprKind::Deref { target, offset } => {
                let target_ty = self.expr(nodes, target, Role::Rvalue)?;
                if !target_ty.is_ptr() {
                    let error = Error::DerefNonPointer { actual: target_ty };
                    return Err(nodes.exprs[target].span.wrap(error));
                }
                let Some(pointee) = target_ty.pointee else {
                    return Err(nodes.exprs[target].span.wrap(Error::UnknownPointee));
                };
                if let Some(offset) = offset {
                    self.int_operand(nodes, offset, |actual| Error::OffsetNotInt { actual })?;
                }
                Type::scalar(pointee)
            }
            ExprKind::Increment { target, step } => {
                let target_ty = self.expr(nodes, target, Role::Lvalue)?;
                self.ensure_assignable(nodes, target)?;
                if let Some(step) = step {
                    self.int_operand(nodes, step, |actual| Error::StepNotInt { actual })?;
                }
                target_ty
            }
            ExprKind::AddressOf { target } => {
                let target_ty = self.expr(nodes, target, Role::Lvalue)?;
                if self.buffer_of(nodes, target).is_some() {
                    // Already a pointer to the first element.
                    target_ty
                } else {
                    Type::pointer_to(target_ty.data)
                }
            }
        };
        nodes.exprs[expr].info = Some(ExprInfo { ty, role });
        Ok(ty)
    }

    /// Checks an operand that must be an `int`.
    fn int_operand(
        &mut self,
        nodes: &mut Nodes,
        expr: ExprId,
        error: impl FnOnce(Type) -> Error,
    ) -> Result<()> {
        let ty = self.expr(nodes, expr, Role::Rvalue)?;
        if ty == Type::INT {
            Ok(())
        } else {
            Err(nodes.exprs[expr].span.wrap(error(ty)))
        }
    }

    fn ensure_assignable(&self, nodes: &Nodes, target: ExprId) -> Result<()> {
        match self.buffer_of(nodes, target) {
            Some(symbol) => {
                let span = nodes.exprs[target].span;
                Err(span.wrap(Error::NotAssignable(symbol.name)))
            }
            None => Ok(()),
        }
    }

    /// Returns the buffer symbol `expr` names, looking through parentheses.
    fn buffer_of(&self, nodes: &Nodes, mut expr: ExprId) -> Option<&Symbol> {
        loop {
            match nodes.exprs[expr].kind {
                ExprKind::Paren(inner) => expr = inner,
                ExprKind::Id(ident) => {
                    return self.symbols.get(ident.name).filter(|s| s.is_buffer());
                }
                _ => return None,
            }
        }
    }
}

/// The type a declaration gives to its name. Buffers decay to a pointer to
/// their element type.
pub fn declared_type(decl: &Declaration) -> Type {
    if decl.is_buffer() {
        Type::pointer_to(decl.ty)
    } else {
        Type {
            data: decl.ty,
            pointee: decl.pointee,
        }
    }
}

/// Result type of a binary operator, or `None` if the operands can't be
/// combined.
///
/// Comparisons follow the same rule as arithmetic, even though they only ever
/// produce 0 or 1.
fn binary_result(lhs: Type, rhs: Type) -> Option<Type> {
    use DataType::*;
    match (lhs.data, rhs.data) {
        (Char, Ptr) | (Ptr, Char) => None,
        (Ptr, _) => Some(lhs),
        (_, Ptr) => Some(rhs),
        (l, r) => Some(Type::scalar(l.max(r))),
    }
}

/// Pointers only mix with pointers. `int` and `char` convert freely to the
/// lvalue's type.
fn is_assignable(lvalue: Type, rvalue: Type) -> bool {
    lvalue.data == rvalue.data || !(lvalue.is_ptr() || rvalue.is_ptr())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UndeclaredIdentifier(Interned<str>),
    Redeclaration {
        name: Interned<str>,
        other_definition_span: Span,
    },
    IncompatibleOperands {
        op: BinaryOperator,
        lhs: Type,
        rhs: Type,
    },
    IncompatibleAssignment {
        lvalue: Type,
        rvalue: Type,
    },
    NotAssignable(Interned<str>),
    DerefNonPointer {
        actual: Type,
    },
    UnknownPointee,
    OffsetNotInt {
        actual: Type,
    },
    StepNotInt {
        actual: Type,
    },
    InvalidWriteOperand {
        actual: Type,
    },
    WriteCountNotInt {
        actual: Type,
    },
    InvalidPrintOperand {
        actual: Type,
    },
}

#[cfg(test)]
mod tests {
    use crate::{
        parser::test_utils::parse_program,
        types::{DataType, Type},
        util::test_utils::tree_tests,
    };

    use super::{Checker, Error};

    tree_tests!(
        use checker;

        fn test_annotates_every_expression() {
            let program = "int x; x = 5; exit(x);";
            let tree_ok = "
                declare x: int
                assign
                  ident x (7..8 %: int lvalue)
                  int 5 (11..12 %: int rvalue)
                exit
                  ident x (19..20 %: int rvalue)
            ";
        }

        fn test_buffer_decays_to_pointer() {
            let program = "int<3> a; exit(*a[1]);";
            let tree_ok = "
                declare a: int <3>
                exit
                  deref (15..20 %: int rvalue)
                    ident a (16..17 %: int* rvalue)
                    offset
                      int 1 (18..19 %: int rvalue)
            ";
        }

        fn test_char_and_pointer_never_mix() {
            let program = "char c; char* p; p = p + c - c; exit(c + 1);";
            let expected_error = "[checker] line 1: operator '+' cannot combine char* and char";
        }

        fn test_int_and_char_mix() {
            let program = "char c; int i; i = c * 2; c = i;";
            let tree_ok = "
                declare c: char
                declare i: int
                assign
                  ident i (15..16 %: int lvalue)
                  binary Mul (19..24 %: char rvalue)
                    ident c (19..20 %: char rvalue)
                    int 2 (23..24 %: int rvalue)
                assign
                  ident c (26..27 %: char lvalue)
                  ident i (30..31 %: int rvalue)
            ";
        }

        fn test_pointer_arithmetic_keeps_pointee() {
            let program = "int* p; int n; p = p + n; n = *(p + 1);";
            let tree_ok = "
                declare p: int*
                declare n: int
                assign
                  ident p (15..16 %: int* lvalue)
                  binary Add (19..24 %: int* rvalue)
                    ident p (19..20 %: int* rvalue)
                    ident n (23..24 %: int rvalue)
                assign
                  ident n (26..27 %: int lvalue)
                  deref (30..38 %: int rvalue)
                    paren (31..38 %: int* rvalue)
                      binary Add (32..37 %: int* rvalue)
                        ident p (32..33 %: int* rvalue)
                        int 1 (36..37 %: int rvalue)
            ";
        }

        fn test_address_of() {
            let program = "char c; char<4> b; char* p; p = &c; p = &b;";
            let tree_ok = "
                declare c: char
                declare b: char <4>
                declare p: char*
                assign
                  ident p (28..29 %: char* lvalue)
                  address-of (32..34 %: char* rvalue)
                    ident c (33..34 %: char lvalue)
                assign
                  ident p (36..37 %: char* lvalue)
                  address-of (40..42 %: char* rvalue)
                    ident b (41..42 %: char* lvalue)
            ";
        }

        fn test_increment_as_statement() {
            let program = "int i; ++i[2];";
            let tree_ok = "
                declare i: int
                assign
                  increment (7..13 %: int lvalue)
                    ident i (9..10 %: int lvalue)
                    step
                      int 2 (11..12 %: int rvalue)
            ";
        }

        fn test_char_into_pointer_is_rejected() {
            let program = "char c;\nint* p;\np = c;";
            let expected_error = "[checker] line 3: cannot assign a value of type char to int*";
        }

        fn test_pointer_into_int_is_rejected() {
            let program = "int* p;\nint i;\ni = p;";
            let expected_error = "[checker] line 3: cannot assign a value of type int* to int";
        }

        fn test_buffer_is_not_assignable() {
            let program = "char<2> b;\nchar* p;\nb = p;";
            let expected_error = "[checker] line 3: buffer 'b' is not assignable";
        }

        fn test_undeclared() {
            let program = "int x;\nx = y;";
            let expected_error = "[checker] line 2: 'y' was never declared";
        }

        fn test_out_of_scope() {
            let program = "{ int x; }\nexit(x);";
            let expected_error = "[checker] line 2: 'x' was never declared";
        }

        fn test_branch_declarations_are_scoped() {
            let program = "if |1| int x;\nexit(x);";
            let expected_error = "[checker] line 2: 'x' was never declared";
        }

        fn test_redeclaration_in_nested_scope() {
            let program = "int x;\n{\n  char x;\n}";
            let expected_error = "[checker] line 3: 'x' is already declared on line 1";
        }

        fn test_sibling_scopes_may_reuse_names() {
            let program = "{ int x; } { char x; }";
            let tree_ok = "
                scope
                  declare x: int
                scope
                  declare x: char
            ";
        }

        fn test_deref_non_pointer() {
            let program = "int i;\nexit(*i);";
            let expected_error = "[checker] line 2: cannot dereference a value of type int";
        }

        fn test_deref_unknown_pointee() {
            let program = "int*<2> ps;\nexit(**ps);";
            let expected_error = "[checker] line 2: cannot dereference a pointer of unknown pointee";
        }

        fn test_offset_must_be_int() {
            let program = "char* p; char c;\nc = *p['a'];";
            let expected_error = "[checker] line 2: offset must be an int, but got char";
        }

        fn test_step_must_be_int() {
            let program = "int* p;\n++p[p];";
            let expected_error = "[checker] line 2: increment step must be an int, but got int*";
        }

        fn test_write_operands() {
            let program = "char<8> b; char c; write |b|, |8| <>; write |c|; write \"hi\";";
            let tree_ok = r#"
                declare b: char <8>
                declare c: char
                write <>
                  ident b (26..27 %: char* rvalue)
                  count
                    int 8 (31..32 %: int rvalue)
                write
                  ident c (45..46 %: char rvalue)
                write "hi"
            "#;
        }

        fn test_write_rejects_int() {
            let program = "int i;\nwrite |i|;";
            let expected_error = "[checker] line 2: can only write a char or a char*, but got int";
        }

        fn test_write_count_must_be_int() {
            let program = "char c;\nwrite |c|, |c|;";
            let expected_error = "[checker] line 2: write count must be an int, but got char";
        }

        fn test_print_rejects_pointers() {
            let program = "int* p;\nprint |p|;";
            let expected_error = "[checker] line 2: can only print an int or a char, but got int*";
        }
    );

    #[test]
    fn returns_top_level_symbols() {
        let (i, mut program) = parse_program("int a; { char b; } char* c;");
        let symbols = Checker::with_capacity(8).check(&mut program).unwrap();

        let live: Vec<_> = symbols.iter().map(|s| (i.get(s.name), s.ty)).collect();
        assert_eq!(
            live,
            [("a", Type::INT), ("c", Type::pointer_to(DataType::Char))]
        );
        assert!(i.lookup("b").is_some_and(|b| symbols.get(b).is_none()));
    }

    #[test]
    fn redeclaration_points_to_the_first_definition() {
        let (i, mut program) = parse_program("int x; int x;");
        let error = Checker::with_capacity(8).check(&mut program).unwrap_err();
        let x = i.lookup("x").unwrap();
        assert_eq!(error.span.lo, 11);
        assert!(matches!(
            error.inner,
            Error::Redeclaration { name, other_definition_span } if name == x && other_definition_span.lo == 4
        ));
    }
}
