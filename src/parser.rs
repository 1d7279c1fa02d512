use crate::{
    arena::CapacityExceeded,
    ast::{
        BinaryOperator, ChainId, Declaration, Expr, ExprId, ExprKind, Ident, IfChain, Nodes,
        Program, Stmt, StmtId, StmtKind, WriteOperand,
    },
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
    types::{DataType, Role},
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Lexes and parses a whole program.
///
/// `capacity` bounds how many nodes of each kind the program may have.
pub fn parse_program(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
    capacity: usize,
) -> Result<Program> {
    let (body, nodes) = parse(src, tokens, ident_interner, capacity, Parser::parse_program)?;
    Ok(Program { body, nodes })
}

/// Lexes and parses a single expression, which must span the whole input.
pub fn parse_expr(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
    capacity: usize,
) -> Result<(ExprId, Nodes)> {
    parse(src, tokens, ident_interner, capacity, |p| {
        let expr = p.parse_expr()?;
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, 'ident, T>(
    src: &'src str,
    tokens: &'tok mut Vec<Token>,
    ident_interner: &'ident mut Interner<str>,
    capacity: usize,
    f: impl for<'a> FnOnce(&'a mut Parser<'src, 'tok, 'ident>) -> Result<T>,
) -> Result<(T, Nodes)> {
    assert!(tokens.is_empty());

    lexer::lex(src, tokens).map_err(|error| error.span.wrap(Error::Lexer(error.inner)))?;
    let mut p = Parser::new(src, tokens, ident_interner, capacity);
    let parsed = f(&mut p)?;
    Ok((parsed, p.nodes))
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner<str>,
    cursor: usize,
    /// Span of the last consumed token.
    last: Span,
    nodes: Nodes,
}

/// Statements.
impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Vec<StmtId>> {
        let mut body = Vec::with_capacity(16);
        while !self.is(TokenKind::Eof) {
            body.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::Eof)?;
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<StmtId> {
        let start = self.peek();
        let kind = match start.kind {
            TokenKind::Exit => {
                self.advance();
                self.consume(TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Exit(expr)
            }
            TokenKind::Int | TokenKind::Char => self.parse_declaration()?,
            TokenKind::LBrace => self.parse_scope()?,

            // Conditional: if |expr| stmt [elif |expr| stmt]* [else stmt]
            TokenKind::If => {
                self.advance();
                let predicate = self.parse_barred_expr()?;
                let body = self.parse_stmt()?;
                let chain = self.parse_if_chain()?;
                StmtKind::If {
                    predicate,
                    body,
                    chain,
                }
            }

            // Loop: loop |expr| { stmt* }
            TokenKind::Loop => {
                self.advance();
                let predicate = self.parse_barred_expr()?;
                let next = self.peek();
                if next.kind != TokenKind::LBrace {
                    let error = Error::ExpectedScope { actual: next.kind };
                    return Err(next.span().wrap(error));
                }
                let body = self.parse_stmt()?;
                StmtKind::Loop { predicate, body }
            }

            TokenKind::Write => self.parse_write()?,

            // Print: print |expr| ['<>'] ;
            TokenKind::Print => {
                self.advance();
                let expr = self.parse_barred_expr()?;
                let newline = self.take(TokenKind::Newline);
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Print { expr, newline }
            }

            // Assignment: lvalue [= expr] ;
            TokenKind::Identifier | TokenKind::Star | TokenKind::PlusPlus | TokenKind::LParen => {
                let lvalue = self.parse_term(Role::Lvalue)?;
                let rvalue = if self.take(TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.consume(TokenKind::Semicolon)?;
                StmtKind::Assign { lvalue, rvalue }
            }

            other => {
                let error = Error::ExpectedStatement { actual: other };
                return Err(start.span().wrap(error));
            }
        };
        let span = start.span().to(self.last);
        self.alloc_stmt(kind, span)
    }

    fn parse_declaration(&mut self) -> Result<StmtKind> {
        let ty = match self.advance().kind {
            TokenKind::Int => DataType::Int,
            TokenKind::Char => DataType::Char,
            _ => unreachable!("caller checks for a type token"),
        };
        let (ty, pointee) = if self.take(TokenKind::Star) {
            (DataType::Ptr, Some(ty))
        } else {
            (ty, None)
        };

        let count = if self.take(TokenKind::Less) {
            let token = self.consume(TokenKind::Number)?;
            let count = extract::int(token, self.src)
                .ok()
                .and_then(|count| u32::try_from(count).ok())
                .ok_or_else(|| token.span().wrap(Error::ParseInt))?;
            if count == 0 {
                return Err(token.span().wrap(Error::InvalidElementCount));
            }
            self.consume(TokenKind::Greater)?;
            count
        } else {
            1
        };

        let name = self.parse_ident()?;
        self.consume(TokenKind::Semicolon)?;
        Ok(StmtKind::Declare(Declaration {
            name,
            ty,
            pointee,
            count,
        }))
    }

    fn parse_scope(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::with_capacity(8);
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::RBrace)?;
        Ok(StmtKind::Scope(stmts))
    }

    fn parse_if_chain(&mut self) -> Result<Option<ChainId>> {
        let start = self.peek();
        let chain = if self.take(TokenKind::Elif) {
            let predicate = self.parse_barred_expr()?;
            let body = self.parse_stmt()?;
            let next = self.parse_if_chain()?;
            IfChain::Elif {
                predicate,
                body,
                next,
            }
        } else if self.take(TokenKind::Else) {
            let body = self.parse_stmt()?;
            IfChain::Else { body }
        } else {
            return Ok(None);
        };
        self.nodes
            .chains
            .alloc(chain)
            .map(Some)
            .map_err(|error| arena_error(start.span(), error))
    }

    fn parse_write(&mut self) -> Result<StmtKind> {
        self.consume(TokenKind::Write)?;

        let (operand, count) = if self.is(TokenKind::String) {
            let token = self.advance();
            (WriteOperand::Literal(extract::string(token, self.src)), None)
        } else {
            let expr = self.parse_barred_expr()?;
            let count = if self.take(TokenKind::Comma) {
                Some(self.parse_barred_expr()?)
            } else {
                None
            };
            (WriteOperand::Expr(expr), count)
        };

        let newline = self.take(TokenKind::Newline);
        self.consume(TokenKind::Semicolon)?;
        Ok(StmtKind::Write {
            operand,
            count,
            newline,
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        })
    }
}

/// Expressions.
impl Parser<'_, '_, '_> {
    fn parse_expr(&mut self) -> Result<ExprId> {
        self.parse_expr_prec(0)
    }

    /// Precedence climbing. The right operand is parsed with a threshold one
    /// above the operator's own tier, which makes every tier left-associative.
    fn parse_expr_prec(&mut self, min_prec: u8) -> Result<ExprId> {
        let mut lhs = self.parse_term(Role::Rvalue)?;

        while let Some((op, prec)) = Self::binary_operator(self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.advance(); // Operator
            let rhs = self.parse_expr_prec(prec + 1)?;

            let span = self.nodes.exprs[lhs].span.to(self.nodes.exprs[rhs].span);
            lhs = self.alloc_expr(ExprKind::Binary { op, lhs, rhs }, span)?;
        }

        Ok(lhs)
    }

    /// Parses a term in the provided role context.
    ///
    /// Where an lvalue is required, only terms that denote a storage location
    /// are accepted.
    fn parse_term(&mut self, role: Role) -> Result<ExprId> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Number | TokenKind::CharLit if role == Role::Lvalue => {
                let error = Error::ExpectedLvalue { actual: token.kind };
                return Err(token.span().wrap(error));
            }
            TokenKind::Number => {
                let Ok(parsed) = extract::int(token, self.src) else {
                    return Err(token.span().wrap(Error::ParseInt));
                };
                ExprKind::Int(parsed)
            }
            TokenKind::CharLit => ExprKind::Char(extract::char(token, self.src)),
            TokenKind::Identifier => ExprKind::Id(Ident {
                name: self.ident_interner.intern(extract::ident(token, self.src)),
                span: token.span(),
            }),

            // Grouping: ( expr )
            TokenKind::LParen => {
                let inner = match role {
                    Role::Lvalue => self.parse_term(Role::Lvalue)?,
                    Role::Rvalue => self.parse_expr()?,
                };
                self.consume(TokenKind::RParen)?;
                ExprKind::Paren(inner)
            }

            // Dereference: *target [ '[' offset ']' ]
            //
            // The target only has to produce a pointer, so any term is fine.
            TokenKind::Star => {
                let target = self.parse_term(Role::Rvalue)?;
                let offset = self.parse_bracketed()?;
                ExprKind::Deref { target, offset }
            }

            // Increment: ++target [ '[' step ']' ]
            TokenKind::PlusPlus => {
                let target = self.parse_term(Role::Lvalue)?;
                let step = self.parse_bracketed()?;
                ExprKind::Increment { target, step }
            }

            // Address-of: &target
            TokenKind::Amp => {
                if role == Role::Lvalue {
                    return Err(token.span().wrap(Error::AddressOfAsLvalue));
                }
                let target = self.parse_term(Role::Lvalue)?;
                ExprKind::AddressOf { target }
            }

            other if role == Role::Lvalue => {
                let error = Error::ExpectedLvalue { actual: other };
                return Err(token.span().wrap(error));
            }
            other => {
                let error = Error::ExpectedExpr { actual: other };
                return Err(token.span().wrap(error));
            }
        };
        let span = token.span().to(self.last);
        self.alloc_expr(kind, span)
    }

    /// Parses the optional `[expr]` suffix of unary operators.
    fn parse_bracketed(&mut self) -> Result<Option<ExprId>> {
        if !self.take(TokenKind::LBracket) {
            return Ok(None);
        }
        let expr = self.parse_expr()?;
        self.consume(TokenKind::RBracket)?;
        Ok(Some(expr))
    }

    /// Parses `|expr|`.
    fn parse_barred_expr(&mut self) -> Result<ExprId> {
        self.consume(TokenKind::Bar)?;
        let expr = self.parse_expr()?;
        self.consume(TokenKind::Bar)?;
        Ok(expr)
    }

    /// Returns the operator and its precedence tier, if `kind` is a binary
    /// operator.
    fn binary_operator(kind: TokenKind) -> Option<(BinaryOperator, u8)> {
        let op = match kind {
            TokenKind::Greater => (BinaryOperator::Gt, 0),
            TokenKind::Less => (BinaryOperator::Lt, 0),
            TokenKind::EqEq => (BinaryOperator::Eq, 0),
            TokenKind::NotEq => (BinaryOperator::Ne, 0),

            TokenKind::Plus => (BinaryOperator::Add, 1),
            TokenKind::Minus => (BinaryOperator::Sub, 1),

            TokenKind::Star => (BinaryOperator::Mul, 2),
            TokenKind::Slash => (BinaryOperator::Div, 2),
            TokenKind::Percent => (BinaryOperator::Mod, 2),

            _ => return None,
        };
        Some(op)
    }
}

impl Parser<'_, '_, '_> {
    fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner<str>,
        capacity: usize,
    ) -> Parser<'src, 'tok, 'ident> {
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
            last: Span::new_of_length(0, 0, 1),
            nodes: Nodes::with_capacity(capacity),
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src, self.last.line),
        }
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        self.cursor += 1;
        self.last = c.span();
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails with an error at the current token.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            Ok(self.advance())
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }

    fn alloc_expr(&mut self, kind: ExprKind, span: Span) -> Result<ExprId> {
        self.nodes
            .exprs
            .alloc(Expr::new(kind, span))
            .map_err(|error| arena_error(span, error))
    }

    fn alloc_stmt(&mut self, kind: StmtKind, span: Span) -> Result<StmtId> {
        self.nodes
            .stmts
            .alloc(Stmt { kind, span })
            .map_err(|error| arena_error(span, error))
    }
}

fn arena_error(span: Span, CapacityExceeded { capacity }: CapacityExceeded) -> Spanned<Error> {
    span.wrap(Error::ArenaExhausted { capacity })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    ExpectedExpr {
        actual: TokenKind,
    },
    ExpectedStatement {
        actual: TokenKind,
    },
    ExpectedLvalue {
        actual: TokenKind,
    },
    ExpectedScope {
        actual: TokenKind,
    },
    AddressOfAsLvalue,
    InvalidElementCount,
    ParseInt,
    ArenaExhausted {
        capacity: usize,
    },
    Lexer(lexer::Error),
}


#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_precedence() {
            let expr = "(1 * 2 + 3) - (1 + 2 * 3)";
            let tree_ok = "
                binary Sub (0..25)
                  paren (0..11)
                    binary Add (1..10)
                      binary Mul (1..6)
                        int 1 (1..2)
                        int 2 (5..6)
                      int 3 (9..10)
                  paren (14..25)
                    binary Add (15..24)
                      int 1 (15..16)
                      binary Mul (19..24)
                        int 2 (19..20)
                        int 3 (23..24)
            ";
        }

        fn test_same_tier_is_left_associative() {
            let expr = "8 - 4 - 2";
            let tree_ok = "
                binary Sub (0..9)
                  binary Sub (0..5)
                    int 8 (0..1)
                    int 4 (4..5)
                  int 2 (8..9)
            ";
        }

        fn test_multiplicative_binds_tighter_after_it() {
            let expr = "a * b + c % 2";
            let tree_ok = "
                binary Add (0..13)
                  binary Mul (0..5)
                    ident a (0..1)
                    ident b (4..5)
                  binary Mod (8..13)
                    ident c (8..9)
                    int 2 (12..13)
            ";
        }

        fn test_comparison_is_lowest() {
            let expr = "x + 1 != 'a'";
            let tree_ok = "
                binary Ne (0..12)
                  binary Add (0..5)
                    ident x (0..1)
                    int 1 (4..5)
                  char 97 (9..12)
            ";
        }

        fn test_unary_forms() {
            let expr = "*p[i + 1] + ++n[2] - &x";
            let tree_ok = "
                binary Sub (0..23)
                  binary Add (0..18)
                    deref (0..9)
                      ident p (1..2)
                      offset
                        binary Add (3..8)
                          ident i (3..4)
                          int 1 (7..8)
                    increment (12..18)
                      ident n (14..15)
                      step
                        int 2 (16..17)
                  address-of (21..23)
                    ident x (22..23)
            ";
        }

        fn test_declarations() {
            let program = "int x; char<16> buf; char* s; int*<2> ps;";
            let tree_ok = "
                declare x: int
                declare buf: char <16>
                declare s: char*
                declare ps: int* <2>
            ";
        }

        fn test_statements() {
            let program = "
                int i;
                i = 0;
                loop |i < 3| {
                    if |i == 1| write \"one\" <>;
                    elif |i == 2| { write |c|, |2|; }
                    else print |i|;
                    ++i;
                }
                exit(i);
            ";
            let tree_ok = r#"
                declare i: int
                assign
                  ident i (40..41)
                  int 0 (44..45)
                loop
                  binary Lt (69..74)
                    ident i (69..70)
                    int 3 (73..74)
                  scope
                    if
                      binary Eq (102..108)
                        ident i (102..103)
                        int 1 (107..108)
                      write "one" <>
                    elif
                      binary Eq (152..158)
                        ident i (152..153)
                        int 2 (157..158)
                      scope
                        write
                          ident c (169..170)
                          count
                            int 2 (174..175)
                    else
                      print
                        ident i (212..213)
                    assign
                      increment (236..239)
                        ident i (238..239)
                exit
                  ident i (280..281)
            "#;
        }

        fn test_missing_semicolon() {
            let program = "int x\nx = 1;";
            let expected_error = "[parser] line 2: expected ';', but got an identifier";
        }

        fn test_literal_is_not_an_lvalue() {
            let program = "5 = x;";
            let expected_error = "[parser] line 1: expected a statement, but got an integer";
        }

        fn test_literal_as_assignment_target_in_parens() {
            let program = "(5) = x;";
            let expected_error = "[parser] line 1: expected an lvalue, but got an integer";
        }

        fn test_address_of_is_not_an_lvalue() {
            let program = "int x;\n++&x;";
            let expected_error = "[parser] line 2: cannot use an address-of expression as an lvalue";
        }

        fn test_loop_requires_scope() {
            let program = "loop |1| exit(0);";
            let expected_error = "[parser] line 1: expected a scope, but got 'exit'";
        }

        fn test_zero_element_count() {
            let program = "int<0> x;";
            let expected_error = "[parser] line 1: element count must be at least 1";
        }

        fn test_unexpected_statement() {
            let program = "\n\n} ";
            let expected_error = "[parser] line 3: expected a statement, but got '}'";
        }

        fn test_lexer_error() {
            let program = "int x;\nx = 1 $ 2;";
            let expected_error = "[lexer] line 2: unexpected character '$'";
        }
    );

    #[test]
    fn arena_capacity_is_enforced() {
        use crate::{parser::Error, util::intern::Interner};

        let mut i = Interner::with_capacity(8);
        let error = super::parse_program("exit(1 + 2 + 3);", &mut Vec::new(), &mut i, 3)
            .expect_err("should run out of expression slots");
        assert_eq!(error.inner, Error::ArenaExhausted { capacity: 3 });
    }
}
