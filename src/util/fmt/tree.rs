use std::io::Write;

use crate::{ast::*, types::Type, util::intern::Interner};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(idents: &Interner<str>, program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, idents, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_expr_string(idents: &Interner<str>, nodes: &Nodes, expr: ExprId) -> String {
    let mut buf = Vec::with_capacity(512);
    Printer { idents, nodes }.expr(&mut buf, 0, expr).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(
    w: &mut impl Write,
    idents: &Interner<str>,
    program: &Program,
) -> std::io::Result<()> {
    let p = Printer {
        idents,
        nodes: &program.nodes,
    };
    for &stmt in &program.body {
        p.stmt(w, 0, stmt)?;
    }
    Ok(())
}

struct Printer<'a> {
    idents: &'a Interner<str>,
    nodes: &'a Nodes,
}

impl Printer<'_> {
    fn stmt(&self, w: &mut impl Write, i: usize, stmt: StmtId) -> std::io::Result<()> {
        sp(w, i)?;
        match &self.nodes.stmts[stmt].kind {
            StmtKind::Exit(expr) => {
                writeln!(w, "exit")?;
                self.expr(w, i + 1, *expr)?;
            }
            StmtKind::Declare(decl) => {
                let ty = Type {
                    data: decl.ty,
                    pointee: decl.pointee,
                };
                write!(w, "declare {}: {ty}", self.idents.get(decl.name))?;
                if decl.is_buffer() {
                    write!(w, " <{}>", decl.count)?;
                }
                writeln!(w)?;
            }
            StmtKind::Assign { lvalue, rvalue } => {
                writeln!(w, "assign")?;
                self.expr(w, i + 1, *lvalue)?;
                if let Some(rvalue) = rvalue {
                    self.expr(w, i + 1, *rvalue)?;
                }
            }
            StmtKind::Scope(body) => {
                writeln!(w, "scope")?;
                for &stmt in body {
                    self.stmt(w, i + 1, stmt)?;
                }
            }
            StmtKind::If {
                predicate,
                body,
                chain,
            } => {
                writeln!(w, "if")?;
                self.expr(w, i + 1, *predicate)?;
                self.stmt(w, i + 1, *body)?;
                // Chain links are siblings of the `if` they belong to.
                let mut next = *chain;
                while let Some(link) = next {
                    sp(w, i)?;
                    match &self.nodes.chains[link] {
                        IfChain::Elif {
                            predicate,
                            body,
                            next: rest,
                        } => {
                            writeln!(w, "elif")?;
                            self.expr(w, i + 1, *predicate)?;
                            self.stmt(w, i + 1, *body)?;
                            next = *rest;
                        }
                        IfChain::Else { body } => {
                            writeln!(w, "else")?;
                            self.stmt(w, i + 1, *body)?;
                            next = None;
                        }
                    }
                }
            }
            StmtKind::Loop { predicate, body } => {
                writeln!(w, "loop")?;
                self.expr(w, i + 1, *predicate)?;
                self.stmt(w, i + 1, *body)?;
            }
            StmtKind::Write {
                operand,
                count,
                newline,
            } => {
                write!(w, "write")?;
                if let WriteOperand::Literal(text) = operand {
                    write!(w, " \"{}\"", text.escape_ascii())?;
                }
                newline_marker(w, *newline)?;
                if let WriteOperand::Expr(expr) = operand {
                    self.expr(w, i + 1, *expr)?;
                }
                if let Some(count) = count {
                    sp(w, i + 1)?;
                    writeln!(w, "count")?;
                    self.expr(w, i + 2, *count)?;
                }
            }
            StmtKind::Print { expr, newline } => {
                write!(w, "print")?;
                newline_marker(w, *newline)?;
                self.expr(w, i + 1, *expr)?;
            }
        }
        Ok(())
    }

    fn expr(&self, w: &mut impl Write, i: usize, expr: ExprId) -> std::io::Result<()> {
        sp(w, i)?;
        let expr = &self.nodes.exprs[expr];
        let span = expr.span;
        let info = InfoWriter(expr.info);
        match expr.kind {
            ExprKind::Int(val) => {
                writeln!(w, "int {val} ({span}{info})")?;
            }
            ExprKind::Char(val) => {
                writeln!(w, "char {val} ({span}{info})")?;
            }
            ExprKind::Id(ident) => {
                writeln!(w, "ident {} ({span}{info})", self.idents.get(ident))?;
            }
            ExprKind::Paren(inner) => {
                writeln!(w, "paren ({span}{info})")?;
                self.expr(w, i + 1, inner)?;
            }
            ExprKind::Binary { op, lhs, rhs } => {
                writeln!(w, "binary {op:?} ({span}{info})")?;
                self.expr(w, i + 1, lhs)?;
                self.expr(w, i + 1, rhs)?;
            }
            ExprKind::Deref { target, offset } => {
                writeln!(w, "deref ({span}{info})")?;
                self.expr(w, i + 1, target)?;
                self.labeled(w, i + 1, "offset", offset)?;
            }
            ExprKind::Increment { target, step } => {
                writeln!(w, "increment ({span}{info})")?;
                self.expr(w, i + 1, target)?;
                self.labeled(w, i + 1, "step", step)?;
            }
            ExprKind::AddressOf { target } => {
                writeln!(w, "address-of ({span}{info})")?;
                self.expr(w, i + 1, target)?;
            }
        }
        Ok(())
    }

    fn labeled(
        &self,
        w: &mut impl Write,
        i: usize,
        label: &str,
        expr: Option<ExprId>,
    ) -> std::io::Result<()> {
        let Some(expr) = expr else {
            return Ok(());
        };
        sp(w, i)?;
        writeln!(w, "{label}")?;
        self.expr(w, i + 1, expr)
    }
}

/// Displays the resolved type and role, for typed trees.
struct InfoWriter(Option<ExprInfo>);

impl std::fmt::Display for InfoWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(ExprInfo { ty, role }) => write!(f, " %: {ty} {role}"),
            None => Ok(()),
        }
    }
}

fn newline_marker(w: &mut impl Write, newline: bool) -> std::io::Result<()> {
    if newline {
        write!(w, " <>")?;
    }
    writeln!(w)
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
