use std::{
    fmt::{self, Write},
    format_args as f,
    marker::PhantomData,
};

use tracing::{debug, trace};

use crate::{
    ast::{
        BinaryOperator, ChainId, Declaration, ExprId, ExprInfo, ExprKind, IfChain, Nodes, Program,
        StmtId, StmtKind, WriteOperand,
    },
    codegen::{x86_64_env, Error},
    token::Spanned,
    types::{DataType, Reg, Role},
    util::intern::{Interned, Interner},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

const DEFAULT_CODE_CAPACITY: usize = 4 * 1024; // 4 KiB

/// Bytes of the scratch buffer `print` formats numbers into.
const ITOA_BUF_LEN: usize = 5;

const NEWLINE: u8 = b'\n';

/// Emits assembly for a checked program.
///
/// Every expression leaves its result in `rax`: the value for rvalues, the
/// address of the storage location for lvalues. `rbx` holds spilled right
/// operands. Variables live on the machine stack and are addressed relative
/// to `rsp`, so `depth` must follow every instruction that moves `rsp`.
pub struct Generator<'a, E> {
    code: String,
    ident_interner: &'a Interner<str>,
    nodes: &'a Nodes,
    body: &'a [StmtId],
    indent: bool,
    /// Bytes currently allocated on the stack.
    depth: usize,
    variables: Vec<Variable>,
    scopes: Vec<Scope>,
    labels: usize,
    data: Vec<Box<[u8]>>,
    uses_itoa: bool,
    _env: PhantomData<E>,
}

struct Variable {
    name: Interned<str>,
    /// The element type, for buffers.
    ty: DataType,
    count: u32,
    size: usize,
    /// Stack depth right after the variable was allocated.
    depth: usize,
}

impl Variable {
    fn is_buffer(&self) -> bool {
        self.count > 1
    }
}

struct Scope {
    first_var: usize,
    depth: usize,
}

impl<'a, E> Generator<'a, E>
where
    E: x86_64_env::Env,
{
    pub fn new(ident_interner: &'a Interner<str>, program: &'a Program) -> Generator<'a, E> {
        Generator {
            code: String::with_capacity(DEFAULT_CODE_CAPACITY),
            ident_interner,
            nodes: &program.nodes,
            body: &program.body,
            indent: false,
            depth: 0,
            variables: Vec::with_capacity(16),
            scopes: Vec::with_capacity(8),
            labels: 0,
            data: Vec::new(),
            uses_itoa: false,
            _env: PhantomData,
        }
    }

    pub fn generate(mut self) -> Result<String> {
        self.out(f!("global {}", E::ENTRY_POINT));
        self.out_line();
        self.out("section .text");
        self.out(f!("{}:", E::ENTRY_POINT));
        let body = self.body;
        self.indented(|this| {
            for &stmt in body {
                this.g_stmt(stmt)?;
            }
            // Falling off the end exits successfully.
            this.out(f!("mov rax, {}", E::SYS_EXIT));
            this.out("mov rdi, 0");
            this.out("syscall");
            Ok(())
        })?;
        debug!(
            labels = self.labels,
            literals = self.data.len(),
            "generated program text"
        );
        self.g_data();
        Ok(self.code)
    }
}

/// Statements.
impl<E> Generator<'_, E>
where
    E: x86_64_env::Env,
{
    fn g_stmt(&mut self, stmt: StmtId) -> Result<()> {
        let nodes = self.nodes;
        match &nodes.stmts[stmt].kind {
            StmtKind::Exit(expr) => {
                self.g_expr(*expr)?;
                self.out("mov rdi, rax");
                self.out(f!("mov rax, {}", E::SYS_EXIT));
                self.out("syscall");
            }
            StmtKind::Declare(decl) => self.g_declare(decl),
            StmtKind::Assign { lvalue, rvalue } => {
                let Some(rvalue) = rvalue else {
                    // Only evaluated for its side effects, as in `++i;`.
                    return self.g_expr(*lvalue);
                };
                let ty = self.info(*lvalue)?.ty.data;
                self.g_expr(*rvalue)?;
                self.push("rax");
                self.g_expr(*lvalue)?;
                self.pop("rbx");
                self.out(f!("mov {} [rax], {}", ty.asm_size(), ty.reg(Reg::B)));
            }
            StmtKind::Scope(body) => {
                self.enter_scope();
                for &stmt in body {
                    self.g_stmt(stmt)?;
                }
                self.exit_scope();
            }
            StmtKind::If {
                predicate,
                body,
                chain,
            } => self.g_if(*predicate, *body, *chain)?,
            StmtKind::Loop { predicate, body } => {
                let start = self.label();
                let end = self.label();
                self.out_label(start);
                self.g_expr(*predicate)?;
                self.out("cmp rax, 0");
                self.out(f!("je {end}"));
                self.g_stmt(*body)?;
                self.out(f!("jmp {start}"));
                self.out_label(end);
            }
            StmtKind::Write {
                operand,
                count,
                newline,
            } => {
                match operand {
                    WriteOperand::Literal(text) => {
                        let mut bytes = text.to_vec();
                        if *newline {
                            bytes.push(NEWLINE);
                        }
                        let len = bytes.len();
                        let lit = self.literal(bytes.into_boxed_slice());
                        self.out(f!("lea rsi, [rel {lit}]"));
                        self.out(f!("mov rdx, {len}"));
                        self.g_write_syscall();
                        // The newline byte rides along with the text.
                        return Ok(());
                    }
                    WriteOperand::Expr(expr) => self.g_write_expr(*expr, *count)?,
                }
                // The written bytes aren't contiguous with a newline, so it
                // takes a second syscall.
                if *newline {
                    self.g_write_newline();
                }
            }
            StmtKind::Print { expr, newline } => {
                self.g_expr(*expr)?;
                self.g_print();
                if *newline {
                    self.g_write_newline();
                }
            }
        }
        Ok(())
    }

    fn g_declare(&mut self, decl: &Declaration) {
        let size = decl.size();
        self.out(f!("sub rsp, {size}"));
        self.depth += size;
        trace!(
            name = self.ident_interner.get(decl.name),
            size,
            depth = self.depth,
            "allocated variable"
        );
        self.variables.push(Variable {
            name: decl.name.name,
            ty: decl.ty,
            count: decl.count,
            size,
            depth: self.depth,
        });
    }

    /// All arms jump to a single end label once their body runs.
    fn g_if(
        &mut self,
        predicate: ExprId,
        body: StmtId,
        chain: Option<ChainId>,
    ) -> Result<()> {
        let nodes = self.nodes;
        let end = self.label();
        let (mut predicate, mut body, mut next) = (Some(predicate), body, chain);
        loop {
            let skip = match predicate {
                Some(predicate) => {
                    let skip = self.label();
                    self.g_expr(predicate)?;
                    self.out("cmp rax, 0");
                    self.out(f!("je {skip}"));
                    Some(skip)
                }
                None => None,
            };

            self.enter_scope();
            self.g_stmt(body)?;
            self.exit_scope();

            let Some(skip) = skip else {
                // An `else` ends the chain.
                break;
            };
            if next.is_some() {
                self.out(f!("jmp {end}"));
            }
            self.out_label(skip);

            match next.map(|link| &nodes.chains[link]) {
                Some(IfChain::Elif {
                    predicate: p,
                    body: b,
                    next: n,
                }) => {
                    (predicate, body, next) = (Some(*p), *b, *n);
                }
                Some(IfChain::Else { body: b }) => {
                    (predicate, body, next) = (None, *b, None);
                }
                None => break,
            }
        }
        self.out_label(end);
        Ok(())
    }

    /// Writes through a `char` value or a `char*`. The byte count defaults to
    /// one.
    fn g_write_expr(&mut self, expr: ExprId, count: Option<ExprId>) -> Result<()> {
        let mut pushed = 0;
        if let Some(count) = count {
            self.g_expr(count)?;
            self.push("rax");
            pushed += 8;
        }

        self.g_expr(expr)?;
        if self.info(expr)?.ty.is_ptr() {
            self.out("mov rsi, rax");
        } else {
            // The char's byte is the lowest one of the pushed slot.
            self.push("rax");
            pushed += 8;
            self.out("mov rsi, rsp");
        }

        if count.is_some() {
            self.out(f!("mov rdx, qword [rsp + {}]", pushed - 8));
        } else {
            self.out("mov rdx, 1");
        }
        self.g_write_syscall();

        if pushed > 0 {
            self.out(f!("add rsp, {pushed}"));
            self.depth -= pushed;
        }
        Ok(())
    }

    /// Writes a newline byte from its own data entry.
    fn g_write_newline(&mut self) {
        let lit = self.literal(Box::new([NEWLINE]));
        self.out(f!("lea rsi, [rel {lit}]"));
        self.out("mov rdx, 1");
        self.g_write_syscall();
    }

    /// Writes `rdx` bytes from `rsi` to the standard output.
    fn g_write_syscall(&mut self) {
        self.out(f!("mov rax, {}", E::SYS_WRITE));
        self.out("mov rdi, 1");
        self.out("syscall");
    }

    /// Writes the low 32 bits of `rax` as an unsigned decimal number. Only the
    /// last digits that fit the scratch buffer are kept.
    fn g_print(&mut self) {
        self.uses_itoa = true;
        let next_digit = self.label();
        let done = self.label();

        self.out("mov eax, eax");
        self.out("mov rcx, 10");
        self.out(f!("lea rsi, [rel itoa_buf + {ITOA_BUF_LEN}]"));
        self.out("xor r8, r8");
        self.out_label(next_digit);
        self.out("xor rdx, rdx");
        self.out("div rcx");
        self.out("add dl, 48");
        self.out("dec rsi");
        self.out("mov byte [rsi], dl");
        self.out("inc r8");
        self.out(f!("cmp r8, {ITOA_BUF_LEN}"));
        self.out(f!("je {done}"));
        self.out("cmp rax, 0");
        self.out(f!("jne {next_digit}"));
        self.out_label(done);
        self.out("mov rdx, r8");
        self.g_write_syscall();
    }

    fn enter_scope(&mut self) {
        trace!(depth = self.depth, "entering scope");
        self.scopes.push(Scope {
            first_var: self.variables.len(),
            depth: self.depth,
        });
    }

    /// Releases the variables of the innermost scope, in reverse declaration
    /// order, with a single stack adjustment.
    fn exit_scope(&mut self) {
        let scope = self.scopes.pop().expect("unbalanced scope exit");
        let size: usize = self
            .variables
            .drain(scope.first_var..)
            .rev()
            .map(|var| var.size)
            .sum();
        if size > 0 {
            self.out(f!("add rsp, {size}"));
        }
        self.depth -= size;
        debug_assert_eq!(self.depth, scope.depth);
        trace!(released = size, depth = self.depth, "left scope");
    }
}

/// Expressions.
impl<E> Generator<'_, E>
where
    E: x86_64_env::Env,
{
    fn g_expr(&mut self, expr: ExprId) -> Result<()> {
        let ExprInfo { ty, role } = self.info(expr)?;
        match self.nodes.exprs[expr].kind {
            ExprKind::Int(int) => self.out(f!("mov rax, {int}")),
            ExprKind::Char(c) => self.out(f!("mov rax, {c}")),
            ExprKind::Id(ident) => {
                let var = self.variable(expr, ident.name)?;
                let offset = self.depth - var.depth;
                if role == Role::Lvalue || var.is_buffer() {
                    // Buffers evaluate to the address of their first element.
                    self.out(f!("lea rax, [rsp + {offset}]"));
                } else {
                    let ty = var.ty;
                    self.load(ty, f!("rsp + {offset}"));
                }
            }
            ExprKind::Paren(inner) => self.g_expr(inner)?,
            ExprKind::Binary { op, lhs, rhs } => {
                self.g_expr(rhs)?;
                self.push("rax");
                self.g_expr(lhs)?;
                self.pop("rbx");
                self.g_binary(op);
            }
            ExprKind::Deref { target, offset } => {
                if let Some(offset) = offset {
                    self.g_expr(offset)?;
                    self.push("rax");
                }
                self.g_expr(target)?;
                if offset.is_some() {
                    self.pop("rbx");
                    let size = ty.data.size();
                    if size > 1 {
                        self.out(f!("imul rbx, {size}"));
                    }
                    self.out("add rax, rbx");
                }
                if role == Role::Rvalue {
                    self.load(ty.data, f!("rax"));
                }
            }
            ExprKind::Increment { target, step } => {
                if let Some(step) = step {
                    self.g_expr(step)?;
                    self.push("rax");
                }
                self.g_expr(target)?;
                if step.is_some() {
                    self.pop("rbx");
                } else {
                    self.out("mov rbx, 1");
                }
                let data = ty.data;
                self.out(f!("add {} [rax], {}", data.asm_size(), data.reg(Reg::B)));
                if role == Role::Rvalue {
                    self.load(data, f!("rax"));
                }
            }
            // The target is evaluated as an lvalue, which is its address.
            ExprKind::AddressOf { target } => self.g_expr(target)?,
        }
        Ok(())
    }

    /// Combines `rax` (left) and `rbx` (right) into `rax`.
    fn g_binary(&mut self, op: BinaryOperator) {
        use BinaryOperator::*;
        let jump_if_false = match op {
            Add => return self.out("add rax, rbx"),
            Sub => return self.out("sub rax, rbx"),
            Mul => return self.out("imul rax, rbx"),
            Div | Mod => {
                self.out("cqo");
                self.out("idiv rbx");
                if op == Mod {
                    self.out("mov rax, rdx");
                }
                return;
            }
            Gt => "jle",
            Lt => "jge",
            Eq => "jne",
            Ne => "je",
        };
        let when_false = self.label();
        let end = self.label();
        self.out("cmp rax, rbx");
        self.out(f!("{jump_if_false} {when_false}"));
        self.out("mov rax, 1");
        self.out(f!("jmp {end}"));
        self.out_label(when_false);
        self.out("mov rax, 0");
        self.out_label(end);
    }

    /// Loads a value of type `ty` from `[address]` into `rax`, extending it to
    /// 64 bits.
    fn load(&mut self, ty: DataType, address: fmt::Arguments<'_>) {
        let instr = match ty {
            DataType::Int => "movsxd",
            DataType::Char => "movzx",
            DataType::Ptr => "mov",
        };
        self.out(f!("{instr} rax, {} [{address}]", ty.asm_size()));
    }

    fn info(&self, expr: ExprId) -> Result<ExprInfo> {
        let expr = &self.nodes.exprs[expr];
        expr.info.ok_or_else(|| expr.span.wrap(Error::Unchecked))
    }

    fn variable(&self, expr: ExprId, name: Interned<str>) -> Result<&Variable> {
        self.variables
            .iter()
            .rev()
            .find(|var| var.name == name)
            .ok_or_else(|| {
                let span = self.nodes.exprs[expr].span;
                span.wrap(Error::UnboundVariable(name))
            })
    }
}

/// Utility functions.
impl<E> Generator<'_, E>
where
    E: x86_64_env::Env,
{
    fn push(&mut self, reg: &str) {
        self.out(f!("push {reg}"));
        self.depth += 8;
    }

    fn pop(&mut self, reg: &str) {
        self.out(f!("pop {reg}"));
        self.depth -= 8;
    }

    /// Allocates a data entry, returning its label.
    fn literal(&mut self, bytes: Box<[u8]>) -> Literal {
        self.data.push(bytes);
        Literal(self.data.len() - 1)
    }

    fn label(&mut self) -> Label {
        let label = Label(self.labels);
        self.labels += 1;
        label
    }

    fn g_data(&mut self) {
        if self.uses_itoa {
            self.out_line();
            self.out("section .bss");
            self.out(f!("itoa_buf: resb {ITOA_BUF_LEN}"));
        }

        self.out_line();
        self.out("section .data");
        let data = std::mem::take(&mut self.data);
        for (i, bytes) in data.iter().enumerate() {
            let mut line = format!("{}:", Literal(i));
            for (n, byte) in bytes.iter().enumerate() {
                let sep = if n == 0 { " db " } else { ", " };
                write!(line, "{sep}{byte}").expect("code emit should be infallible");
            }
            self.out(line);
        }
    }

    /// Prints a line.
    fn out(&mut self, f: impl fmt::Display) {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.code, "{indent}{f}").expect("code emit should be infallible");
    }

    /// Prints a label, never indented.
    fn out_label(&mut self, label: Label) {
        writeln!(self.code, "{label}:").expect("code emit should be infallible");
    }

    /// Prints an empty line.
    fn out_line(&mut self) {
        self.code.push('\n');
    }

    /// Writes in an indented block.
    fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.indent = true;
        let res = f(self);
        self.indent = false;
        res
    }
}

#[derive(Copy, Clone)]
struct Label(usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "label{}", self.0)
    }
}

#[derive(Copy, Clone)]
struct Literal(usize);

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lit{}", self.0)
    }
}
