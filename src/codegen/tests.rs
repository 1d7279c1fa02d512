use indoc::indoc;
use pretty_assertions::assert_eq;

use crate::{
    codegen::{self, Error, Target},
    parser::test_utils::parse_program,
    util::intern::Interner,
    Config,
};

fn compile_for(target: Target, src: &str) -> String {
    let mut i = Interner::with_capacity(16);
    let config = Config {
        target,
        ..Config::default()
    };
    crate::compile(src, &mut i, &config).unwrap()
}

fn compile(src: &str) -> String {
    compile_for(Target::x86_64_linux, src)
}

/// Returns the lines between the entry label and the final exit sequence,
/// without indentation.
fn body(asm: &str) -> String {
    let start = asm.find("_start:\n").unwrap() + "_start:\n".len();
    let end = asm.rfind("    mov rax, 60\n    mov rdi, 0\n").unwrap();
    asm[start..end]
        .lines()
        .map(|line| format!("{}\n", line.trim()))
        .collect()
}

#[test]
fn store_and_reload() {
    let asm = compile("int x; x = 5; exit(x);");
    assert_eq!(
        asm,
        indoc! {"
            global _start

            section .text
            _start:
                sub rsp, 4
                mov rax, 5
                push rax
                lea rax, [rsp + 8]
                pop rbx
                mov dword [rax], ebx
                movsxd rax, dword [rsp + 0]
                mov rdi, rax
                mov rax, 60
                syscall
                mov rax, 60
                mov rdi, 0
                syscall

            section .data
        "}
    );
}

#[test]
fn empty_program_still_exits() {
    let asm = compile("");
    assert_eq!(asm.matches("global _start").count(), 1);
    assert!(asm.contains("_start:\n    mov rax, 60\n    mov rdi, 0\n    syscall\n"));
}

#[test]
fn comparison_branches_to_false() {
    let asm = compile("exit(3 > 2);");
    assert_eq!(
        body(&asm),
        indoc! {"
                mov rax, 2
                push rax
                mov rax, 3
                pop rbx
                cmp rax, rbx
                jle label0
                mov rax, 1
                jmp label1
                label0:
                mov rax, 0
                label1:
                mov rdi, rax
                mov rax, 60
                syscall
        "}
    );
}

#[test]
fn comparison_jumps() {
    for (op, jump) in [("<", "jge"), ("==", "jne"), ("!=", "je")] {
        let asm = compile(&format!("exit(1 {op} 2);"));
        assert!(asm.contains(&format!("    {jump} label0\n")), "{op}");
    }
}

#[test]
fn arithmetic() {
    let asm = compile("exit(7 % 3 + 8 / 2 * 1 - 1);");
    let body = body(&asm);
    assert!(body.contains("cqo\nidiv rbx\nmov rax, rdx\n"));
    assert!(body.contains("cqo\nidiv rbx\npop rbx\nimul rax, rbx\n"));
    assert!(body.contains("add rax, rbx\n"));
    assert!(body.ends_with("pop rbx\nsub rax, rbx\nmov rdi, rax\nmov rax, 60\nsyscall\n"));
}

#[test]
fn buffer_element_access() {
    let asm = compile("int<3> a; exit(*a[1]);");
    assert_eq!(
        body(&asm),
        indoc! {"
                sub rsp, 12
                mov rax, 1
                push rax
                lea rax, [rsp + 8]
                pop rbx
                imul rbx, 4
                add rax, rbx
                movsxd rax, dword [rax]
                mov rdi, rax
                mov rax, 60
                syscall
        "}
    );
}

#[test]
fn store_through_pointer() {
    let asm = compile("char c; char* p; p = &c; *p = 'z';");
    assert_eq!(
        body(&asm),
        indoc! {"
                sub rsp, 1
                sub rsp, 8
                lea rax, [rsp + 8]
                push rax
                lea rax, [rsp + 8]
                pop rbx
                mov qword [rax], rbx
                mov rax, 122
                push rax
                mov rax, qword [rsp + 8]
                pop rbx
                mov byte [rax], bl
        "}
    );
}

#[test]
fn increment_statement() {
    let asm = compile("int i; ++i; ++i[3];");
    assert_eq!(
        body(&asm),
        indoc! {"
                sub rsp, 4
                lea rax, [rsp + 0]
                mov rbx, 1
                add dword [rax], ebx
                mov rax, 3
                push rax
                lea rax, [rsp + 8]
                pop rbx
                add dword [rax], ebx
        "}
    );
}

#[test]
fn increment_as_value_reloads() {
    let asm = compile("char c; exit(++c);");
    assert!(body(&asm).contains("add byte [rax], bl\nmovzx rax, byte [rax]\n"));
}

#[test]
fn scope_releases_its_variables() {
    let asm = compile("{ int a; char<3> b; { } } exit(0);");
    assert_eq!(
        body(&asm),
        indoc! {"
                sub rsp, 4
                sub rsp, 3
                add rsp, 7
                mov rax, 0
                mov rdi, rax
                mov rax, 60
                syscall
        "}
    );
}

#[test]
fn outer_variables_are_addressed_past_inner_ones() {
    let asm = compile("int a; { char b; exit(a); }");
    assert!(body(&asm).contains("sub rsp, 1\nmovsxd rax, dword [rsp + 1]\n"));
}

#[test]
fn if_elif_else_converge() {
    let asm = compile("if |1| exit(1); else exit(2);");
    assert_eq!(
        body(&asm),
        indoc! {"
                mov rax, 1
                cmp rax, 0
                je label1
                mov rax, 1
                mov rdi, rax
                mov rax, 60
                syscall
                jmp label0
                label1:
                mov rax, 2
                mov rdi, rax
                mov rax, 60
                syscall
                label0:
        "}
    );

    let asm = compile("if |0| exit(1); elif |1| exit(2); elif |2| exit(3);");
    assert_eq!(asm.matches("jmp label0\n").count(), 2);
    assert_eq!(asm.matches("\nlabel0:\n").count(), 1);
}

#[test]
fn branch_declarations_are_released() {
    let asm = compile("if |1| int x; else { char<2> y; }");
    assert!(asm.contains("    sub rsp, 4\n    add rsp, 4\n"));
    assert!(asm.contains("    sub rsp, 2\n    add rsp, 2\n"));
}

#[test]
fn loop_tests_at_the_top() {
    let asm = compile("int i; i = 0; loop |i < 3| { int t; ++i; }");
    let body = body(&asm);
    let start = body.find("label0:\n").unwrap();
    let exit = body.find("je label1\n").unwrap();
    let back = body.find("jmp label0\nlabel1:\n").unwrap();
    assert!(start < exit && exit < back);
    assert!(body.contains("add rsp, 4\njmp label0\n"));
}

#[test]
fn literal_writes_get_their_own_entries() {
    let asm = compile("write \"hi\"; write \"hi\" <>; write \"\";");
    assert!(asm.contains("    lea rsi, [rel lit0]\n    mov rdx, 2\n    mov rax, 1\n"));
    assert!(asm.contains("    lea rsi, [rel lit1]\n    mov rdx, 3\n"));
    assert!(asm.ends_with(indoc! {"
        section .data
        lit0: db 104, 105
        lit1: db 104, 105, 10
        lit2:
    "}));
}

#[test]
fn write_char_with_newline() {
    let asm = compile("char c; c = 'a'; write |c| <>;");
    assert_eq!(
        asm,
        indoc! {"
            global _start

            section .text
            _start:
                sub rsp, 1
                mov rax, 97
                push rax
                lea rax, [rsp + 8]
                pop rbx
                mov byte [rax], bl
                movzx rax, byte [rsp + 0]
                push rax
                mov rsi, rsp
                mov rdx, 1
                mov rax, 1
                mov rdi, 1
                syscall
                add rsp, 8
                lea rsi, [rel lit0]
                mov rdx, 1
                mov rax, 1
                mov rdi, 1
                syscall
                mov rax, 60
                mov rdi, 0
                syscall

            section .data
            lit0: db 10
        "}
    );
}

#[test]
fn write_buffer_with_count() {
    let asm = compile("char<4> b; write |b|, |4|;");
    assert_eq!(
        body(&asm),
        indoc! {"
                sub rsp, 4
                mov rax, 4
                push rax
                lea rax, [rsp + 8]
                mov rsi, rax
                mov rdx, qword [rsp + 0]
                mov rax, 1
                mov rdi, 1
                syscall
                add rsp, 8
        "}
    );
}

#[test]
fn print_uses_scratch_buffer() {
    let asm = compile("print |42| <>;");
    assert!(asm.contains("    lea rsi, [rel itoa_buf + 5]\n"));
    assert!(asm.contains("    cmp r8, 5\n"));
    assert!(asm.contains("\nsection .bss\nitoa_buf: resb 5\n\nsection .data\nlit0: db 10\n"));

    let asm = compile("exit(0);");
    assert!(!asm.contains("section .bss"));
}

#[test]
fn print_keeps_the_low_digits_of_the_unsigned_value() {
    let asm = compile("print |0 - 1|;");
    assert_eq!(
        body(&asm),
        indoc! {"
                mov rax, 1
                push rax
                mov rax, 0
                pop rbx
                sub rax, rbx
                mov eax, eax
                mov rcx, 10
                lea rsi, [rel itoa_buf + 5]
                xor r8, r8
                label0:
                xor rdx, rdx
                div rcx
                add dl, 48
                dec rsi
                mov byte [rsi], dl
                inc r8
                cmp r8, 5
                je label1
                cmp rax, 0
                jne label0
                label1:
                mov rdx, r8
                mov rax, 1
                mov rdi, 1
                syscall
        "}
    );
}

#[test]
fn darwin_environment() {
    let asm = compile_for(Target::x86_64_darwin, "write \"a\"; exit(1);");
    assert!(asm.starts_with("global start\n\nsection .text\nstart:\n"));
    assert!(asm.contains("    mov rax, 0x2000004\n"));
    assert!(asm.contains("    mov rax, 0x2000001\n"));
    assert!(!asm.contains("mov rax, 60"));
}

#[test]
fn output_is_deterministic() {
    let src = "int i; char<8> b; i = 0; loop |i < 8| { *b[i] = 'a' + i; ++i; } write |b|, |8| <>;";
    assert_eq!(compile(src), compile(src));
}

#[test]
fn unchecked_tree_is_rejected() {
    let (i, program) = parse_program("exit(1);");
    let error = codegen::generate(&i, Target::x86_64_linux, &program).unwrap_err();
    assert_eq!(error.inner, Error::Unchecked);
}

#[test]
fn targets() {
    assert_eq!(Target::ALL.len(), 2);
    assert_eq!(Target::x86_64_linux.object_format(), "elf64");
    assert_eq!(Target::x86_64_darwin.object_format(), "macho64");
    assert_eq!(Target::x86_64_darwin.to_string(), "x86_64_darwin");
    assert_eq!(Target::x86_64_linux.triple(), "x86_64-unknown-linux-gnu");
}
