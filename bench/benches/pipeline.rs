use criterion::{criterion_group, criterion_main, Criterion};
use pebble::{
    arena::DEFAULT_CAPACITY,
    codegen::Target,
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
    parser::parse_program,
    token::Token,
    type_checker::Checker,
    util::intern::Interner,
    Config,
};
use std::hint::black_box;

static INPUTS: &[(&str, &str)] = &[
    ("hello", include_str!("../../demos/hello.pb")),
    ("count", include_str!("../../demos/count.pb")),
    ("buffer", include_str!("../../demos/buffer.pb")),
];

fn parser(input: &str, tokens: &mut Vec<Token>, i: &mut Interner<str>) {
    let mut program = parse_program(input, tokens, i, DEFAULT_CAPACITY).unwrap();
    Checker::with_capacity(64).check(&mut program).unwrap();
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let config = Config {
        target: Target::x86_64_linux,
        ..Config::default()
    };

    for (name, input) in INPUTS {
        c.bench_function(&format!("lexer/{name}"), |b| {
            b.iter(|| black_box(lexer::lex_in_new(black_box(input)).unwrap()));
        });

        c.bench_function(&format!("checker/{name}"), |b| {
            let mut i = Interner::with_capacity(64);
            b.iter(|| {
                tokens.clear();
                parser(black_box(input), &mut tokens, &mut i);
            });
        });

        c.bench_function(&format!("compile/{name}"), |b| {
            b.iter(|| {
                let mut i = Interner::with_capacity(64);
                black_box(pebble::compile(black_box(input), &mut i, &config).unwrap())
            });
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
