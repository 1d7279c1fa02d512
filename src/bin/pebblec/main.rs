use std::{
    error::Error,
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use pebble::{
    arena, lexer, parser,
    type_checker::Checker,
    util::{
        fmt::{tree, Context, Show},
        intern::Interner,
    },
    CompileError, Config,
};
use tracing::{info, Level};

mod link;
mod target;

#[derive(Parser)]
#[command(name = "pebblec")]
#[command(version)]
#[command(about = "Compiles a pebble source file into x86-64 assembly", long_about = None)]
struct Cli {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Where to write the assembly
    #[arg(short, long, value_name = "FILE", default_value = "out.asm")]
    output: PathBuf,

    #[arg(long, default_value_t = target::DEFAULT_TARGET)]
    target: target::Target,

    /// Print an intermediate representation instead of writing assembly
    #[arg(long, value_name = "STAGE")]
    emit: Option<Emit>,

    /// Only write the assembly, without running nasm and ld
    #[arg(long)]
    no_link: bool,

    /// Maximum number of nodes of each kind
    #[arg(long, value_name = "N", default_value_t = arena::DEFAULT_CAPACITY)]
    arena_capacity: usize,

    /// Increases logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Copy, Clone, ValueEnum)]
enum Emit {
    Tokens,
    Ast,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let src = fs::read_to_string(&cli.input)
        .map_err(|error| format!("failed to read {}: {error}", cli.input.display()))?;
    let config = Config {
        target: cli.target.into(),
        arena_capacity: cli.arena_capacity,
    };
    info!(input = %cli.input.display(), platform = %cli.target, "compiling");

    let mut ident_interner = Interner::with_capacity(256);
    match cli.emit {
        Some(Emit::Tokens) => emit_tokens(&src),
        Some(Emit::Ast) => emit_ast(&src, &mut ident_interner, &config),
        None => {
            let asm = pebble::compile(&src, &mut ident_interner, &config)
                .map_err(|error| report(&ident_interner, &error))?;
            fs::write(&cli.output, asm)
                .map_err(|error| format!("failed to write {}: {error}", cli.output.display()))?;
            info!(output = %cli.output.display(), "wrote assembly");

            if !cli.no_link {
                link::assemble_and_link(&cli.output, config.target)?;
            }
            Ok(())
        }
    }
}

fn emit_tokens(src: &str) -> Result<(), Box<dyn Error>> {
    let tokens = lexer::lex_in_new(src).map_err(|error| {
        report(&Interner::with_capacity(0), &CompileError::Lexer(error))
    })?;
    let mut stdout = io::stdout().lock();
    for token in tokens {
        writeln!(stdout, "{token:?}")?;
    }
    Ok(())
}

/// Prints the typed tree of the program.
fn emit_ast(
    src: &str,
    ident_interner: &mut Interner<str>,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    let mut program =
        parser::parse_program(src, &mut tokens, ident_interner, config.arena_capacity)
            .map_err(|error| report(ident_interner, &error.into()))?;
    Checker::with_capacity(64)
        .check(&mut program)
        .map_err(|error| report(ident_interner, &error.into()))?;
    tree::print_program(&mut io::stdout().lock(), ident_interner, &program)?;
    Ok(())
}

/// Renders a diagnostic with its stage and line.
fn report(ident_interner: &Interner<str>, error: &CompileError) -> String {
    let ctx = Context { ident_interner };
    format!("{:#}", error.display(&ctx))
}
