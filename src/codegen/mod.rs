use crate::{
    ast::Program,
    codegen::{x86_64::Generator, x86_64_env::Env},
    token::Spanned,
    util::intern::{Interned, Interner},
};

pub mod x86_64;
pub mod x86_64_env;

/// Generates the NASM source of a checked program for the given target.
pub fn generate(
    ident_interner: &Interner<str>,
    target: Target,
    program: &Program,
) -> Result<String, Spanned<Error>> {
    type DarwinGenerator<'a> = Generator<'a, x86_64_env::Darwin>;
    type LinuxGenerator<'a> = Generator<'a, x86_64_env::Linux>;

    match target {
        Target::x86_64_darwin => DarwinGenerator::new(ident_interner, program).generate(),
        Target::x86_64_linux => LinuxGenerator::new(ident_interner, program).generate(),
    }
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl Target {
    pub const ALL: &[Target] = &[Target::x86_64_darwin, Target::x86_64_linux];

    pub const fn triple(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => "x86_64-apple-darwin",
            Target::x86_64_linux => "x86_64-unknown-linux-gnu",
        }
    }

    /// The `nasm -f` format of object files for this target.
    pub const fn object_format(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => x86_64_env::Darwin::OBJECT_FORMAT,
            Target::x86_64_linux => x86_64_env::Linux::OBJECT_FORMAT,
        }
    }

    pub const fn entry_point(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => x86_64_env::Darwin::ENTRY_POINT,
            Target::x86_64_linux => x86_64_env::Linux::ENTRY_POINT,
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                Target::x86_64_darwin
            } else {
                Target::x86_64_linux
            }
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::x86_64_darwin => f.write_str("x86_64_darwin"),
            Target::x86_64_linux => f.write_str("x86_64_linux"),
        }
    }
}

/// Generation fails only on trees the checker didn't accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnboundVariable(Interned<str>),
    Unchecked,
}

#[cfg(test)]
mod tests;
