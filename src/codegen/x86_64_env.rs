/// Operating system specific constants of the generated program.
pub trait Env {
    const ENTRY_POINT: &str;

    /// `nasm -f` format.
    const OBJECT_FORMAT: &str;

    const SYS_WRITE: &str;
    const SYS_EXIT: &str;
}

impl Env for Darwin {
    const ENTRY_POINT: &str = "start";

    const OBJECT_FORMAT: &str = "macho64";

    // BSD system calls live in the 0x2000000 class.
    const SYS_WRITE: &str = "0x2000004";
    const SYS_EXIT: &str = "0x2000001";
}

impl Env for Linux {
    const ENTRY_POINT: &str = "_start";

    const OBJECT_FORMAT: &str = "elf64";

    const SYS_WRITE: &str = "1";
    const SYS_EXIT: &str = "60";
}

pub struct Darwin;

pub struct Linux;
