use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use pebble::codegen::Target;
use tracing::{debug, info};

/// Assembles `asm` with `nasm` and links the object with `ld`, producing an
/// executable next to it. The intermediate object file is removed.
pub fn assemble_and_link(asm: &Path, target: Target) -> Result<PathBuf, Box<dyn Error>> {
    let object = asm.with_extension("o");
    let executable = asm.with_extension("");

    run(Command::new("nasm")
        .args(["-f", target.object_format()])
        .arg(asm)
        .arg("-o")
        .arg(&object))?;

    let mut ld = Command::new("ld");
    if target == Target::x86_64_darwin {
        ld.args(["-static", "-e", target.entry_point()]);
    }
    run(ld.arg(&object).arg("-o").arg(&executable))?;

    fs::remove_file(&object)?;
    info!(executable = %executable.display(), "linked");
    Ok(executable)
}

fn run(command: &mut Command) -> Result<(), Box<dyn Error>> {
    debug!(?command, "running");
    let program = command.get_program().to_string_lossy().into_owned();
    let status = command
        .status()
        .map_err(|error| format!("failed to run {program}: {error}"))?;
    if !status.success() {
        return Err(format!("{program} failed ({status})").into());
    }
    Ok(())
}
