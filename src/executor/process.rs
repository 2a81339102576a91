use std::ffi::CString;
use std::process;

use nix::errno::Errno;
use nix::unistd::execvp;

/// Replaces the current (child) process with `argv`, searching `PATH`.
///
/// Never returns: on exec failure the process exits with 127 when the
/// command cannot be found and 126 for any other cause.
pub fn execute_process(argv: &[String]) -> ! {
    let Some(program) = argv.first() else {
        process::exit(0);
    };
    let Ok(program) = CString::new(program.as_str()) else {
        process::exit(126);
    };

    let args: Vec<CString> = match argv
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<_, _>>()
    {
        Ok(args) => args,
        Err(_) => process::exit(126),
    };

    match execvp(&program, &args) {
        Err(Errno::ENOENT) => process::exit(127),
        _ => process::exit(126),
    }
}
