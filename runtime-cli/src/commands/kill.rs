//! `runtime kill <id> [signal]` (spec.md §6.1).

use clap::Args;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct KillArgs {
    pub id: String,

    /// Signal name (e.g. "TERM", "KILL") or number; default SIGTERM.
    #[arg(default_value = "TERM")]
    pub signal: String,
}

fn parse_signal(s: &str) -> RuntimeResult<i32> {
    if let Ok(n) = s.parse::<i32>() {
        return Ok(n);
    }
    let name = s.trim_start_matches("SIG").to_uppercase();
    let signum = match name.as_str() {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "ILL" => libc::SIGILL,
        "TRAP" => libc::SIGTRAP,
        "ABRT" => libc::SIGABRT,
        "BUS" => libc::SIGBUS,
        "FPE" => libc::SIGFPE,
        "KILL" => libc::SIGKILL,
        "USR1" => libc::SIGUSR1,
        "SEGV" => libc::SIGSEGV,
        "USR2" => libc::SIGUSR2,
        "PIPE" => libc::SIGPIPE,
        "ALRM" => libc::SIGALRM,
        "TERM" => libc::SIGTERM,
        "CHLD" => libc::SIGCHLD,
        "CONT" => libc::SIGCONT,
        "STOP" => libc::SIGSTOP,
        "TSTP" => libc::SIGTSTP,
        "WINCH" => libc::SIGWINCH,
        other => return Err(RuntimeError::ConfigInvalid(format!("unknown signal '{other}'"))),
    };
    Ok(signum)
}

pub fn execute(args: KillArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let signum = parse_signal(&args.signal)?;
    global.orchestrator().kill(&args.id, signum)
}
