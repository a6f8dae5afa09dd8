//! `runtime exec <id> [--process FILE] [-d] [-t] [--cwd DIR] [-e K=V]... -- <args>`
//! (spec.md §6.1).

use std::path::PathBuf;

use clap::Args;
use serde::Deserialize;

use runtime::orchestrator::ProcessConfig;
use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct ExecArgs {
    pub id: String,

    /// Read the process spec (args/env/cwd/terminal) from a JSON file
    /// instead of the CLI flags below.
    #[arg(long = "process")]
    pub process_file: Option<PathBuf>,

    /// Run detached; don't wait for the exec'd process to exit.
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Allocate a pseudo-terminal for the exec'd process.
    #[arg(short = 't', long)]
    pub tty: bool,

    #[arg(long = "cwd", default_value = "/")]
    pub cwd: String,

    #[arg(short = 'e', long = "env", value_name = "K=V")]
    pub env: Vec<String>,

    #[arg(trailing_var_arg = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessFile {
    args: Vec<String>,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default = "default_cwd")]
    cwd: String,
    #[serde(default)]
    terminal: bool,
    #[serde(default)]
    uid: u32,
    #[serde(default)]
    gid: u32,
}

fn default_cwd() -> String {
    "/".to_string()
}

fn process_from_file(path: &PathBuf) -> RuntimeResult<ProcessConfig> {
    let bytes = std::fs::read(path).map_err(|e| RuntimeError::io(path, e))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let raw: ProcessFile = if is_yaml {
        serde_yaml::from_slice(&bytes)
            .map_err(|e| RuntimeError::ConfigInvalid(format!("{}: {e}", path.display())))?
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok(ProcessConfig {
        args: raw.args,
        env: raw.env,
        cwd: raw.cwd,
        terminal: raw.terminal,
        uid: raw.uid,
        gid: raw.gid,
    })
}

/// Returns the workload's exit code (0 when detached).
pub fn execute(args: ExecArgs, global: &GlobalFlags) -> RuntimeResult<i32> {
    let process = match &args.process_file {
        Some(path) => process_from_file(path)?,
        None => {
            if args.command.is_empty() {
                return Err(RuntimeError::ConfigInvalid(
                    "exec requires --process FILE or a trailing command".into(),
                ));
            }
            ProcessConfig {
                args: args.command,
                env: args.env,
                cwd: args.cwd,
                terminal: args.tty,
                uid: 0,
                gid: 0,
            }
        }
    };

    global.orchestrator().exec(&args.id, &process, !args.detach)
}
