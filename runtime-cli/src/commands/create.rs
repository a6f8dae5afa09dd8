//! `runtime create <id>` (spec.md §6.1, §4.7's create sequence).

use std::path::PathBuf;

use clap::Args;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub id: String,

    /// Path to the OCI bundle (default: current directory).
    #[arg(short = 'b', long = "bundle", default_value = ".")]
    pub bundle: PathBuf,

    /// Write the shim's pid to this file once created.
    #[arg(long = "pid-file")]
    pub pid_file: Option<PathBuf>,
}

pub fn execute(args: CreateArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let bundle = std::fs::canonicalize(&args.bundle).map_err(|e| RuntimeError::io(&args.bundle, e))?;
    let config = runtime::config::load(&args.id, &bundle)?;
    let orchestrator = global.orchestrator();
    orchestrator.create(&config)?;

    if let Some(pid_file) = &args.pid_file {
        let doc = runtime::state::read(&global.runtime_root().container(&args.id).state_path())?;
        std::fs::write(pid_file, doc.pid.to_string()).map_err(|e| RuntimeError::io(pid_file, e))?;
    }

    Ok(())
}
