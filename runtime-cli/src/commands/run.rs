//! `runtime run <id>` = `create` immediately followed by `start` (spec.md §6.1).

use std::path::PathBuf;

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

use super::{create::CreateArgs, start::StartArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    pub id: String,

    #[arg(short = 'b', long = "bundle", default_value = ".")]
    pub bundle: PathBuf,

    #[arg(long = "pid-file")]
    pub pid_file: Option<PathBuf>,
}

pub fn execute(args: RunArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    super::create::execute(
        CreateArgs {
            id: args.id.clone(),
            bundle: args.bundle,
            pid_file: args.pid_file,
        },
        global,
    )?;
    super::start::execute(StartArgs { id: args.id }, global)
}
