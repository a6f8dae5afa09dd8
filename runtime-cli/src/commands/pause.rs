//! `runtime pause <id>` (spec.md §6.1, §4.5's monitor protocol).

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct PauseArgs {
    pub id: String,
}

pub fn execute(args: PauseArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    global.orchestrator().pause(&args.id)
}
