//! `runtime resume <id>` (spec.md §6.1, §4.5's monitor protocol).

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    pub id: String,
}

pub fn execute(args: ResumeArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    global.orchestrator().resume(&args.id)
}
