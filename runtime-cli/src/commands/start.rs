//! `runtime start <id>` (spec.md §4.7's start sequence).

use std::path::Path;

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct StartArgs {
    pub id: String,
}

pub fn execute(args: StartArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let orchestrator = global.orchestrator();
    let doc = runtime::state::read(&global.runtime_root().container(&args.id).state_path())?;
    let attached = doc.process.as_ref().map(|p| p.terminal).unwrap_or(false);
    let config = runtime::config::load(&args.id, Path::new(&doc.bundle_path)).ok();
    let poststart_hooks = config.map(|c| c.hooks.poststart).unwrap_or_default();
    orchestrator.start(&args.id, attached, &poststart_hooks)
}
