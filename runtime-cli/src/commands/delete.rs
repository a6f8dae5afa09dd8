//! `runtime stop`/`runtime delete <id>` (spec.md §6.1, §4.7's delete sequence).

use std::path::Path;

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,

    /// Send SIGKILL first if the container is still running.
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(args: DeleteArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let orchestrator = global.orchestrator();

    if args.force {
        let _ = orchestrator.kill(&args.id, libc::SIGKILL);
    }

    let poststop_hooks = runtime::state::read(&global.runtime_root().container(&args.id).state_path())
        .ok()
        .and_then(|doc| runtime::config::load(&args.id, Path::new(&doc.bundle_path)).ok())
        .map(|c| c.hooks.poststop)
        .unwrap_or_default();
    orchestrator.delete(&args.id, &poststop_hooks)
}
