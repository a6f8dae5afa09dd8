//! `runtime ps <id>` — stub (spec.md §6.1 lists it as a stub; listing
//! processes inside a VM-isolated workload requires agent cooperation this
//! core does not implement).

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct PsArgs {
    pub id: String,
}

pub fn execute(args: PsArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let _ = runtime::state::read(&global.runtime_root().container(&args.id).state_path())?;
    println!("PID");
    Ok(())
}
