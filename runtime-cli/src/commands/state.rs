//! `runtime state <id>` — print the on-disk state document as JSON
//! (spec.md §6.1, §6.4).

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct StateArgs {
    pub id: String,
}

pub fn execute(args: StateArgs, global: &GlobalFlags) -> RuntimeResult<()> {
    let doc = runtime::state::read(&global.runtime_root().container(&args.id).state_path())?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
