//! `runtime checkpoint <id>` — stub (spec.md §1 Non-goals: "the subcommand
//! exists but is a no-op gate").

use clap::Args;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    pub id: String,
}

pub fn execute(_args: CheckpointArgs, _global: &GlobalFlags) -> RuntimeResult<()> {
    Err(RuntimeError::ConfigInvalid("checkpoint is not implemented".into()))
}
