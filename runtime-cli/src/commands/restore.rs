//! `runtime restore <id>` — stub (spec.md §1 Non-goals: checkpoint/restore).

use clap::Args;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct RestoreArgs {
    pub id: String,
}

pub fn execute(_args: RestoreArgs, _global: &GlobalFlags) -> RuntimeResult<()> {
    Err(RuntimeError::ConfigInvalid("restore is not implemented".into()))
}
