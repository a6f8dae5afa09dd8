//! `runtime update <id>` — stub (spec.md §1 Non-goals: "in-runtime cgroup
//! enforcement"; `update` exists to adjust cgroup limits, which this
//! runtime never enforces).

use clap::Args;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
}

pub fn execute(_args: UpdateArgs, _global: &GlobalFlags) -> RuntimeResult<()> {
    Err(RuntimeError::ConfigInvalid("update is not implemented".into()))
}
