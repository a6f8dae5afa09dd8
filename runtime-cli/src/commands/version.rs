//! `runtime version` (spec.md §6.1).

use clap::Args;

use runtime_shared::errors::RuntimeResult;

use crate::cli::GlobalFlags;

#[derive(Args, Debug)]
pub struct VersionArgs {}

pub fn execute(_args: VersionArgs, _global: &GlobalFlags) -> RuntimeResult<()> {
    println!("runtime version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
