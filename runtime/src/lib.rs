//! Container lifecycle orchestrator: binds the runtime CLI, the proxy
//! client, the per-container state store, the shim launcher, the VM
//! launcher and the shim's event loop into the `create`/`start`/`kill`/
//! `delete`/`exec`/`pause`/`resume`/`list` subcommand surface.

pub mod codec;
pub mod config;
pub mod flock;
pub mod hooks;
pub mod layout;
pub mod mounts;
pub mod orchestrator;
pub mod procutil;
pub mod proxy;
pub mod shim_launcher;
pub mod state;
pub mod vmm;

pub use runtime_shared::errors::{RuntimeError, RuntimeResult};
