//! Top-level argument parsing (spec.md §6.1), grounded on the teacher's
//! `GlobalFlags` + `BoxliteOptions` split
//! (`examples/uran0sH-boxlite/boxlite-cli/src/cli.rs`): one struct of
//! env-fallback global flags shared by every subcommand, one enum of
//! subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use runtime::layout::RuntimeRoot;
use runtime::orchestrator::Orchestrator;
use runtime_shared::LogFormat;

use crate::commands::{
    checkpoint, create, delete, events, exec, kill, list, pause, ps, restore, resume, run, start,
    state, update, version,
};

#[derive(Parser, Debug)]
#[command(name = "runtime", author, version, about = "OCI-compatible runtime for VM-isolated containers")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug, Clone)]
pub struct GlobalFlags {
    /// State directory (default /var/run/cc-oci-runtime).
    #[arg(long, env = "RUNTIME_ROOT", global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, global = true)]
    pub debug: bool,

    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    #[arg(long = "log-format", default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[arg(long = "global-log", global = true)]
    pub global_log: Option<PathBuf>,

    #[arg(long = "hypervisor-log-dir", global = true)]
    pub hypervisor_log_dir: Option<PathBuf>,

    #[arg(long = "shim-path", env = "RUNTIME_SHIM_PATH", global = true)]
    pub shim_path: Option<PathBuf>,

    #[arg(long = "proxy-socket-path", env = "RUNTIME_PROXY_SOCKET_PATH", global = true)]
    pub proxy_socket_path: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn runtime_root(&self) -> RuntimeRoot {
        match &self.root {
            Some(p) => RuntimeRoot::new(p.clone()),
            None => RuntimeRoot::default_root(),
        }
    }

    pub fn shim_binary(&self) -> PathBuf {
        self.shim_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("runtime-shim"))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.runtime_root(), self.shim_binary(), self.proxy_socket_path())
    }

    pub fn proxy_socket_path(&self) -> PathBuf {
        self.proxy_socket_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("/var/run/cc-oci-runtime/proxy.sock"))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Create(create::CreateArgs),
    Start(start::StartArgs),
    Run(run::RunArgs),
    #[command(alias = "delete")]
    Stop(delete::DeleteArgs),
    Kill(kill::KillArgs),
    Pause(pause::PauseArgs),
    Resume(resume::ResumeArgs),
    Exec(exec::ExecArgs),
    State(state::StateArgs),
    List(list::ListArgs),
    Events(events::EventsArgs),
    Version(version::VersionArgs),
    Checkpoint(checkpoint::CheckpointArgs),
    Restore(restore::RestoreArgs),
    Update(update::UpdateArgs),
    Ps(ps::PsArgs),
}
