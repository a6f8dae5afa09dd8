//! Constants that must agree across the runtime, shim and CLI processes.

/// Default `<root>` runtime directory, per spec.md §6.5.
pub const DEFAULT_ROOT: &str = "/var/run/cc-oci-runtime";

/// Relative filenames inside `<root>/<container-id>/`, per spec.md §3.2.
pub mod filenames {
    pub const STATE: &str = "state.json";
    pub const HYPERVISOR_SOCK: &str = "hypervisor.sock";
    pub const PROCESS_SOCK: &str = "process.sock";
    pub const CONSOLE_SOCK: &str = "console.sock";
    pub const AGENT_CTL_SOCK: &str = "ga-ctl.sock";
    pub const AGENT_TTY_SOCK: &str = "ga-tty.sock";
    pub const SHIM_FLOCK: &str = ".shim-flock";
}

/// Mount `fsname`s that are never persisted to the on-disk mounts array and
/// are skipped when setting up non-system bind mounts (spec.md §4.7, §8).
pub const IGNORED_MOUNT_SOURCES: &[&str] = &[
    "/proc",
    "/dev",
    "/dev/pts",
    "/dev/shm",
    "/dev/mqueue",
    "/sys",
    "/sys/fs/cgroup",
];

/// PCI slot offset applied to network interface index when building
/// `-netdev`/`-device` pairs for the hypervisor argv (spec.md §4.5).
pub const PCI_OFFSET: u32 = 8;

/// Maximum JSON payload accepted on the proxy control socket (spec.md §4.1).
pub const PROXY_CTL_MAX_PAYLOAD: usize = 1_024;

/// Maximum payload accepted on the proxy I/O socket (spec.md §6.3).
pub const PROXY_IO_MAX_PAYLOAD: usize = 10_240;

/// Header size of the proxy control frame: 4-byte length + 4 reserved bytes.
pub const PROXY_CTL_HEADER_SIZE: usize = 8;

/// Header size of the proxy I/O frame: 8-byte stream sequence + 4-byte length.
pub const PROXY_IO_HEADER_SIZE: usize = 12;

/// Signals the shim never forwards because they would terminate the shim
/// itself before it could relay them (spec.md §4.6).
pub const UNFORWARDED_SIGNALS: &[i32] = &[
    libc_signals::SIGKILL,
    libc_signals::SIGSTOP,
    libc_signals::SIGSEGV,
    libc_signals::SIGILL,
    libc_signals::SIGBUS,
    libc_signals::SIGFPE,
    libc_signals::SIGSYS,
    libc_signals::SIGQUIT,
    libc_signals::SIGABRT,
    libc_signals::SIGPIPE,
];

/// Raw signal numbers, duplicated here (rather than depending on `libc` from
/// this crate) so the constant table above stays a `const` array usable from
/// `no_std`-adjacent contexts without pulling in the `libc` dependency.
mod libc_signals {
    pub const SIGKILL: i32 = 9;
    pub const SIGSTOP: i32 = 19;
    pub const SIGSEGV: i32 = 11;
    pub const SIGILL: i32 = 4;
    pub const SIGBUS: i32 = 7;
    pub const SIGFPE: i32 = 8;
    pub const SIGSYS: i32 = 31;
    pub const SIGQUIT: i32 = 3;
    pub const SIGABRT: i32 = 6;
    pub const SIGPIPE: i32 = 13;
}
