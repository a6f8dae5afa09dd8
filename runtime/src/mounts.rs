//! Bind mount setup/teardown and mount-namespace rejoin for `create`'s
//! non-system mounts and `delete`'s cleanup (spec.md §4.7, §9).

use std::path::Path;

use nix::mount::{MsFlags, mount, umount};
use nix::sched::{CloneFlags, setns};

use runtime_shared::constants::IGNORED_MOUNT_SOURCES;
use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::state::Mount;

/// `true` iff this mount's `fsname` is one of the system pseudo-filesystems
/// the orchestrator never bind-mounts itself (spec.md §4.7, tested by
/// spec.md §8's "never appears in the on-disk mounts array").
pub fn is_ignored_mount(fsname: &str) -> bool {
    IGNORED_MOUNT_SOURCES.contains(&fsname)
}

/// Bind-mount every non-ignored entry of `mounts` into the rootfs.
pub fn setup_bind_mounts(mounts: &[Mount]) -> RuntimeResult<()> {
    for m in mounts {
        if m.fsname.as_deref().map(is_ignored_mount).unwrap_or(false) {
            continue;
        }
        let dest = Path::new(&m.destination);
        std::fs::create_dir_all(dest).map_err(|e| RuntimeError::io(dest, e))?;
        mount(
            Some(Path::new(&m.source)),
            dest,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| {
            RuntimeError::Internal(format!(
                "bind mount {} -> {} failed: {e}",
                m.source, m.destination
            ))
        })?;
    }
    Ok(())
}

/// Re-enter the container's mount namespace by `setns`ing into
/// `/proc/<shim-pid>/ns/mnt`, then unmount every non-ignored mount in
/// reverse order (spec.md §9: "if that handle is gone, unmounts are
/// skipped").
pub fn teardown_bind_mounts(shim_pid: u32, mounts: &[Mount]) -> RuntimeResult<()> {
    let ns_path = format!("/proc/{shim_pid}/ns/mnt");
    let ns_file = match std::fs::File::open(&ns_path) {
        Ok(f) => f,
        Err(_) => {
            tracing::warn!(shim_pid, "mount namespace handle gone, skipping unmounts");
            return Ok(());
        }
    };
    setns(&ns_file, CloneFlags::CLONE_NEWNS)
        .map_err(|e| RuntimeError::Unmount(format!("setns({ns_path}) failed: {e}")))?;

    for m in mounts.iter().rev() {
        if m.fsname.as_deref().map(is_ignored_mount).unwrap_or(false) {
            continue;
        }
        if let Err(e) = umount(Path::new(&m.destination)) {
            tracing::error!(dest = %m.destination, error = %e, "unmount failed, continuing cleanup");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignored_mount_sources_are_recognised() {
        assert!(is_ignored_mount("/proc"));
        assert!(is_ignored_mount("/sys/fs/cgroup"));
        assert!(!is_ignored_mount("/data"));
    }
}
