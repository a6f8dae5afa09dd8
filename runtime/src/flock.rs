//! Advisory locking on `.shim-flock`, the empty rendezvous file spec.md
//! §3.2/§5 uses to let the runtime's attached `start` block until the shim
//! exits. Grounded on
//! `examples/uran0sH-boxlite/boxlite/src/runtime/lock.rs`'s
//! `libc::flock(LOCK_EX|LOCK_NB)` pattern, extended with a blocking variant
//! (flock without `LOCK_NB`) since the rendezvous here is "wait for the
//! shim to exit", not "fail fast if busy".

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Open (creating if absent) the flock rendezvous file without locking it.
pub fn open(path: &Path) -> RuntimeResult<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| RuntimeError::io(path, e))
}

/// Acquire an exclusive lock, blocking until it becomes available.
///
/// Used by the shim at startup (it holds the lock for its entire
/// lifetime) and by the runtime's attached `start` (it blocks here until
/// the shim exits and the kernel releases the lock with it).
pub fn lock_exclusive(fd: RawFd) -> RuntimeResult<()> {
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX) };
    if rc != 0 {
        return Err(RuntimeError::Internal(format!(
            "flock(LOCK_EX) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Attempt to acquire an exclusive lock without blocking.
/// Returns `Ok(false)` (not an error) if another holder has it locked.
pub fn try_lock_exclusive(fd: RawFd) -> RuntimeResult<bool> {
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(RuntimeError::Internal(format!("flock(LOCK_EX|LOCK_NB) failed: {err}")))
    }
}

pub fn unlock(fd: RawFd) -> RuntimeResult<()> {
    let rc = unsafe { libc::flock(fd, libc::LOCK_UN) };
    if rc != 0 {
        return Err(RuntimeError::Internal(format!(
            "flock(LOCK_UN) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Blocks the calling thread until the shim holding `path`'s lock exits,
/// then returns. Used by `start` in attached mode (spec.md §4.7).
pub struct ShimFlockWait {
    file: File,
    path: PathBuf,
}

impl ShimFlockWait {
    pub fn wait_for_release(path: &Path) -> RuntimeResult<Self> {
        let file = open(path)?;
        lock_exclusive(file.as_raw_fd())?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ShimFlockWait {
    fn drop(&mut self) {
        let _ = unlock(self.file.as_raw_fd());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn exclusive_lock_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".shim-flock");
        let file = open(&path).unwrap();
        assert!(try_lock_exclusive(file.as_raw_fd()).unwrap());
        unlock(file.as_raw_fd()).unwrap();
    }

    #[test]
    fn second_nonblocking_attempt_fails_while_first_holds_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".shim-flock");
        let first = open(&path).unwrap();
        assert!(try_lock_exclusive(first.as_raw_fd()).unwrap());

        let second = open(&path).unwrap();
        assert!(!try_lock_exclusive(second.as_raw_fd()).unwrap());

        unlock(first.as_raw_fd()).unwrap();
        assert!(try_lock_exclusive(second.as_raw_fd()).unwrap());
    }

    #[test]
    fn wait_for_release_succeeds_once_holder_drops() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".shim-flock");
        let holder = open(&path).unwrap();
        assert!(try_lock_exclusive(holder.as_raw_fd()).unwrap());
        drop(holder);

        let waiter = ShimFlockWait::wait_for_release(&path).unwrap();
        assert_eq!(waiter.path(), path);
    }
}
