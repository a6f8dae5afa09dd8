//! Process liveness checks used to enforce spec.md §3.3's invariant: "the
//! state document is only valid if its `pid` field is alive; a dead pid
//! forces `status=stopped` regardless of the stored value." Grounded on
//! `examples/uran0sH-boxlite/boxlite/src/util/process.rs`.

use std::path::Path;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Read a PID from a file containing a decimal string, optionally
/// newline-terminated (spec.md §6.5's pid file).
pub fn read_pid_file(path: &Path) -> RuntimeResult<u32> {
    let content = std::fs::read_to_string(path).map_err(|e| RuntimeError::io(path, e))?;
    content.trim().parse::<u32>().map_err(|e| {
        RuntimeError::ConfigInvalid(format!(
            "invalid pid in {}: '{}' ({e})",
            path.display(),
            content.trim()
        ))
    })
}

/// Send `SIGKILL`. Returns `true` if the process was killed or was already
/// gone, `false` only on a permission failure.
pub fn kill_process(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, libc::SIGKILL) == 0 || !is_process_alive(pid) }
}

/// `kill(pid, 0)` liveness probe (spec.md §3.3, §4.7's "dead pid forces
/// `status=stopped`").
pub fn is_process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// Verify `pid` is still the shim process for `container_id`, guarding
/// against PID reuse between a shim's exit and the runtime next reading
/// its state file. Reads `/proc/{pid}/cmdline` on Linux.
pub fn is_same_process(pid: u32, container_id: &str) -> bool {
    let cmdline_path = format!("/proc/{pid}/cmdline");
    match std::fs::read_to_string(&cmdline_path) {
        Ok(cmdline) => {
            let args: Vec<&str> = cmdline.split('\0').collect();
            args.iter().any(|arg| arg.contains("runtime-shim")) && cmdline.contains(container_id)
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn very_high_pid_is_not_alive() {
        assert!(!is_process_alive(999_999_999));
    }

    #[test]
    fn current_process_is_not_a_shim() {
        assert!(!is_same_process(std::process::id(), "test123"));
    }

    #[test]
    fn pid_zero_is_never_same_process() {
        assert!(!is_same_process(0, "test123"));
    }

    #[test]
    fn read_pid_file_trims_trailing_newline() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "12345\n").unwrap();
        assert_eq!(read_pid_file(tmp.path()).unwrap(), 12345);
    }

    #[test]
    fn read_pid_file_without_newline() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "67890").unwrap();
        assert_eq!(read_pid_file(tmp.path()).unwrap(), 67890);
    }

    #[test]
    fn read_pid_file_rejects_non_numeric_content() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not-a-pid\n").unwrap();
        assert!(read_pid_file(tmp.path()).is_err());
    }

    #[test]
    fn read_pid_file_missing_is_error() {
        assert!(read_pid_file(Path::new("/nonexistent/path/to/pid.file")).is_err());
    }
}
