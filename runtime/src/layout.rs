//! Per-container directory layout under `<root>/<container-id>/`.
//!
//! Path-builder style grounded on
//! `examples/uran0sH-boxlite/boxlite/src/runtime/layout.rs`'s
//! `BoxFilesystemLayout`, trimmed to the file table spec.md §3.2 names.

use std::path::{Path, PathBuf};

use runtime_shared::constants::{DEFAULT_ROOT, filenames};
use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Root directory holding every container's state subdirectory.
#[derive(Clone, Debug)]
pub struct RuntimeRoot {
    root: PathBuf,
}

impl RuntimeRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn default_root() -> Self {
        Self::new(DEFAULT_ROOT)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn container(&self, id: &str) -> ContainerLayout {
        ContainerLayout::new(self.root.join(id))
    }

    /// Enumerate every immediate subdirectory, used by `list` (spec.md §4.7).
    pub fn container_ids(&self) -> RuntimeResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.root).map_err(|e| RuntimeError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| RuntimeError::io(&self.root, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Directory layout for a single container, per spec.md's §3.2 file table.
#[derive(Clone, Debug)]
pub struct ContainerLayout {
    dir: PathBuf,
}

impl ContainerLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(filenames::STATE)
    }

    pub fn hypervisor_sock_path(&self) -> PathBuf {
        self.dir.join(filenames::HYPERVISOR_SOCK)
    }

    pub fn process_sock_path(&self) -> PathBuf {
        self.dir.join(filenames::PROCESS_SOCK)
    }

    pub fn console_sock_path(&self) -> PathBuf {
        self.dir.join(filenames::CONSOLE_SOCK)
    }

    pub fn agent_ctl_sock_path(&self) -> PathBuf {
        self.dir.join(filenames::AGENT_CTL_SOCK)
    }

    pub fn agent_tty_sock_path(&self) -> PathBuf {
        self.dir.join(filenames::AGENT_TTY_SOCK)
    }

    pub fn shim_flock_path(&self) -> PathBuf {
        self.dir.join(filenames::SHIM_FLOCK)
    }

    /// Create the directory and touch the empty flock rendezvous file.
    pub fn prepare(&self) -> RuntimeResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RuntimeError::io(&self.dir, e))?;
        let flock_path = self.shim_flock_path();
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&flock_path)
            .map_err(|e| RuntimeError::io(&flock_path, e))?;
        Ok(())
    }

    /// `rm -rf` the whole container directory, per `stop`/`delete` (§4.7).
    pub fn cleanup(&self) -> RuntimeResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| RuntimeError::io(&self.dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_layout_paths_match_file_table() {
        let layout = ContainerLayout::new(PathBuf::from("/var/run/cc-oci-runtime/c1"));
        assert_eq!(
            layout.state_path(),
            PathBuf::from("/var/run/cc-oci-runtime/c1/state.json")
        );
        assert_eq!(
            layout.shim_flock_path(),
            PathBuf::from("/var/run/cc-oci-runtime/c1/.shim-flock")
        );
    }

    #[test]
    fn prepare_creates_dir_and_flock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ContainerLayout::new(tmp.path().join("c1"));
        layout.prepare().unwrap();
        assert!(layout.root().is_dir());
        assert!(layout.shim_flock_path().is_file());
    }

    #[test]
    fn cleanup_removes_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = ContainerLayout::new(tmp.path().join("c1"));
        layout.prepare().unwrap();
        layout.cleanup().unwrap();
        assert!(!layout.root().exists());
    }

    #[test]
    fn container_ids_lists_only_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RuntimeRoot::new(tmp.path());
        root.container("b").prepare().unwrap();
        root.container("a").prepare().unwrap();
        std::fs::write(tmp.path().join("stray-file"), b"x").unwrap();
        assert_eq!(root.container_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn container_ids_empty_root_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RuntimeRoot::new(tmp.path().join("does-not-exist"));
        assert_eq!(root.container_ids().unwrap(), Vec::<String>::new());
    }
}
