//! Narrow `config.json` loader (spec.md §1's "the core consumes the
//! already-parsed configuration structure").
//!
//! Full OCI bundle/spec parsing — schema validation, semantic-version
//! checks, mount/namespace/root/VM spec *handlers* — is out of scope. This
//! module deserializes only the subset of fields `ContainerConfig` needs,
//! the same way the teacher's `BoxConfig`/`InstanceSpec` loaders read a
//! narrow JSON shape off disk with `serde`/`serde_json` rather than a full
//! schema validator.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::orchestrator::{ContainerConfig, HookConfig, PodConfig, ProcessConfig, VmConfig};
use crate::state::Mount;
use crate::vmm::NetInterface;

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    root: Option<RawRoot>,
    process: RawProcess,
    #[serde(default)]
    mounts: Vec<Mount>,
    #[serde(default)]
    namespaces: Vec<RawNamespace>,
    #[serde(default)]
    annotations: std::collections::BTreeMap<String, String>,
    vm: RawVm,
    #[serde(default)]
    pod: Option<RawPod>,
    #[serde(default)]
    hooks: RawHooks,
    #[serde(default)]
    interfaces: Vec<RawInterface>,
    #[serde(default)]
    hostname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRoot {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawProcess {
    args: Vec<String>,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default = "default_cwd")]
    cwd: String,
    #[serde(default)]
    terminal: bool,
    #[serde(default)]
    uid: u32,
    #[serde(default)]
    gid: u32,
}

fn default_cwd() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize)]
struct RawNamespace {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawVm {
    hypervisor_path: PathBuf,
    kernel_path: PathBuf,
    #[serde(default)]
    kernel_params: String,
    image_path: PathBuf,
    #[serde(default = "default_sysconf_dir")]
    sysconf_dir: PathBuf,
    #[serde(default = "default_defaults_dir")]
    defaults_dir: PathBuf,
    #[serde(default)]
    log_dir: Option<PathBuf>,
}

fn default_sysconf_dir() -> PathBuf {
    PathBuf::from("/etc/cc-oci-runtime")
}

fn default_defaults_dir() -> PathBuf {
    PathBuf::from("/usr/share/defaults/cc-oci-runtime")
}

#[derive(Debug, Deserialize)]
struct RawPod {
    #[serde(default)]
    sandbox: bool,
    #[serde(default)]
    sandbox_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawHooks {
    #[serde(default)]
    prestart: Vec<crate::hooks::Hook>,
    #[serde(default)]
    poststart: Vec<crate::hooks::Hook>,
    #[serde(default)]
    poststop: Vec<crate::hooks::Hook>,
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    name: String,
}

/// Read `<bundle>/config.json` and produce the `ContainerConfig` the
/// orchestrator consumes. Unknown top-level keys are ignored (forward
/// compatibility, matching `state.rs`'s parsing discipline); unknown
/// nested keys fall through `serde`'s default struct behavior the same
/// way.
pub fn load(id: &str, bundle: &Path) -> RuntimeResult<ContainerConfig> {
    let config_path = bundle.join("config.json");
    let bytes = std::fs::read(&config_path).map_err(|e| RuntimeError::io(&config_path, e))?;
    let raw: RawConfig = serde_json::from_slice(&bytes)?;

    let namespaces = raw.namespaces.into_iter().map(|n| n.kind).collect();
    let interfaces = raw
        .interfaces
        .into_iter()
        .map(|i| NetInterface { name: i.name })
        .collect();

    Ok(ContainerConfig {
        id: id.to_string(),
        bundle: bundle.to_path_buf(),
        root_override: raw.root.map(|r| r.path),
        process: ProcessConfig {
            args: raw.process.args,
            env: raw.process.env,
            cwd: raw.process.cwd,
            terminal: raw.process.terminal,
            uid: raw.process.uid,
            gid: raw.process.gid,
        },
        mounts: raw.mounts,
        namespaces,
        annotations: raw.annotations,
        vm: VmConfig {
            hypervisor_path: raw.vm.hypervisor_path,
            kernel_path: raw.vm.kernel_path,
            kernel_params: raw.vm.kernel_params,
            image_path: raw.vm.image_path,
            sysconf_dir: raw.vm.sysconf_dir,
            defaults_dir: raw.vm.defaults_dir,
            log_dir: raw.vm.log_dir,
        },
        pod: raw.pod.map(|p| PodConfig {
            sandbox: p.sandbox,
            sandbox_name: p.sandbox_name,
        }),
        hooks: HookConfig {
            prestart: raw.hooks.prestart,
            poststart: raw.hooks.poststart,
            poststop: raw.hooks.poststop,
        },
        interfaces,
        hostname: raw.hostname.unwrap_or_else(|| id.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_loads_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{
                "process": { "args": ["/bin/sh"] },
                "vm": {
                    "hypervisor_path": "/usr/bin/qemu",
                    "kernel_path": "/boot/vmlinuz",
                    "image_path": "/var/lib/rootfs.img"
                }
            }"#,
        )
        .unwrap();

        let config = load("c1", dir.path()).unwrap();
        assert_eq!(config.id, "c1");
        assert_eq!(config.process.args, vec!["/bin/sh".to_string()]);
        assert_eq!(config.process.cwd, "/");
        assert!(config.pod.is_none());
        assert_eq!(config.hostname, "c1");
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{
                "futureField": { "anything": true },
                "process": { "args": ["/bin/sh"] },
                "vm": {
                    "hypervisor_path": "/usr/bin/qemu",
                    "kernel_path": "/boot/vmlinuz",
                    "image_path": "/var/lib/rootfs.img"
                }
            }"#,
        )
        .unwrap();

        assert!(load("c1", dir.path()).is_ok());
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load("c1", dir.path()).is_err());
    }
}
