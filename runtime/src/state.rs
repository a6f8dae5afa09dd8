//! The on-disk state document (spec.md §3.2/§4.3) and its status state
//! machine, grounded on the teacher's `BoxStatus`/`BoxState`
//! (`examples/uran0sH-boxlite/boxlite/src/litebox/state.rs`): a
//! `can_transition_to` state machine plus a JSON-serializable document.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Container lifecycle status (spec.md §3.3): `created -> running ->
/// stopping -> stopped` with `paused <-> running` as the only cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Stopping => "stopping",
            Status::Stopped => "stopped",
        }
    }

    pub fn can_transition_to(&self, target: Status) -> bool {
        use Status::*;
        matches!(
            (self, target),
            (Created, Running)
                | (Running, Stopping)
                | (Running, Paused)
                | (Paused, Running)
                | (Stopping, Stopped)
        )
    }
}

impl std::str::FromStr for Status {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Status::Created),
            "running" => Ok(Status::Running),
            "paused" => Ok(Status::Paused),
            "stopping" => Ok(Status::Stopping),
            "stopped" => Ok(Status::Stopped),
            other => Err(RuntimeError::ConfigInvalid(format!(
                "unknown status '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Console {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInfo {
    pub hypervisor_path: String,
    pub image_path: String,
    pub kernel_path: String,
    #[serde(default)]
    pub workload_path: Option<String>,
    pub kernel_params: String,
    pub pid: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyInfo {
    #[serde(rename = "ctlSocket")]
    pub ctl_socket: String,
    #[serde(rename = "ioSocket")]
    pub io_socket: String,
    #[serde(rename = "consoleSocket")]
    pub console_socket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PodInfo {
    pub sandbox: bool,
    pub sandbox_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessInfo {
    pub cwd: String,
    pub terminal: bool,
    pub user: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    pub stdio_stream: u64,
    pub stderr_stream: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub fsname: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// The full persisted state document (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    pub id: String,
    pub pid: i32,
    #[serde(rename = "bundlePath")]
    pub bundle_path: String,
    #[serde(rename = "commsPath")]
    pub comms_path: String,
    #[serde(rename = "processPath")]
    pub process_path: String,
    pub status: Status,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub console: Option<Console>,
    pub vm: VmInfo,
    pub proxy: ProxyInfo,
    #[serde(default)]
    pub pod: Option<PodInfo>,
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub process: Option<ProcessInfo>,
}

const TOP_LEVEL_KEYS: &[&str] = &[
    "ociVersion",
    "id",
    "pid",
    "bundlePath",
    "commsPath",
    "processPath",
    "status",
    "created",
    "mounts",
    "namespaces",
    "console",
    "vm",
    "proxy",
    "pod",
    "annotations",
    "process",
];

const VM_KEYS: &[&str] = &[
    "hypervisor_path",
    "image_path",
    "kernel_path",
    "workload_path",
    "kernel_params",
    "pid",
];

const PROXY_KEYS: &[&str] = &["ctlSocket", "ioSocket", "consoleSocket"];

fn warn_unknown_keys(scope: &str, value: &Value, known: &[&str]) {
    let Some(obj) = value.as_object() else {
        return;
    };
    let known: BTreeSet<&str> = known.iter().copied().collect();
    for key in obj.keys() {
        if !known.contains(key.as_str()) {
            tracing::warn!(scope, key, "ignoring unknown key in state document");
        }
    }
}

/// Parse a raw state document, logging a warning for any unrecognised key
/// inside a known object before strict-decoding the rest (spec.md §4.3:
/// "An unknown key inside a known object logs a warning and is ignored").
pub fn parse(raw: &str) -> RuntimeResult<StateDocument> {
    let value: Value = serde_json::from_str(raw)?;
    warn_unknown_keys("state", &value, TOP_LEVEL_KEYS);
    if let Some(vm) = value.get("vm") {
        warn_unknown_keys("state.vm", vm, VM_KEYS);
    }
    if let Some(proxy) = value.get("proxy") {
        warn_unknown_keys("state.proxy", proxy, PROXY_KEYS);
    }
    serde_json::from_value(value).map_err(RuntimeError::Json)
}

/// Read and parse the state document at `path`.
pub fn read(path: &Path) -> RuntimeResult<StateDocument> {
    let raw = std::fs::read_to_string(path).map_err(|e| RuntimeError::StateMissing {
        id: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse(&raw).map_err(|e| RuntimeError::StateMissing {
        id: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Atomically replace the state document at `path`, preserving the caller's
/// chosen `created` timestamp (spec.md §3.4: "preserving the original
/// `created` timestamp").
pub fn write(path: &Path, doc: &StateDocument) -> RuntimeResult<()> {
    let body = serde_json::to_vec_pretty(doc)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &body).map_err(|e| RuntimeError::io(&tmp_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o640);
        std::fs::set_permissions(&tmp_path, perms).map_err(|e| RuntimeError::io(&tmp_path, e))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|e| RuntimeError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> StateDocument {
        StateDocument {
            oci_version: "1.0.2".into(),
            id: "c1".into(),
            pid: 1234,
            bundle_path: "/tmp/b1".into(),
            comms_path: "/var/run/cc-oci-runtime/c1".into(),
            process_path: "/var/run/cc-oci-runtime/c1/process.sock".into(),
            status: Status::Created,
            created: Utc::now(),
            mounts: vec![],
            namespaces: vec![],
            console: None,
            vm: VmInfo {
                hypervisor_path: "/usr/bin/qemu".into(),
                image_path: "/var/lib/image.img".into(),
                kernel_path: "/var/lib/vmlinuz".into(),
                workload_path: None,
                kernel_params: "console=ttyS0".into(),
                pid: 5678,
            },
            proxy: ProxyInfo {
                ctl_socket: "/run/proxy.sock".into(),
                io_socket: "/run/proxy-io.sock".into(),
                console_socket: "/run/proxy-console.sock".into(),
            },
            pod: None,
            annotations: Default::default(),
            process: None,
        }
    }

    #[test]
    fn status_transitions_follow_state_diagram() {
        assert!(Status::Created.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Stopping));
        assert!(Status::Running.can_transition_to(Status::Paused));
        assert!(Status::Paused.can_transition_to(Status::Running));
        assert!(Status::Stopping.can_transition_to(Status::Stopped));

        assert!(!Status::Created.can_transition_to(Status::Stopped));
        assert!(!Status::Stopped.can_transition_to(Status::Running));
        assert!(!Status::Paused.can_transition_to(Status::Stopping));
    }

    #[test]
    fn round_trips_through_json() {
        let doc = sample_doc();
        let body = serde_json::to_string(&doc).unwrap();
        let parsed = parse(&body).unwrap();
        assert_eq!(parsed.id, doc.id);
        assert_eq!(parsed.status, doc.status);
        assert_eq!(parsed.vm.hypervisor_path, doc.vm.hypervisor_path);
    }

    #[test]
    fn write_then_read_preserves_created_timestamp() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        let doc = sample_doc();
        write(&path, &doc).unwrap();
        let read_back = read(&path).unwrap();
        assert_eq!(read_back.created, doc.created);
    }

    #[test]
    fn missing_required_field_fails() {
        let raw = r#"{"id":"c1"}"#;
        assert!(parse(raw).is_err());
    }

    #[test]
    fn unknown_key_is_ignored_not_fatal() {
        let mut value: Value = serde_json::to_value(sample_doc()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("futureField".into(), Value::Bool(true));
        let body = serde_json::to_string(&value).unwrap();
        assert!(parse(&body).is_ok());
    }

    #[test]
    fn read_missing_file_is_state_missing_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("does-not-exist.json");
        let err = read(&path).unwrap_err();
        assert!(matches!(err, RuntimeError::StateMissing { .. }));
    }
}
