//! OCI lifecycle hook execution: `prestart`, `poststart`, `poststop`
//! (spec.md §6.5, §7). Each hook receives the container's state document on
//! stdin, JSON-encoded with embedded newlines collapsed to spaces and a
//! trailing newline appended, matching `runc`-family tooling.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::state::StateDocument;

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Hook {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<String>,
    /// Advisory only: recorded and logged but does not abort the pipeline
    /// if exceeded (spec.md §5).
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Prestart,
    Poststart,
    Poststop,
}

impl HookPhase {
    fn name(self) -> &'static str {
        match self {
            HookPhase::Prestart => "prestart",
            HookPhase::Poststart => "poststart",
            HookPhase::Poststop => "poststop",
        }
    }

    /// Prestart failures are fatal to the operation in progress; poststart
    /// and poststop failures are logged and the pipeline continues
    /// (spec.md §7).
    fn fatal(self) -> bool {
        matches!(self, HookPhase::Prestart)
    }
}

fn state_stdin_payload(state: &StateDocument) -> RuntimeResult<Vec<u8>> {
    let json = serde_json::to_string(state)?;
    let collapsed = json.replace('\n', " ");
    let mut payload = collapsed.into_bytes();
    payload.push(b'\n');
    Ok(payload)
}

fn run_one(hook: &Hook, phase: HookPhase, payload: &[u8]) -> RuntimeResult<()> {
    if let Some(timeout) = hook.timeout {
        tracing::debug!(hook = %hook.path, phase = phase.name(), timeout, "hook declares a timeout (advisory only)");
    }

    let mut cmd = Command::new(&hook.path);
    cmd.args(&hook.args);
    for kv in &hook.env {
        if let Some((k, v)) = kv.split_once('=') {
            cmd.env(k, v);
        }
    }
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| RuntimeError::HookFailed(format!("{} {}: spawn failed: {e}", phase.name(), hook.path)))?;

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(payload);
    }

    let output = child
        .wait_with_output()
        .map_err(|e| RuntimeError::HookFailed(format!("{} {}: wait failed: {e}", phase.name(), hook.path)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RuntimeError::HookFailed(format!(
            "{} {} exited with {}: {}",
            phase.name(),
            hook.path,
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Run every hook in `hooks` in order. Prestart failures abort immediately
/// and propagate; poststart/poststop failures are logged and the remaining
/// hooks still run.
pub fn run_phase(phase: HookPhase, hooks: &[Hook], state: &StateDocument) -> RuntimeResult<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    let payload = state_stdin_payload(state)?;
    for hook in hooks {
        match run_one(hook, phase, &payload) {
            Ok(()) => {}
            Err(e) if phase.fatal() => return Err(e),
            Err(e) => tracing::error!(hook = %hook.path, phase = phase.name(), error = %e, "hook failed, continuing"),
        }
    }
    Ok(())
}

/// Unused by `run_phase` directly; kept for callers that want to bound a
/// hook invocation with a hard wall-clock timeout on top of the advisory
/// field. Not wired in by default since spec.md §5 treats `timeout` as
/// informational.
pub fn advisory_timeout(hook: &Hook) -> Option<Duration> {
    hook.timeout.map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ProxyInfo, StateDocument, Status, VmInfo};

    fn sample_state() -> StateDocument {
        StateDocument {
            oci_version: "1.0.2".into(),
            id: "c1".into(),
            pid: 1234,
            bundle_path: "/bundles/c1".into(),
            comms_path: "/var/run/cc-oci-runtime/c1".into(),
            process_path: "/var/run/cc-oci-runtime/c1/process.sock".into(),
            status: Status::Running,
            created: chrono::Utc::now(),
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
    fn stdin_payload_collapses_newlines_and_trails_one() {
        let state = sample_state();
        let payload = state_stdin_payload(&state).unwrap();
        let text = String::from_utf8(payload).unwrap();
        assert!(!text[..text.len() - 1].contains('\n'));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn prestart_failure_is_fatal() {
        let hooks = vec![Hook {
            path: "/bin/false".into(),
            args: vec![],
            env: vec![],
            timeout: None,
        }];
        let err = run_phase(HookPhase::Prestart, &hooks, &sample_state()).unwrap_err();
        assert!(err.to_string().contains("prestart"));
    }

    #[test]
    fn poststop_failure_is_logged_not_propagated() {
        let hooks = vec![Hook {
            path: "/bin/false".into(),
            args: vec![],
            env: vec![],
            timeout: None,
        }];
        run_phase(HookPhase::Poststop, &hooks, &sample_state()).unwrap();
    }

    #[test]
    fn empty_hook_list_is_a_noop() {
        run_phase(HookPhase::Prestart, &[], &sample_state()).unwrap();
    }
}
