//! VM launcher (component E): builds the hypervisor argv from a template
//! file, forks it with `Command::pre_exec`, waits for the agent control
//! socket, brings the pod up, allocates I/O and launches the initial shim.
//!
//! Grounded on `examples/uran0sH-boxlite/boxlite/src/jailer/pre_exec.rs`
//! for the fork-then-`pre_exec` async-signal-safe-only pattern (the VM
//! launcher's argv, unlike the shim launcher's, is fully known before
//! `fork`, so `Command` is the right tool here instead of a raw `fork()`).
//! The hypervisor monitor client (pause/resume) is grounded on spec.md §4.5's
//! note that it is "a small separate client" speaking newline-terminated
//! JSON, distinct from the proxy's length-prefixed framing.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use runtime_shared::constants::PCI_OFFSET;
use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::proxy::{ProxyClient, wait_for_path};

/// One network interface discovered for the pod.
#[derive(Debug, Clone)]
pub struct NetInterface {
    pub name: String,
}

/// Everything needed to expand a hypervisor argv template.
pub struct VmLaunchSpec<'a> {
    pub bundle: &'a Path,
    pub sysconf_dir: &'a Path,
    pub defaults_dir: &'a Path,
    pub workload_dir: &'a Path,
    pub kernel: &'a Path,
    pub kernel_params: &'a str,
    pub image: &'a Path,
    pub comms_socket: &'a Path,
    pub process_socket: &'a Path,
    pub console_socket: &'a Path,
    pub name: &'a str,
    pub uuid: &'a str,
    pub agent_ctl_socket: &'a Path,
    pub agent_tty_socket: &'a Path,
    pub interfaces: &'a [NetInterface],
}

/// Locate the first hypervisor argv template that exists, in the search
/// order spec.md §4.5 defines.
pub fn find_hypervisor_args_template(
    bundle: &Path,
    sysconf_dir: &Path,
    defaults_dir: &Path,
) -> RuntimeResult<PathBuf> {
    for candidate in [
        bundle.join("hypervisor.args"),
        sysconf_dir.join("hypervisor.args"),
        defaults_dir.join("hypervisor.args"),
    ] {
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(RuntimeError::ConfigInvalid(
        "no hypervisor.args template found in bundle, sysconf or defaults dir".into(),
    ))
}

/// Strip shell-style trailing comments (`# ...`) and empty lines from a raw
/// template body, returning the surviving non-empty lines. A `#` only
/// starts a comment at line start or when preceded by whitespace, so it
/// can appear inside an argument value (e.g. `serial=foo#1`) untouched.
fn strip_comments_and_blanks(body: &str) -> Vec<String> {
    body.lines()
        .map(|line| {
            let bytes = line.as_bytes();
            let comment_start = bytes.iter().enumerate().find(|&(idx, &b)| {
                b == b'#' && (idx == 0 || bytes[idx - 1].is_ascii_whitespace())
            });
            match comment_start {
                Some((idx, _)) => &line[..idx],
                None => line,
            }
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn substitute_tokens(line: &str, spec: &VmLaunchSpec<'_>, image_size: u64) -> RuntimeResult<String> {
    let console_device = format!(
        "socket,path={},server,nowait,id=charconsole0,signal=off",
        spec.console_socket.display()
    );
    let replacements: &[(&str, String)] = &[
        ("@WORKLOAD_DIR@", spec.workload_dir.display().to_string()),
        ("@KERNEL@", spec.kernel.display().to_string()),
        ("@KERNEL_PARAMS@", spec.kernel_params.to_string()),
        ("@IMAGE@", spec.image.display().to_string()),
        ("@SIZE@", image_size.to_string()),
        ("@COMMS_SOCKET@", spec.comms_socket.display().to_string()),
        ("@PROCESS_SOCKET@", spec.process_socket.display().to_string()),
        ("@CONSOLE_DEVICE@", console_device),
        ("@NAME@", spec.name.to_string()),
        ("@UUID@", spec.uuid.to_string()),
        ("@AGENT_CTL_SOCKET@", spec.agent_ctl_socket.display().to_string()),
        ("@AGENT_TTY_SOCKET@", spec.agent_tty_socket.display().to_string()),
    ];
    let mut out = line.to_string();
    for (token, value) in replacements {
        out = out.replace(token, value);
    }
    Ok(out)
}

/// Build the full hypervisor argv: the template's tokens substituted, plus
/// one `-netdev`/`-device` pair per interface (or `-net none`).
pub fn build_hypervisor_argv(template_body: &str, spec: &VmLaunchSpec<'_>) -> RuntimeResult<Vec<String>> {
    let image_size = std::fs::metadata(spec.image)
        .map_err(|e| RuntimeError::io(spec.image, e))?
        .len();

    if !spec.kernel.exists() {
        return Err(RuntimeError::ConfigInvalid(format!(
            "kernel path does not exist: {}",
            spec.kernel.display()
        )));
    }
    if !spec.workload_dir.exists() {
        return Err(RuntimeError::ConfigInvalid(format!(
            "workload root does not exist: {}",
            spec.workload_dir.display()
        )));
    }

    let lines = strip_comments_and_blanks(template_body);
    if lines.is_empty() {
        return Err(RuntimeError::ConfigInvalid(
            "hypervisor.args template is empty".into(),
        ));
    }

    let mut argv = Vec::new();
    for line in &lines {
        for token in line.split_whitespace() {
            argv.push(substitute_tokens(token, spec, image_size)?);
        }
    }

    if spec.interfaces.is_empty() {
        argv.push("-net".into());
        argv.push("none".into());
    } else {
        for (index, iface) in spec.interfaces.iter().enumerate() {
            let slot = index as u32 + PCI_OFFSET;
            argv.push("-netdev".into());
            argv.push(format!("tap,id=net{index},ifname={}", iface.name));
            argv.push("-device".into());
            argv.push(format!(
                "virtio-net-pci,netdev=net{index},addr={slot:#x}"
            ));
        }
    }

    Ok(argv)
}

/// Fork the hypervisor binary with the expanded argv (spec.md §4.5 steps
/// 3-4): new session, non-standard fds closed, stdout/stderr optionally
/// redirected into the log directory.
pub fn spawn_hypervisor(
    hypervisor_path: &Path,
    argv: &[String],
    log_dir: Option<&Path>,
    container_id: &str,
) -> RuntimeResult<std::process::Child> {
    let mut cmd = Command::new(hypervisor_path);
    cmd.args(argv);

    match log_dir {
        Some(dir) => {
            let stdout_path = dir.join(format!("{container_id}-hypervisor.stdout"));
            let stderr_path = dir.join(format!("{container_id}-hypervisor.stderr"));
            let stdout = std::fs::File::create(&stdout_path).map_err(|e| RuntimeError::io(&stdout_path, e))?;
            let stderr = std::fs::File::create(&stderr_path).map_err(|e| RuntimeError::io(&stderr_path, e))?;
            cmd.stdout(stdout);
            cmd.stderr(stderr);
        }
        None => {
            cmd.stdout(Stdio::null());
            cmd.stderr(Stdio::null());
        }
    }
    cmd.stdin(Stdio::null());

    // SAFETY: `setsid` is async-signal-safe and is the only operation this
    // hook performs before `execvp` runs; no allocation happens inside it.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    cmd.spawn()
        .map_err(|e| RuntimeError::Internal(format!("failed to spawn hypervisor: {e}")))
}

/// Block waiting for the agent control socket, then perform the
/// `hello`+`startpod` handshake (spec.md §4.5 steps 5-6).
pub fn bring_pod_up(
    agent_ctl_socket: &Path,
    proxy: &mut ProxyClient,
    container_id: &str,
    ctl_serial: &str,
    io_serial: &str,
    console: &str,
    hostname: &str,
    interfaces: &[NetInterface],
) -> RuntimeResult<()> {
    wait_for_path(agent_ctl_socket)?;
    proxy.hello(container_id, ctl_serial, io_serial, console)?;
    proxy.hyper(
        "startpod",
        serde_json::json!({
            "containers": [],
            "hostname": hostname,
            "interfaces": interfaces.iter().map(|i| &i.name).collect::<Vec<_>>(),
            "routes": [],
            "shareDir": "rootfs",
        }),
    )?;
    Ok(())
}

/// Newline-terminated-JSON client for the hypervisor's monitor socket
/// (spec.md §4.5: "a small separate client", distinct from the proxy's
/// length-prefixed control framing).
pub struct HypervisorMonitorClient {
    reader: BufReader<std::os::unix::net::UnixStream>,
    writer: std::os::unix::net::UnixStream,
}

impl HypervisorMonitorClient {
    pub fn connect(socket_path: &Path) -> RuntimeResult<Self> {
        let stream = std::os::unix::net::UnixStream::connect(socket_path)
            .map_err(|e| RuntimeError::ProxyRpc(format!("connect {}: {e}", socket_path.display())))?;
        let writer = stream
            .try_clone()
            .map_err(|e| RuntimeError::ProxyRpc(format!("clone monitor socket: {e}")))?;
        let mut client = Self {
            reader: BufReader::new(stream),
            writer,
        };
        client.negotiate_welcome()?;
        Ok(client)
    }

    fn negotiate_welcome(&mut self) -> RuntimeResult<()> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| RuntimeError::ProxyRpc(format!("read monitor welcome: {e}")))?;
        let _: serde_json::Value = serde_json::from_str(line.trim())?;
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> RuntimeResult<serde_json::Value> {
        let line = serde_json::to_string(&serde_json::json!({ "execute": command }))?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| RuntimeError::ProxyRpc(format!("write monitor command: {e}")))?;

        let mut reply = String::new();
        self.reader
            .read_line(&mut reply)
            .map_err(|e| RuntimeError::ProxyRpc(format!("read monitor reply: {e}")))?;
        let value: serde_json::Value = serde_json::from_str(reply.trim())?;
        Ok(value)
    }

    pub fn stop(&mut self) -> RuntimeResult<()> {
        self.send_command("stop")?;
        Ok(())
    }

    pub fn cont(&mut self) -> RuntimeResult<()> {
        self.send_command("cont")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_fixture<'a>(
        tmp: &'a Path,
        interfaces: &'a [NetInterface],
    ) -> VmLaunchSpec<'a> {
        VmLaunchSpec {
            bundle: tmp,
            sysconf_dir: tmp,
            defaults_dir: tmp,
            workload_dir: tmp,
            kernel: tmp,
            kernel_params: "console=ttyS0",
            image: tmp,
            comms_socket: tmp,
            process_socket: tmp,
            console_socket: tmp,
            name: "c1",
            uuid: "0000",
            agent_ctl_socket: tmp,
            agent_tty_socket: tmp,
            interfaces,
        }
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let body = "-m 256\n# a comment\n\n-kernel @KERNEL@  # trailing\n";
        let lines = strip_comments_and_blanks(body);
        assert_eq!(lines, vec!["-m 256", "-kernel @KERNEL@"]);
    }

    #[test]
    fn hash_inside_an_argument_value_is_not_a_comment() {
        let body = "-device virtio-blk,serial=foo#1\n";
        let lines = strip_comments_and_blanks(body);
        assert_eq!(lines, vec!["-device virtio-blk,serial=foo#1"]);
    }

    #[test]
    fn empty_template_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_fixture(tmp.path(), &[]);
        let err = build_hypervisor_argv("# only a comment\n", &spec).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn no_interfaces_adds_net_none() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_fixture(tmp.path(), &[]);
        let argv = build_hypervisor_argv("-m 256\n", &spec).unwrap();
        assert!(argv.windows(2).any(|w| w == ["-net", "none"]));
    }

    #[test]
    fn interfaces_get_pci_slot_offset() {
        let tmp = tempfile::tempdir().unwrap();
        let ifaces = vec![NetInterface { name: "tap0".into() }];
        let spec = spec_fixture(tmp.path(), &ifaces);
        let argv = build_hypervisor_argv("-m 256\n", &spec).unwrap();
        let device = argv.iter().find(|a| a.starts_with("virtio-net-pci")).unwrap();
        assert!(device.contains(&format!("addr={:#x}", PCI_OFFSET)));
    }

    #[test]
    fn token_substitution_replaces_kernel_path() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = spec_fixture(tmp.path(), &[]);
        let argv = build_hypervisor_argv("-kernel @KERNEL@\n", &spec).unwrap();
        assert!(argv.contains(&tmp.path().display().to_string()));
    }
}
