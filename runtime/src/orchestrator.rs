//! Lifecycle orchestrator (component G): sequences components A-F into the
//! `create`/`start`/`run`/`kill`/`stop`-`delete`/`exec`/`pause`/`resume`/
//! `list` subcommand surface (spec.md §4.7).

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use chrono::Utc;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use runtime_shared::errors::{RuntimeError, RuntimeResult};

use crate::hooks::{self, Hook, HookPhase};
use crate::layout::{ContainerLayout, RuntimeRoot};
use crate::mounts;
use crate::proxy::ProxyClient;
use crate::shim_launcher::{self, ShimLaunchOptions};
use crate::state::{self, Console, Mount, PodInfo, ProcessInfo, StateDocument, Status};
use crate::vmm::{self, HypervisorMonitorClient, NetInterface, VmLaunchSpec};

/// The container configuration this system consumes (spec.md §3.1). Parsing
/// the OCI bundle into this shape is out of scope; the orchestrator only
/// reads it.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub id: String,
    pub bundle: PathBuf,
    pub root_override: Option<PathBuf>,
    pub process: ProcessConfig,
    pub mounts: Vec<crate::state::Mount>,
    pub namespaces: Vec<String>,
    pub annotations: std::collections::BTreeMap<String, String>,
    pub vm: VmConfig,
    pub pod: Option<PodConfig>,
    pub hooks: HookConfig,
    pub interfaces: Vec<NetInterface>,
    pub hostname: String,
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub args: Vec<String>,
    pub env: Vec<String>,
    pub cwd: String,
    pub terminal: bool,
    pub uid: u32,
    pub gid: u32,
}

#[derive(Debug, Clone)]
pub struct VmConfig {
    pub hypervisor_path: PathBuf,
    pub kernel_path: PathBuf,
    pub kernel_params: String,
    pub image_path: PathBuf,
    pub sysconf_dir: PathBuf,
    pub defaults_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PodConfig {
    pub sandbox: bool,
    pub sandbox_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct HookConfig {
    pub prestart: Vec<Hook>,
    pub poststart: Vec<Hook>,
    pub poststop: Vec<Hook>,
}

/// The outcome of launching a shim: its pid plus the `ioBase` the proxy
/// assigned, needed to fill in the state document's `process` fields.
struct ShimHandle {
    pid: Pid,
    io_base: u64,
}

/// Paths to the two binaries the orchestrator forks, the runtime root, and
/// the proxy daemon's own listen socket. The proxy is a separate
/// out-of-process daemon (spec.md §1/§2/§9's Design Notes call out that its
/// framed-JSON protocol is distinct from the per-container hypervisor
/// monitor socket); this path is where the orchestrator dials it, never
/// `hypervisor.sock`.
pub struct Orchestrator {
    pub root: RuntimeRoot,
    pub shim_binary: PathBuf,
    pub proxy_socket_path: PathBuf,
}

impl Orchestrator {
    pub fn new(root: RuntimeRoot, shim_binary: PathBuf, proxy_socket_path: PathBuf) -> Self {
        Self {
            root,
            shim_binary,
            proxy_socket_path,
        }
    }

    fn layout(&self, id: &str) -> ContainerLayout {
        self.root.container(id)
    }

    fn load_state(&self, id: &str) -> RuntimeResult<StateDocument> {
        state::read(&self.layout(id).state_path())
    }

    fn save_state(&self, id: &str, doc: &StateDocument) -> RuntimeResult<()> {
        state::write(&self.layout(id).state_path(), doc)
    }

    /// A state document whose `pid` is dead is forced to `stopped`
    /// regardless of its stored `status` (spec.md §3.3).
    fn effective_status(doc: &StateDocument) -> Status {
        if crate::procutil::is_process_alive(doc.pid as u32) {
            doc.status
        } else {
            Status::Stopped
        }
    }

    /// Open a fresh connection to the proxy's control socket for the shim's
    /// exclusive use, clearing `FD_CLOEXEC` so it survives the fork (spec.md
    /// §4.4: "caller holds ... proxy_ctl_fd ... already connected and open
    /// (not CLOEXEC)"). The orchestrator's own `ProxyClient` connections
    /// (used for `hello`/`attach`/`allocateIO`/`bye`) are separate sockets.
    fn open_proxy_ctl_for_shim(ctl_socket: &Path) -> RuntimeResult<UnixStream> {
        let stream = UnixStream::connect(ctl_socket)
            .map_err(|e| RuntimeError::ProxyRpc(format!("connect {}: {e}", ctl_socket.display())))?;
        fcntl(&stream, FcntlArg::F_SETFD(FdFlag::empty()))
            .map_err(|e| RuntimeError::ShimSetup(format!("clear CLOEXEC on shim proxy fd: {e}")))?;
        Ok(stream)
    }

    /// Launch a shim (initial workload or `exec`), handing it a fresh proxy
    /// control connection, the out-of-band I/O fd, and the flock fd. Closes
    /// the parent's copies of the proxy/flock fds once the child has its own
    /// (fork-duplicated) copies.
    #[allow(clippy::too_many_arguments)]
    fn launch_shim(
        &self,
        ctl_socket: &Path,
        container_id: &str,
        io_fd: std::os::fd::OwnedFd,
        io_base: u64,
        layout: &ContainerLayout,
        console_path: Option<&Path>,
        terminal: bool,
        initial: bool,
    ) -> RuntimeResult<ShimHandle> {
        let proxy_ctl_stream = Self::open_proxy_ctl_for_shim(ctl_socket)?;
        let proxy_ctl_fd: RawFd = proxy_ctl_stream.as_raw_fd();

        let flock_file = crate::flock::open(&layout.shim_flock_path())?;
        let flock_fd: RawFd = flock_file.as_raw_fd();

        let opts = ShimLaunchOptions {
            shim_binary: &self.shim_binary,
            container_id,
            proxy_ctl_fd,
            io_fd,
            io_base,
            flock_fd,
            console_path,
            terminal,
            initial,
        };
        let pid = shim_launcher::launch(opts)?;

        // The child's fork-duplicated descriptors keep the underlying
        // connections alive; the parent's copies are no longer needed.
        drop(proxy_ctl_stream);
        drop(flock_file);

        Ok(ShimHandle { pid, io_base })
    }

    // ---- create ----------------------------------------------------

    /// The rootfs bind-mount a pod member exposes into the sandbox's own
    /// mount namespace, keyed by the member's own id (spec.md §8 scenario
    /// 4: `src=<c2-root>, dst=/c2/rootfs`), appended to the caller's mounts.
    fn effective_mounts(config: &ContainerConfig) -> Vec<Mount> {
        let mut mounts = config.mounts.clone();
        if let Some(pod) = &config.pod {
            if !pod.sandbox {
                let root = config
                    .root_override
                    .clone()
                    .unwrap_or_else(|| config.bundle.join("rootfs"));
                mounts.push(Mount {
                    source: root.display().to_string(),
                    destination: format!("/{}/rootfs", config.id),
                    fsname: None,
                    options: Vec::new(),
                });
            }
        }
        mounts
    }

    pub fn create(&self, config: &ContainerConfig) -> RuntimeResult<()> {
        let layout = self.layout(&config.id);
        if layout.state_path().exists() {
            return Err(RuntimeError::AlreadyExists(config.id.clone()));
        }
        layout.prepare()?;

        let mounts = Self::effective_mounts(config);
        mounts::setup_bind_mounts(&mounts)?;

        let is_pod_member = config.pod.as_ref().map(|p| !p.sandbox).unwrap_or(false);

        let (vm_pid, ctl_socket, shim) = if is_pod_member {
            self.attach_pod_member(config, &layout)?
        } else {
            self.launch_vm_and_shim(config, &layout)?
        };

        let doc = StateDocument {
            oci_version: "1.0.2".into(),
            id: config.id.clone(),
            pid: shim.pid.as_raw(),
            bundle_path: config.bundle.display().to_string(),
            comms_path: layout.root().display().to_string(),
            process_path: layout.process_sock_path().display().to_string(),
            status: Status::Created,
            created: Utc::now(),
            mounts,
            namespaces: config.namespaces.clone(),
            console: config.process.terminal.then(|| Console {
                path: Some(layout.console_sock_path().display().to_string()),
            }),
            vm: crate::state::VmInfo {
                hypervisor_path: config.vm.hypervisor_path.display().to_string(),
                image_path: config.vm.image_path.display().to_string(),
                kernel_path: config.vm.kernel_path.display().to_string(),
                workload_path: Some(config.bundle.display().to_string()),
                kernel_params: config.vm.kernel_params.clone(),
                pid: vm_pid,
            },
            proxy: crate::state::ProxyInfo {
                ctl_socket,
                io_socket: layout.process_sock_path().display().to_string(),
                console_socket: layout.console_sock_path().display().to_string(),
            },
            pod: config.pod.as_ref().map(|p| PodInfo {
                sandbox: p.sandbox,
                sandbox_name: p.sandbox_name.clone(),
            }),
            annotations: config.annotations.clone(),
            process: Some(ProcessInfo {
                cwd: config.process.cwd.clone(),
                terminal: config.process.terminal,
                user: format!("{}:{}", config.process.uid, config.process.gid),
                args: config.process.args.clone(),
                env: config.process.env.clone(),
                stdio_stream: shim.io_base,
                stderr_stream: if config.process.terminal {
                    0
                } else {
                    shim.io_base + 1
                },
            }),
        };
        self.save_state(&config.id, &doc)?;

        let pid_path = layout.root().join("pidfile");
        std::fs::write(&pid_path, format!("{}\n", shim.pid.as_raw()))
            .map_err(|e| RuntimeError::io(&pid_path, e))?;

        hooks::run_phase(HookPhase::Prestart, &config.hooks.prestart, &doc)?;

        Ok(())
    }

    fn launch_vm_and_shim(
        &self,
        config: &ContainerConfig,
        layout: &ContainerLayout,
    ) -> RuntimeResult<(i32, String, ShimHandle)> {
        let template_path = vmm::find_hypervisor_args_template(
            &config.bundle,
            &config.vm.sysconf_dir,
            &config.vm.defaults_dir,
        )?;
        let template_body =
            std::fs::read_to_string(&template_path).map_err(|e| RuntimeError::io(&template_path, e))?;

        let spec = VmLaunchSpec {
            bundle: &config.bundle,
            sysconf_dir: &config.vm.sysconf_dir,
            defaults_dir: &config.vm.defaults_dir,
            workload_dir: &config.bundle,
            kernel: &config.vm.kernel_path,
            kernel_params: &config.vm.kernel_params,
            image: &config.vm.image_path,
            comms_socket: &layout.hypervisor_sock_path(),
            process_socket: &layout.process_sock_path(),
            console_socket: &layout.console_sock_path(),
            name: &config.id,
            uuid: &config.id,
            agent_ctl_socket: &layout.agent_ctl_sock_path(),
            agent_tty_socket: &layout.agent_tty_sock_path(),
            interfaces: &config.interfaces,
        };
        let argv = vmm::build_hypervisor_argv(&template_body, &spec)?;
        let child = vmm::spawn_hypervisor(
            &config.vm.hypervisor_path,
            &argv,
            config.vm.log_dir.as_deref(),
            &config.id,
        )?;
        let vm_pid = child.id() as i32;
        // The hypervisor is a long-lived independent process tracked by pid
        // in the state file, not by this `Child` handle; dropping it here
        // does not signal or wait for the process (spec.md §3.4).
        drop(child);

        let agent_ctl = layout.agent_ctl_sock_path();
        let mut proxy = ProxyClient::connect(&self.proxy_socket_path)?;
        vmm::bring_pod_up(
            &agent_ctl,
            &mut proxy,
            &config.id,
            "ctl0",
            "io0",
            &layout.console_sock_path().display().to_string(),
            &config.hostname,
            &config.interfaces,
        )?;

        let n_streams = if config.process.terminal { 1 } else { 2 };
        let (io_base, io_fd) = proxy.allocate_io(n_streams)?;

        let console_path = config.process.terminal.then(|| layout.console_sock_path());
        let shim = self.launch_shim(
            &self.proxy_socket_path,
            &config.id,
            io_fd,
            io_base,
            layout,
            console_path.as_deref(),
            config.process.terminal,
            true,
        )?;

        Ok((vm_pid, self.proxy_socket_path.display().to_string(), shim))
    }

    fn attach_pod_member(
        &self,
        config: &ContainerConfig,
        layout: &ContainerLayout,
    ) -> RuntimeResult<(i32, String, ShimHandle)> {
        let pod = config
            .pod
            .as_ref()
            .ok_or_else(|| RuntimeError::ConfigInvalid("pod member config missing pod descriptor".into()))?;
        let sandbox_layout = self.layout(&pod.sandbox_name);
        let sandbox_state = self.load_state(&pod.sandbox_name)?;
        if Self::effective_status(&sandbox_state) != Status::Running {
            return Err(RuntimeError::InvalidState(format!(
                "sandbox {} is not running",
                pod.sandbox_name
            )));
        }

        let ctl_socket = Path::new(&sandbox_state.proxy.ctl_socket).to_path_buf();
        let mut proxy = ProxyClient::connect(&ctl_socket)?;
        proxy.attach(&pod.sandbox_name)?;

        let n_streams = if config.process.terminal { 1 } else { 2 };
        let (io_base, io_fd) = proxy.allocate_io(n_streams)?;

        let console_path = config.process.terminal.then(|| layout.console_sock_path());
        let shim = self.launch_shim(
            &ctl_socket,
            &config.id,
            io_fd,
            io_base,
            layout,
            console_path.as_deref(),
            config.process.terminal,
            true,
        )?;

        Ok((sandbox_state.vm.pid, ctl_socket.display().to_string(), shim))
    }

    // ---- start -----------------------------------------------------

    pub fn start(&self, id: &str, attached: bool, poststart_hooks: &[Hook]) -> RuntimeResult<()> {
        let layout = self.layout(id);
        let mut doc = self.load_state(id)?;
        if doc.status != Status::Created {
            return Err(RuntimeError::InvalidState(format!(
                "start requires status=created, got {}",
                doc.status
            )));
        }

        crate::proxy::wait_for_path(&layout.process_sock_path())?;

        if let Some(pod) = &doc.pod {
            if !pod.sandbox {
                let mut proxy = ProxyClient::connect(Path::new(&doc.proxy.ctl_socket))?;
                proxy.hyper(
                    "newcontainer",
                    serde_json::json!({ "id": doc.id, "process": doc.process }),
                )?;
            }
        }

        kill(Pid::from_raw(doc.pid), Signal::SIGCONT)
            .map_err(|e| RuntimeError::Internal(format!("SIGCONT shim: {e}")))?;

        doc.status = Status::Running;
        self.save_state(id, &doc)?;

        hooks::run_phase(HookPhase::Poststart, poststart_hooks, &doc)?;

        if attached {
            let waiter = crate::flock::ShimFlockWait::wait_for_release(&layout.shim_flock_path())?;
            drop(waiter);
            let reloaded = self.load_state(id)?;
            if matches!(reloaded.status, Status::Running | Status::Created) {
                let _ = mounts::teardown_bind_mounts(reloaded.pid as u32, &reloaded.mounts);
                let _ = layout.cleanup();
            }
        }

        Ok(())
    }

    // ---- kill --------------------------------------------------------

    pub fn kill(&self, id: &str, signum: i32) -> RuntimeResult<()> {
        let mut doc = self.load_state(id)?;

        let sandbox_with_no_workload =
            doc.pod.as_ref().map(|p| p.sandbox).unwrap_or(false) && doc.process.is_none();
        if sandbox_with_no_workload {
            doc.status = Status::Stopped;
            return self.save_state(id, &doc);
        }

        let previous_status = doc.status;
        doc.status = Status::Stopping;
        self.save_state(id, &doc)?;

        let signal = Signal::try_from(signum)
            .map_err(|_| RuntimeError::ConfigInvalid(format!("invalid signal number {signum}")))?;
        let result = kill(Pid::from_raw(doc.pid), signal);

        if result.is_ok() && matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
            if let Ok(mut proxy) = ProxyClient::connect(Path::new(&doc.proxy.ctl_socket)) {
                let _ = proxy.hyper("killcontainer", serde_json::json!({ "id": id, "signal": signum }));
            }
        }

        match result {
            Ok(()) => {
                doc.status = Status::Stopped;
                self.save_state(id, &doc)
            }
            Err(e) => {
                doc.status = previous_status;
                self.save_state(id, &doc)?;
                Err(RuntimeError::Internal(format!("kill({signum}) failed: {e}")))
            }
        }
    }

    // ---- stop / delete -------------------------------------------------

    /// Deleting a container whose state document is already gone is not an
    /// error (spec.md §7's state-missing table: `delete` tolerates
    /// double-deletes by logging a warning and returning success).
    pub fn delete(&self, id: &str, poststop_hooks: &[Hook]) -> RuntimeResult<()> {
        let layout = self.layout(id);
        let doc = match self.load_state(id) {
            Ok(doc) => doc,
            Err(RuntimeError::StateMissing { .. }) => {
                tracing::warn!(id, "delete: no state document, treating as already deleted");
                let _ = layout.cleanup();
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if crate::procutil::is_process_alive(doc.vm.pid as u32) {
            if let Ok(mut proxy) = ProxyClient::connect(Path::new(&doc.proxy.ctl_socket)) {
                let _ = proxy.hyper("destroypod", serde_json::json!({ "id": id }));
            }
        }

        let _ = mounts::teardown_bind_mounts(doc.pid as u32, &doc.mounts);

        if let Ok(mut proxy) = ProxyClient::connect(Path::new(&doc.proxy.ctl_socket)) {
            let _ = proxy.bye(id);
        }

        hooks::run_phase(HookPhase::Poststop, poststop_hooks, &doc)?;

        layout.cleanup()?;
        Ok(())
    }

    // ---- exec ----------------------------------------------------------

    pub fn exec(&self, id: &str, process: &ProcessConfig, attached: bool) -> RuntimeResult<i32> {
        let layout = self.layout(id);
        let doc = self.load_state(id)?;

        let ctl_socket = Path::new(&doc.proxy.ctl_socket).to_path_buf();
        let mut proxy = ProxyClient::connect(&ctl_socket)?;
        proxy.attach(id)?;

        let n_streams = if process.terminal { 1 } else { 2 };
        let (io_base, io_fd) = proxy.allocate_io(n_streams)?;

        proxy.hyper(
            "execcmd",
            serde_json::json!({
                "id": id,
                "args": process.args,
                "env": process.env,
                "cwd": process.cwd,
                "terminal": process.terminal,
            }),
        )?;

        let console_path = process.terminal.then(|| layout.console_sock_path());
        let shim = self.launch_shim(
            &ctl_socket,
            id,
            io_fd,
            io_base,
            &layout,
            console_path.as_deref(),
            process.terminal,
            false,
        )?;

        if attached {
            let mut status: i32 = 0;
            // SAFETY: `shim.pid` was just returned by a successful fork in
            // this process; it is our own child.
            unsafe {
                libc::waitpid(shim.pid.as_raw(), &mut status, 0);
            }
            return Ok(libc::WEXITSTATUS(status));
        }
        Ok(0)
    }

    // ---- pause / resume -------------------------------------------------

    pub fn pause(&self, id: &str) -> RuntimeResult<()> {
        let layout = self.layout(id);
        let mut doc = self.load_state(id)?;
        let mut monitor = HypervisorMonitorClient::connect(&layout.hypervisor_sock_path())?;
        monitor.stop()?;
        doc.status = Status::Paused;
        self.save_state(id, &doc)
    }

    pub fn resume(&self, id: &str) -> RuntimeResult<()> {
        let layout = self.layout(id);
        let mut doc = self.load_state(id)?;
        let mut monitor = HypervisorMonitorClient::connect(&layout.hypervisor_sock_path())?;
        monitor.cont()?;
        doc.status = Status::Running;
        self.save_state(id, &doc)
    }

    // ---- list ------------------------------------------------------------

    /// Never errors on an individual unreadable state file (spec.md §4.7).
    pub fn list(&self) -> RuntimeResult<Vec<StateDocument>> {
        let mut out = Vec::new();
        for id in self.root.container_ids()? {
            let path = self.layout(&id).state_path();
            match state::read(&path) {
                Ok(mut doc) => {
                    doc.status = Self::effective_status(&doc);
                    out.push(doc);
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "skipping unreadable state file in list");
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_state(root: &RuntimeRoot, id: &str, pid: i32, status: &str) {
        let layout = root.container(id);
        layout.prepare().unwrap();
        let body = serde_json::json!({
            "ociVersion": "1.0.2",
            "id": id,
            "pid": pid,
            "bundlePath": "/tmp/b1",
            "commsPath": "/var/run/cc-oci-runtime/x",
            "processPath": "/var/run/cc-oci-runtime/x/process.sock",
            "status": status,
            "created": chrono::Utc::now().to_rfc3339(),
            "vm": {
                "hypervisor_path": "/usr/bin/qemu",
                "image_path": "/var/lib/image.img",
                "kernel_path": "/var/lib/vmlinuz",
                "kernel_params": "console=ttyS0",
                "pid": pid,
            },
            "proxy": {
                "ctlSocket": "/run/proxy.sock",
                "ioSocket": "/run/proxy-io.sock",
                "consoleSocket": "/run/proxy-console.sock",
            },
        });
        std::fs::write(layout.state_path(), serde_json::to_vec(&body).unwrap()).unwrap();
    }

    #[test]
    fn list_on_empty_root_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(RuntimeRoot::new(tmp.path()), PathBuf::from("runtime-shim"), PathBuf::from("/run/proxy.sock"));
        assert!(orchestrator.list().unwrap().is_empty());
    }

    #[test]
    fn list_reports_dead_pid_as_stopped() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RuntimeRoot::new(tmp.path());
        write_state(&root, "c1", 2_147_483_647, "running");
        let orchestrator = Orchestrator::new(root, PathBuf::from("runtime-shim"), PathBuf::from("/run/proxy.sock"));
        let docs = orchestrator.list().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].status, Status::Stopped);
    }

    #[test]
    fn list_preserves_status_for_alive_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RuntimeRoot::new(tmp.path());
        write_state(&root, "c1", std::process::id() as i32, "created");
        let orchestrator = Orchestrator::new(root, PathBuf::from("runtime-shim"), PathBuf::from("/run/proxy.sock"));
        let docs = orchestrator.list().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].status, Status::Created);
    }

    #[test]
    fn list_skips_unreadable_state_file_without_erroring() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RuntimeRoot::new(tmp.path());
        let layout = root.container("broken");
        layout.prepare().unwrap();
        std::fs::write(layout.state_path(), b"not json").unwrap();
        let orchestrator = Orchestrator::new(root, PathBuf::from("runtime-shim"), PathBuf::from("/run/proxy.sock"));
        assert!(orchestrator.list().unwrap().is_empty());
    }

    fn minimal_config(id: &str, bundle: &Path, pod: Option<PodConfig>) -> ContainerConfig {
        ContainerConfig {
            id: id.to_string(),
            bundle: bundle.to_path_buf(),
            root_override: None,
            process: ProcessConfig {
                args: vec!["/bin/true".into()],
                env: Vec::new(),
                cwd: "/".into(),
                terminal: false,
                uid: 0,
                gid: 0,
            },
            mounts: Vec::new(),
            namespaces: Vec::new(),
            annotations: Default::default(),
            vm: VmConfig {
                hypervisor_path: PathBuf::from("/usr/bin/qemu"),
                kernel_path: PathBuf::from("/boot/vmlinuz"),
                kernel_params: String::new(),
                image_path: PathBuf::from("/var/lib/image.img"),
                sysconf_dir: PathBuf::from("/etc/cc-oci-runtime"),
                defaults_dir: PathBuf::from("/usr/share/defaults/cc-oci-runtime"),
                log_dir: None,
            },
            pod,
            hooks: HookConfig::default(),
            interfaces: Vec::new(),
            hostname: id.to_string(),
        }
    }

    #[test]
    fn effective_mounts_adds_pod_member_rootfs_bind_mount() {
        let config = minimal_config(
            "c2",
            Path::new("/tmp/b2"),
            Some(PodConfig {
                sandbox: false,
                sandbox_name: "c1".into(),
            }),
        );
        let mounts = Orchestrator::effective_mounts(&config);
        let synthetic = mounts
            .iter()
            .find(|m| m.destination == "/c2/rootfs")
            .expect("pod member rootfs bind mount");
        assert_eq!(synthetic.source, "/tmp/b2/rootfs");
    }

    #[test]
    fn effective_mounts_leaves_sandbox_owner_untouched() {
        let config = minimal_config(
            "c1",
            Path::new("/tmp/b1"),
            Some(PodConfig {
                sandbox: true,
                sandbox_name: "c1".into(),
            }),
        );
        assert!(Orchestrator::effective_mounts(&config).is_empty());
    }

    #[test]
    fn delete_on_missing_state_is_a_tolerated_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(RuntimeRoot::new(tmp.path()), PathBuf::from("runtime-shim"), PathBuf::from("/run/proxy.sock"));
        assert!(orchestrator.delete("never-created", &[]).is_ok());
    }
}
