//! Shim launcher (component D): forks a shim, hands it the proxy control
//! fd, the allocated I/O fd and the `.shim-flock` fd, and for the initial
//! workload parks it under `PTRACE` until `start` resumes it.
//!
//! Grounded on `spec.md` §4.4 for the exact handshake, and on the
//! low-level fork/exec style of
//! `examples/uran0sH-boxlite/boxlite/src/jailer/pre_exec.rs` (async-signal-
//! safe-only operations between fork and exec) — generalized from
//! `Command::pre_exec` to a raw `fork()` because the child must compute its
//! own argv (the post-dup fd numbers) before it can call `execve`, which a
//! fixed-argv `Command` cannot express.

use std::ffi::CString;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::Path;

use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::ptrace;
use nix::sys::signal::{Signal, kill};
use nix::sys::socket::{
    AddressFamily, ControlMessage, ControlMessageOwned, MsgFlags, SockFlag, SockType, UnixAddr,
    recvmsg, sendmsg, socketpair,
};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, close, fork, pipe2, read, write};
use std::io::{IoSlice, IoSliceMut};

use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Parameters needed to fork and exec one shim process.
pub struct ShimLaunchOptions<'a> {
    pub shim_binary: &'a Path,
    pub container_id: &'a str,
    /// Proxy control socket fd, already connected and open (not CLOEXEC) so
    /// it survives the fork with the same fd number in parent and child.
    pub proxy_ctl_fd: RawFd,
    /// The I/O fd `allocateIO` returned out-of-band; transferred to the
    /// child over `shim_sock`.
    pub io_fd: OwnedFd,
    pub io_base: u64,
    /// `.shim-flock` fd, open (not CLOEXEC) so it survives the fork.
    pub flock_fd: RawFd,
    pub console_path: Option<&'a Path>,
    pub terminal: bool,
    /// `true` for the container's first workload: acquire the flock and
    /// park under `PTRACE` until `start`. `false` for `exec`: launch
    /// immediately, no parking.
    pub initial: bool,
}

/// Fork, hand off fds over `arg_pipe`/`shim_sock`, and (for `initial`)
/// leave the shim parked with `SIGSTOP` after its in-`execve` `SIGTRAP`
/// stop. Returns the shim's pid.
pub fn launch(opts: ShimLaunchOptions<'_>) -> RuntimeResult<Pid> {
    let (arg_read, arg_write) =
        pipe2(nix::fcntl::OFlag::O_CLOEXEC).map_err(|e| RuntimeError::ShimSetup(format!("pipe2(arg_pipe): {e}")))?;
    let (err_read, err_write) =
        pipe2(nix::fcntl::OFlag::O_CLOEXEC).map_err(|e| RuntimeError::ShimSetup(format!("pipe2(err_pipe): {e}")))?;
    let (sock_parent, sock_child) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .map_err(|e| RuntimeError::ShimSetup(format!("socketpair(shim_sock): {e}")))?;

    let io_fd_raw = opts.io_fd.as_raw_fd();

    match unsafe { fork() }.map_err(|e| RuntimeError::ShimSetup(format!("fork: {e}")))? {
        ForkResult::Parent { child } => {
            drop(arg_read);
            drop(err_write);
            drop(sock_child);

            let handoff = parent_handoff(
                arg_write.as_raw_fd(),
                sock_parent.as_raw_fd(),
                opts.proxy_ctl_fd,
                io_fd_raw,
                opts.io_base,
            );
            drop(arg_write);
            drop(sock_parent);
            handoff?;

            let mut errbyte = [0u8; 1];
            let n = read(&err_read, &mut errbyte)
                .map_err(|e| RuntimeError::ShimSetup(format!("read(err_pipe): {e}")))?;
            if n != 0 {
                let _ = kill(child, Signal::SIGKILL);
                return Err(RuntimeError::ShimSetup(format!(
                    "shim {} failed setup before execve",
                    opts.container_id
                )));
            }

            if opts.initial {
                park_initial_shim(child)?;
            }

            Ok(child)
        }
        ForkResult::Child => {
            drop(arg_write);
            drop(err_read);
            drop(sock_parent);

            match run_child(&opts, arg_read.as_raw_fd(), sock_child.as_raw_fd()) {
                Ok(never) => match never {},
                Err(_) => {
                    let _ = write(unsafe { std::os::fd::BorrowedFd::borrow_raw(err_write.as_raw_fd()) }, &[1u8]);
                    std::process::exit(127);
                }
            }
        }
    }
}

/// Parent-side handoff: write the proxy fd and `ioBase` to `arg_pipe`, then
/// send the allocated I/O fd as ancillary data on `shim_sock`.
fn parent_handoff(
    arg_write: RawFd,
    sock_parent: RawFd,
    proxy_ctl_fd: RawFd,
    io_fd: RawFd,
    io_base: u64,
) -> RuntimeResult<()> {
    let arg_write_fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(arg_write) };
    write(arg_write_fd, &proxy_ctl_fd.to_ne_bytes())
        .map_err(|e| RuntimeError::ShimSetup(format!("write proxy fd to arg_pipe: {e}")))?;
    write(arg_write_fd, &io_base.to_ne_bytes())
        .map_err(|e| RuntimeError::ShimSetup(format!("write ioBase to arg_pipe: {e}")))?;

    let iov = [IoSlice::new(b"F")];
    let fds = [io_fd];
    let cmsg = [ControlMessage::ScmRights(&fds)];
    sendmsg::<UnixAddr>(sock_parent, &iov, &cmsg, MsgFlags::empty(), None)
        .map_err(|e| RuntimeError::ShimSetup(format!("sendmsg(shim_sock, io fd): {e}")))?;
    Ok(())
}

/// Wait for the shim's `PTRACE_TRACEME` + `execve` `SIGTRAP` stop, then
/// detach it with `SIGSTOP` so it stays parked until `start` sends
/// `SIGCONT` (spec.md §4.4).
fn park_initial_shim(child: Pid) -> RuntimeResult<()> {
    match waitpid(child, Some(WaitPidFlag::empty()))
        .map_err(|e| RuntimeError::ShimSetup(format!("waitpid(shim ptrace stop): {e}")))?
    {
        WaitStatus::Stopped(pid, Signal::SIGTRAP) if pid == child => {}
        other => {
            return Err(RuntimeError::ShimSetup(format!(
                "expected SIGTRAP ptrace stop for shim, got {other:?}"
            )));
        }
    }
    ptrace::detach(child, Some(Signal::SIGSTOP))
        .map_err(|e| RuntimeError::ShimSetup(format!("ptrace detach with SIGSTOP: {e}")))?;
    Ok(())
}

/// Child-side setup (spec.md §4.4, steps 1-8). Returns `Err` only if setup
/// fails before `execve`; on success `execve` replaces the process image
/// and this function never returns, hence the uninhabited `Ok` type.
fn run_child(opts: &ShimLaunchOptions<'_>, arg_read: RawFd, sock_child: RawFd) -> std::io::Result<std::convert::Infallible> {
    let mut proxy_ctl_buf = [0u8; std::mem::size_of::<RawFd>()];
    read_exact_fd(arg_read, &mut proxy_ctl_buf)?;
    let proxy_ctl = RawFd::from_ne_bytes(proxy_ctl_buf);

    let mut io_base_buf = [0u8; std::mem::size_of::<u64>()];
    read_exact_fd(arg_read, &mut io_base_buf)?;
    let io_base = u64::from_ne_bytes(io_base_buf);

    let proxy_io = recv_one_fd(sock_child)?;

    let proxy_ctl = ensure_fd_at_least_3(proxy_ctl)?;
    let proxy_io = ensure_fd_at_least_3(proxy_io)?;
    let flock_fd = ensure_fd_at_least_3(opts.flock_fd)?;
    clear_cloexec(proxy_ctl)?;
    clear_cloexec(proxy_io)?;
    clear_cloexec(flock_fd)?;

    if opts.terminal {
        if let Some(console_path) = opts.console_path {
            setup_controlling_console(console_path)?;
        }
    }

    close_fds_except(&[proxy_ctl, proxy_io, flock_fd]);

    if opts.initial {
        crate::flock::lock_exclusive(flock_fd).map_err(to_io_error)?;
        ptrace::traceme().map_err(to_nix_io_error)?;
    }

    let program = CString::new(opts.shim_binary.as_os_str().as_encoded_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let c_flag = CString::new("-c").unwrap();
    let id_arg = CString::new(opts.container_id).unwrap();
    let p_flag = CString::new("-p").unwrap();
    let p_arg = CString::new(proxy_ctl.to_string()).unwrap();
    let o_flag = CString::new("-o").unwrap();
    let o_arg = CString::new(proxy_io.to_string()).unwrap();
    let s_flag = CString::new("-s").unwrap();
    let s_arg = CString::new(io_base.to_string()).unwrap();
    let e_flag = CString::new("-e").unwrap();
    let e_arg = CString::new((io_base + 1).to_string()).unwrap();

    let mut argv: Vec<&std::ffi::CStr> = vec![
        &program, &c_flag, &id_arg, &p_flag, &p_arg, &o_flag, &o_arg, &s_flag, &s_arg,
    ];
    if !opts.terminal {
        argv.push(&e_flag);
        argv.push(&e_arg);
    }

    nix::unistd::execv(&program, &argv).map_err(to_nix_io_error)?;
    unreachable!("execv only returns on error")
}

fn read_exact_fd(fd: RawFd, buf: &mut [u8]) -> std::io::Result<()> {
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let mut filled = 0;
    while filled < buf.len() {
        let n = read(borrowed, &mut buf[filled..]).map_err(to_nix_io_error)?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
        }
        filled += n;
    }
    Ok(())
}

fn recv_one_fd(sock: RawFd) -> std::io::Result<RawFd> {
    let mut buf = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut buf)];
    let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);
    let msg = recvmsg::<UnixAddr>(sock, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())
        .map_err(to_nix_io_error)?;
    for cmsg in msg.cmsgs().map_err(to_nix_io_error)? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&fd) = fds.first() {
                return Ok(fd);
            }
        }
    }
    Err(std::io::Error::other("no fd received on shim_sock"))
}

fn ensure_fd_at_least_3(fd: RawFd) -> std::io::Result<RawFd> {
    if fd >= 3 {
        return Ok(fd);
    }
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    let new_fd = nix::unistd::dup(borrowed).map_err(to_nix_io_error)?;
    Ok(new_fd.into_raw_fd())
}

fn clear_cloexec(fd: RawFd) -> std::io::Result<()> {
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) };
    fcntl(borrowed, FcntlArg::F_SETFD(FdFlag::empty())).map_err(to_nix_io_error)?;
    Ok(())
}

fn setup_controlling_console(console_path: &Path) -> std::io::Result<()> {
    let path = CString::new(console_path.as_os_str().as_encoded_bytes())
        .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let console_fd = unsafe { libc::open(path.as_ptr(), libc::O_RDWR) };
    if console_fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    nix::unistd::dup2_stdin(unsafe { std::os::fd::BorrowedFd::borrow_raw(console_fd) })
        .map_err(to_nix_io_error)?;
    nix::unistd::dup2_stdout(unsafe { std::os::fd::BorrowedFd::borrow_raw(console_fd) })
        .map_err(to_nix_io_error)?;
    nix::unistd::dup2_stderr(unsafe { std::os::fd::BorrowedFd::borrow_raw(console_fd) })
        .map_err(to_nix_io_error)?;
    if unsafe { libc::ioctl(0, libc::TIOCSCTTY as _, 0) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    if console_fd > 2 {
        unsafe {
            libc::close(console_fd);
        }
    }
    Ok(())
}

/// Close every fd ≥ 3 not in `keep` (spec.md §4.4 step 6). Prefers
/// `close_range(2)` where available, which is atomic with respect to
/// concurrently-opened descriptors (see the Open Question decision in
/// `DESIGN.md`); falls back to scanning `/proc/self/fd`.
fn close_fds_except(keep: &[RawFd]) {
    #[cfg(target_os = "linux")]
    {
        if try_close_range_except(keep) {
            return;
        }
    }
    scan_proc_self_fd_except(keep);
}

#[cfg(target_os = "linux")]
fn try_close_range_except(keep: &[RawFd]) -> bool {
    let Ok(entries) = std::fs::read_dir("/proc/self/fd") else {
        return false;
    };
    let mut max_fd = 3;
    for entry in entries.flatten() {
        if let Some(n) = entry.file_name().to_str().and_then(|s| s.parse::<RawFd>().ok()) {
            max_fd = max_fd.max(n);
        }
    }
    // close_range(3, max_fd, 0) would also close fds we want to keep, so
    // close in segments around them instead.
    let mut sorted_keep: Vec<RawFd> = keep.to_vec();
    sorted_keep.sort_unstable();
    let mut from = 3u32;
    for &k in &sorted_keep {
        if k >= 3 && (from as RawFd) < k {
            unsafe {
                libc::syscall(libc::SYS_close_range, from, (k - 1) as u32, 0);
            }
        }
        from = (k + 1).max(from as RawFd) as u32;
    }
    if (from as RawFd) <= max_fd {
        unsafe {
            libc::syscall(libc::SYS_close_range, from, max_fd as u32, 0);
        }
    }
    true
}

fn scan_proc_self_fd_except(keep: &[RawFd]) {
    let Ok(entries) = std::fs::read_dir("/proc/self/fd") else {
        return;
    };
    for entry in entries.flatten() {
        let Some(fd) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<RawFd>().ok())
        else {
            continue;
        };
        if fd >= 3 && !keep.contains(&fd) {
            let _ = close(unsafe { std::os::fd::OwnedFd::from_raw_fd(fd) });
        }
    }
}

fn to_io_error(e: RuntimeError) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

fn to_nix_io_error(e: nix::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_fd_at_least_3_leaves_high_fds_alone() {
        let tmp = tempfile::tempfile().unwrap();
        let fd = tmp.as_raw_fd();
        if fd >= 3 {
            assert_eq!(ensure_fd_at_least_3(fd).unwrap(), fd);
        }
    }
}
