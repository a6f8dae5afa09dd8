//! Shim event loop (component F): represents one workload to its parent,
//! multiplexing exactly four file descriptors with `poll` (spec.md §4.6).
//!
//! The argv this binary is `execve`d with (`-c <id> -p <proxy_ctl> -o
//! <proxy_io> -s <io_base> [-e <io_base+1>]`) is constructed by
//! `runtime::shim_launcher` immediately before the call, matching the fd
//! numbers the parent's fork/dup/SCM_RIGHTS dance produced.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::io::BorrowedFd;

use clap::Parser;
use nix::poll::{PollFd, PollFlags, poll};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use nix::unistd::{isatty, read};

use runtime::codec::{IoFrameEvent, read_io_frame, write_io_eof, write_io_frame};
use runtime_shared::constants::UNFORWARDED_SIGNALS;
use runtime_shared::errors::RuntimeResult;
use runtime_shared::{LogFormat, init_logging};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shim event loop for a single workload")]
struct ShimArgs {
    #[arg(short = 'c')]
    container_id: String,
    #[arg(short = 'p')]
    proxy_ctl: RawFd,
    #[arg(short = 'o')]
    proxy_io: RawFd,
    #[arg(short = 's')]
    stdio_stream: u64,
    #[arg(short = 'e')]
    stderr_stream: Option<u64>,
}

const BUFSIZ: usize = 8192;
const LINE_MAX: usize = 2048;

/// Self-pipe for async-signal-safe signal delivery (spec.md §4.6).
static SIGNAL_PIPE_WRITE: std::sync::atomic::AtomicI32 = std::sync::atomic::AtomicI32::new(-1);

extern "C" fn signal_handler(signum: libc::c_int) {
    let fd = SIGNAL_PIPE_WRITE.load(std::sync::atomic::Ordering::Relaxed);
    if fd >= 0 {
        let byte = signum as u8;
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

fn install_signal_handlers(pipe_write: RawFd) -> RuntimeResult<()> {
    SIGNAL_PIPE_WRITE.store(pipe_write, std::sync::atomic::Ordering::Relaxed);
    for signum in 1..=31 {
        if UNFORWARDED_SIGNALS.contains(&signum) {
            continue;
        }
        unsafe {
            libc::signal(signum, signal_handler as usize);
        }
    }
    Ok(())
}

struct TermiosGuard {
    original: Option<Termios>,
}

impl TermiosGuard {
    fn enter_raw_mode() -> Self {
        let stdin_fd = unsafe { BorrowedFd::borrow_raw(0) };
        if !isatty(stdin_fd).unwrap_or(false) {
            let _ = nix::fcntl::fcntl(
                stdin_fd,
                nix::fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK),
            );
            return Self { original: None };
        }
        match termios::tcgetattr(stdin_fd) {
            Ok(original) => {
                let mut raw = original.clone();
                raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG);
                let _ = termios::tcsetattr(stdin_fd, SetArg::TCSANOW, &raw);
                Self { original: Some(original) }
            }
            Err(_) => Self { original: None },
        }
    }

    fn restore(&self) {
        if let Some(original) = &self.original {
            let stdin_fd = unsafe { BorrowedFd::borrow_raw(0) };
            let _ = termios::tcsetattr(stdin_fd, SetArg::TCSANOW, original);
        }
    }
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

fn query_winsize() -> (u16, u16) {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(0, libc::TIOCGWINSZ, &mut ws as *mut libc::winsize) };
    if rc == 0 {
        (ws.ws_row, ws.ws_col)
    } else {
        (0, 0)
    }
}

/// Which stream an inbound I/O-frame's `seq` routes to (spec.md §8's
/// protocol law): stdout iff `seq == stdio_stream`, stderr iff
/// `seq == stdio_stream + 1` (i.e. `stderr_stream`, when one exists),
/// discarded otherwise.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Stdout,
    Stderr,
    Discard,
}

fn route_for(seq: u64, stdio_stream: u64, stderr_stream: u64) -> Route {
    if seq == stdio_stream {
        Route::Stdout
    } else if stderr_stream != 0 && seq == stderr_stream {
        Route::Stderr
    } else {
        Route::Discard
    }
}

/// Handle one byte read from the signal self-pipe (spec.md §4.6 slot 0).
fn handle_signal(
    signum: u8,
    container_id: &str,
    proxy_ctl: &mut std::fs::File,
    winsize_seq: u64,
) -> RuntimeResult<()> {
    use std::io::Write as _;
    let payload = if signum as i32 == libc::SIGWINCH {
        let (row, column) = query_winsize();
        serde_json::to_vec(&serde_json::json!({
            "id": "hyper",
            "data": { "hyperName": "winsize", "data": { "seq": winsize_seq, "row": row, "column": column } },
        }))
    } else {
        serde_json::to_vec(&serde_json::json!({
            "id": "hyper",
            "data": { "hyperName": "killcontainer", "data": { "container": container_id, "signal": signum } },
        }))
    }?;
    runtime::codec::write_ctl_frame(proxy_ctl, &payload)?;
    let _ = proxy_ctl.flush();
    Ok(())
}

fn run(args: ShimArgs) -> RuntimeResult<i32> {
    let (pipe_read, pipe_write) = nix::unistd::pipe2(nix::fcntl::OFlag::O_NONBLOCK | nix::fcntl::OFlag::O_CLOEXEC)
        .map_err(|e| runtime_shared::errors::RuntimeError::Internal(format!("pipe2: {e}")))?;
    install_signal_handlers(pipe_write.as_raw_fd())?;
    std::mem::forget(pipe_write);

    let termios_guard = TermiosGuard::enter_raw_mode();

    let proxy_ctl_owned: OwnedFd = unsafe { OwnedFd::from_raw_fd(args.proxy_ctl) };
    let proxy_io_owned: OwnedFd = unsafe { OwnedFd::from_raw_fd(args.proxy_io) };
    let mut proxy_ctl_file = std::fs::File::from(proxy_ctl_owned);
    let mut proxy_io_file = std::fs::File::from(proxy_io_owned);

    let stderr_stream = args.stderr_stream.unwrap_or(0);
    let mut stdin_open = true;
    let mut exit_code: Option<i32> = None;

    loop {
        let mut fds = vec![
            PollFd::new(unsafe { BorrowedFd::borrow_raw(pipe_read.as_raw_fd()) }, PollFlags::POLLIN | PollFlags::POLLPRI),
            PollFd::new(unsafe { BorrowedFd::borrow_raw(proxy_io_file.as_raw_fd()) }, PollFlags::POLLIN | PollFlags::POLLPRI),
            PollFd::new(unsafe { BorrowedFd::borrow_raw(proxy_ctl_file.as_raw_fd()) }, PollFlags::POLLIN | PollFlags::POLLPRI),
        ];
        if stdin_open {
            fds.push(PollFd::new(unsafe { BorrowedFd::borrow_raw(0) }, PollFlags::POLLIN | PollFlags::POLLPRI));
        }

        let n = poll(&mut fds, nix::poll::PollTimeout::NONE)
            .map_err(|e| runtime_shared::errors::RuntimeError::Internal(format!("poll: {e}")))?;
        if n <= 0 {
            continue;
        }

        if fds[0].revents().map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLPRI)).unwrap_or(false) {
            let mut signum = [0u8; 1];
            if read(unsafe { BorrowedFd::borrow_raw(pipe_read.as_raw_fd()) }, &mut signum).unwrap_or(0) == 1 {
                handle_signal(signum[0], &args.container_id, &mut proxy_ctl_file, args.stdio_stream)?;
            }
        }

        if fds[1].revents().map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLPRI)).unwrap_or(false) {
            match read_io_frame(&mut proxy_io_file)? {
                IoFrameEvent::Data(frame) => {
                    use std::io::Write as _;
                    match route_for(frame.seq, args.stdio_stream, stderr_stream) {
                        Route::Stdout => {
                            let _ = std::io::stdout().write_all(&frame.payload);
                        }
                        Route::Stderr => {
                            let _ = std::io::stderr().write_all(&frame.payload);
                        }
                        Route::Discard => {}
                    }
                }
                IoFrameEvent::Eof { .. } => {}
                IoFrameEvent::ExitStatus { status, .. } => {
                    exit_code = Some(status as i32);
                    break;
                }
            }
        }

        if fds[2].revents().map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLPRI)).unwrap_or(false) {
            let mut buf = [0u8; LINE_MAX];
            match read(unsafe { BorrowedFd::borrow_raw(proxy_ctl_file.as_raw_fd()) }, &mut buf) {
                Ok(0) | Err(_) => {}
                Ok(n) => {
                    tracing::debug!(bytes = n, "proxy control reply");
                }
            }
        }

        if stdin_open {
            if let Some(stdin_fd) = fds.get(3) {
                if stdin_fd.revents().map(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLPRI)).unwrap_or(false) {
                    let mut buf = [0u8; BUFSIZ];
                    match read(unsafe { BorrowedFd::borrow_raw(0) }, &mut buf) {
                        Ok(0) => {
                            stdin_open = false;
                            write_io_eof(&mut proxy_io_file, args.stdio_stream)?;
                        }
                        Ok(n) => {
                            write_io_frame(&mut proxy_io_file, args.stdio_stream, &buf[..n])?;
                        }
                        Err(e) if runtime::codec::is_transient(&std::io::Error::from(e)) => {}
                        Err(_) => {
                            stdin_open = false;
                        }
                    }
                }
            }
        }
    }

    drop(termios_guard);
    Ok(exit_code.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    fn socketpair_files() -> (std::fs::File, std::fs::File) {
        let (a, b) = nix::sys::socket::socketpair(
            nix::sys::socket::AddressFamily::Unix,
            nix::sys::socket::SockType::Stream,
            None,
            nix::sys::socket::SockFlag::empty(),
        )
        .unwrap();
        (std::fs::File::from(a), std::fs::File::from(b))
    }

    fn read_ctl_frame(f: &mut std::fs::File) -> serde_json::Value {
        let mut header = [0u8; 8];
        f.read_exact(&mut header).unwrap();
        let len = u32::from_be_bytes(header[0..4].try_into().unwrap()) as usize;
        let mut body = vec![0u8; len];
        f.read_exact(&mut body).unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn route_for_matches_stdio_stream_to_stdout() {
        assert_eq!(route_for(5, 5, 6), Route::Stdout);
    }

    #[test]
    fn route_for_matches_stdio_stream_plus_one_to_stderr() {
        assert_eq!(route_for(6, 5, 6), Route::Stderr);
    }

    #[test]
    fn route_for_discards_unrelated_seq() {
        assert_eq!(route_for(99, 5, 6), Route::Discard);
    }

    #[test]
    fn route_for_discards_stderr_seq_when_no_stderr_stream_exists() {
        // terminal mode: stderr_stream is 0, meaning "no separate stream".
        assert_eq!(route_for(0, 5, 0), Route::Discard);
    }

    #[test]
    fn sigwinch_forwards_a_hyper_winsize_call() {
        let (mut ours, mut theirs) = socketpair_files();
        handle_signal(libc::SIGWINCH as u8, "c1", &mut ours, 42).unwrap();
        let value = read_ctl_frame(&mut theirs);
        assert_eq!(value["id"], "hyper");
        assert_eq!(value["data"]["hyperName"], "winsize");
        assert_eq!(value["data"]["data"]["seq"], 42);
    }

    #[test]
    fn other_signals_forward_a_hyper_killcontainer_call() {
        let (mut ours, mut theirs) = socketpair_files();
        handle_signal(libc::SIGTERM as u8, "c1", &mut ours, 0).unwrap();
        let value = read_ctl_frame(&mut theirs);
        assert_eq!(value["id"], "hyper");
        assert_eq!(value["data"]["hyperName"], "killcontainer");
        assert_eq!(value["data"]["data"]["container"], "c1");
        assert_eq!(value["data"]["data"]["signal"], libc::SIGTERM);
    }
}

fn main() {
    let args = ShimArgs::parse();
    let _guard = init_logging(None, None, LogFormat::Text, false);

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(error = %e, "shim event loop failed");
            std::process::exit(1);
        }
    }
}
