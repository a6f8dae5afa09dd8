//! Proxy client (component B): connects to the proxy's control socket,
//! exchanges `hello`/`attach`/`bye`/`allocateIO`/`hyper` commands framed by
//! [`crate::codec`], and receives the out-of-band I/O fd `allocateIO`
//! transfers via `SCM_RIGHTS`.
//!
//! Grounded on the teacher's SCM_RIGHTS receiver
//! (`examples/uran0sH-boxlite/guest/src/container/console_socket.rs`) for
//! the ancillary-fd dance, and on `spec.md` §4.2 for the command
//! vocabulary and the readiness rendezvous.

use std::io::IoSliceMut;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use nix::sys::socket::{ControlMessageOwned, MsgFlags, UnixAddr, recvmsg};
use notify::{RecursiveMode, Watcher};
use serde_json::{Value, json};

use crate::codec::{read_ctl_frame, write_ctl_frame};
use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// Block until `path` exists, using a stat-first-then-watch strategy
/// (spec.md §4.2's readiness rendezvous): stat once, and only fall back to
/// installing a directory watch if it is not there yet.
pub fn wait_for_path(path: &Path) -> RuntimeResult<()> {
    if path.exists() {
        return Ok(());
    }
    let dir = path.parent().ok_or_else(|| {
        RuntimeError::Internal(format!("path {} has no parent directory", path.display()))
    })?;
    std::fs::create_dir_all(dir).map_err(|e| RuntimeError::io(dir, e))?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .map_err(|e| RuntimeError::Internal(format!("failed to create file watcher: {e}")))?;
    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| RuntimeError::Internal(format!("failed to watch {}: {e}", dir.display())))?;

    if path.exists() {
        return Ok(());
    }
    loop {
        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(_)) => {
                if path.exists() {
                    return Ok(());
                }
            }
            Ok(Err(e)) => {
                return Err(RuntimeError::Internal(format!("file watch error: {e}")));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if path.exists() {
                    return Ok(());
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(RuntimeError::Internal(
                    "file watcher channel disconnected".into(),
                ));
            }
        }
    }
}

/// A live connection to the proxy's control socket for one VM.
pub struct ProxyClient {
    stream: UnixStream,
}

#[derive(Debug, serde::Deserialize)]
struct ProxyReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Value,
}

impl ProxyClient {
    pub fn connect(socket_path: &Path) -> RuntimeResult<Self> {
        let stream = UnixStream::connect(socket_path)
            .map_err(|e| RuntimeError::ProxyRpc(format!("connect {}: {e}", socket_path.display())))?;
        Ok(Self { stream })
    }

    fn call(&mut self, id: &str, data: Value) -> RuntimeResult<Value> {
        let payload = serde_json::to_vec(&json!({ "id": id, "data": data }))?;
        write_ctl_frame(&mut self.stream, &payload)?;
        let frame = read_ctl_frame(&mut self.stream)?;
        let reply: ProxyReply = serde_json::from_slice(&frame.payload)?;
        if !reply.success {
            return Err(RuntimeError::ProxyRpc(
                reply.error.unwrap_or_else(|| format!("{id} failed with no error message")),
            ));
        }
        Ok(reply.data)
    }

    /// `hello` must not be sent until the agent control socket exists;
    /// callers are expected to have already run [`wait_for_path`].
    pub fn hello(
        &mut self,
        container_id: &str,
        ctl_serial: &str,
        io_serial: &str,
        console: &str,
    ) -> RuntimeResult<()> {
        self.call(
            "hello",
            json!({
                "containerId": container_id,
                "ctlSerial": ctl_serial,
                "ioSerial": io_serial,
                "console": console,
            }),
        )?;
        Ok(())
    }

    pub fn attach(&mut self, container_id: &str) -> RuntimeResult<()> {
        self.call("attach", json!({ "containerId": container_id }))?;
        Ok(())
    }

    pub fn bye(&mut self, container_id: &str) -> RuntimeResult<()> {
        self.call("bye", json!({ "containerId": container_id }))?;
        Ok(())
    }

    /// Allocate `n_streams` I/O streams, returning the base stream sequence
    /// and the out-of-band fd the shim will poll for agent I/O.
    pub fn allocate_io(&mut self, n_streams: u32) -> RuntimeResult<(u64, OwnedFd)> {
        let data = self.call("allocateIO", json!({ "nStreams": n_streams }))?;
        let io_base = data
            .get("ioBase")
            .and_then(Value::as_u64)
            .ok_or_else(|| RuntimeError::ProxyRpc("allocateIO reply missing ioBase".into()))?;
        let fd = self.recv_fd()?;
        Ok((io_base, fd))
    }

    fn recv_fd(&mut self) -> RuntimeResult<OwnedFd> {
        let raw: RawFd = self.stream.as_raw_fd();
        let mut buf = [0u8; 1];
        let mut iov = [IoSliceMut::new(&mut buf)];
        let mut cmsg_space = nix::cmsg_space!([RawFd; 1]);

        let msg = recvmsg::<UnixAddr>(raw, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())
            .map_err(|e| RuntimeError::ProxyRpc(format!("recvmsg for allocateIO fd failed: {e}")))?;

        let mut received_fd = None;
        for cmsg in msg.cmsgs().map_err(|e| RuntimeError::ProxyRpc(format!("cmsg decode failed: {e}")))? {
            if let ControlMessageOwned::ScmRights(fds) = cmsg {
                if let Some(&fd) = fds.first() {
                    received_fd = Some(fd);
                    break;
                }
            }
        }

        if buf[0] != b'F' {
            return Err(RuntimeError::ProxyRpc(format!(
                "expected 'F' marker byte ahead of allocateIO fd, got {:#x}",
                buf[0]
            )));
        }

        if let Some(fd) = received_fd {
            return Ok(unsafe { OwnedFd::from_raw_fd(fd) });
        }
        Err(RuntimeError::ProxyRpc(
            "allocateIO response carried no SCM_RIGHTS fd".into(),
        ))
    }

    /// Pass a command through to the in-VM agent (`startpod`, `newcontainer`,
    /// `execcmd`, `killcontainer`, `destroypod`, `winsize`, ...).
    pub fn hyper(&mut self, hyper_name: &str, data: Value) -> RuntimeResult<Value> {
        self.call("hyper", json!({ "hyperName": hyper_name, "data": data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::net::UnixListener;

    #[test]
    fn wait_for_path_returns_immediately_if_present() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("already-there");
        std::fs::write(&path, b"x").unwrap();
        wait_for_path(&path).unwrap();
    }

    #[test]
    fn call_round_trips_success_reply() {
        let tmp = tempfile::tempdir().unwrap();
        let sock_path = tmp.path().join("proxy.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let frame = read_ctl_frame(&mut server).unwrap();
            let req: Value = serde_json::from_slice(&frame.payload).unwrap();
            assert_eq!(req["id"], "attach");
            let reply = serde_json::to_vec(&json!({"success": true, "data": {}})).unwrap();
            write_ctl_frame(&mut server, &reply).unwrap();
        });

        let mut client = ProxyClient::connect(&sock_path).unwrap();
        client.attach("c1").unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn call_propagates_proxy_error() {
        let tmp = tempfile::tempdir().unwrap();
        let sock_path = tmp.path().join("proxy.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let _frame = read_ctl_frame(&mut server).unwrap();
            let reply =
                serde_json::to_vec(&json!({"success": false, "error": "no such container"})).unwrap();
            write_ctl_frame(&mut server, &reply).unwrap();
        });

        let mut client = ProxyClient::connect(&sock_path).unwrap();
        let err = client.bye("c1").unwrap_err();
        assert!(err.to_string().contains("no such container"));
        handle.join().unwrap();
    }

    #[test]
    fn recv_fd_rejects_non_f_marker_byte() {
        let tmp = tempfile::tempdir().unwrap();
        let sock_path = tmp.path().join("proxy.sock");
        let listener = UnixListener::bind(&sock_path).unwrap();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            server.write_all(b"X").unwrap();
        });

        let mut client = ProxyClient::connect(&sock_path).unwrap();
        let err = client.recv_fd().unwrap_err();
        assert!(err.to_string().contains("marker"));
        handle.join().unwrap();
    }
}
