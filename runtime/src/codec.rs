//! Length-prefixed framing for the two proxy sockets.
//!
//! The control socket carries an 8-byte header (4-byte big-endian length,
//! 4 reserved bytes) around a JSON payload. The I/O socket carries a
//! 12-byte header (8-byte big-endian stream sequence, 4-byte big-endian
//! length) around a binary payload. Both use the same retry-on-partial-io
//! discipline, grounded on the original shim's `cc_read`/`cc_write` helpers
//! (`examples/original_source/.../shim/shim.c`).

use std::io::{self, ErrorKind, Read, Write};

use runtime_shared::constants::{
    PROXY_CTL_HEADER_SIZE, PROXY_CTL_MAX_PAYLOAD, PROXY_IO_HEADER_SIZE, PROXY_IO_MAX_PAYLOAD,
};
use runtime_shared::errors::{RuntimeError, RuntimeResult};

/// A decoded control-socket frame: header length plus JSON payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlFrame {
    pub payload: Vec<u8>,
}

/// A decoded I/O-socket frame: stream sequence plus binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoFrame {
    pub seq: u64,
    pub payload: Vec<u8>,
}

/// `length == 12` on the I/O socket marks end-of-stream from the agent.
pub const IO_EOF_MARKER_LEN: u32 = 12;

/// The frame immediately following an EOF marker carries exactly one byte:
/// the workload's exit status. Its `length` field is always 13 on the wire
/// (12 header-equivalent bytes would be ambiguous with the marker itself,
/// so the original protocol bumps it by one).
pub const IO_EXIT_STATUS_LEN: u32 = 13;

fn retry_read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> RuntimeResult<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(RuntimeError::ProxyRpc(
                    "peer closed connection mid-frame".into(),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock => {
                continue;
            }
            Err(e) => return Err(RuntimeError::ProxyRpc(format!("read failed: {e}"))),
        }
    }
    Ok(())
}

fn retry_write_all<W: Write>(w: &mut W, buf: &[u8]) -> RuntimeResult<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match w.write(&buf[sent..]) {
            Ok(0) => {
                return Err(RuntimeError::ProxyRpc(
                    "peer closed connection mid-write".into(),
                ));
            }
            Ok(n) => sent += n,
            Err(e) if e.kind() == ErrorKind::Interrupted || e.kind() == ErrorKind::WouldBlock => {
                continue;
            }
            Err(e) => return Err(RuntimeError::ProxyRpc(format!("write failed: {e}"))),
        }
    }
    Ok(())
}

/// Write one control frame: 4-byte BE length, 4 zero bytes, JSON payload.
pub fn write_ctl_frame<W: Write>(w: &mut W, payload: &[u8]) -> RuntimeResult<()> {
    if payload.len() > PROXY_CTL_MAX_PAYLOAD {
        return Err(RuntimeError::ProxyRpc(format!(
            "control payload too large: {} > {}",
            payload.len(),
            PROXY_CTL_MAX_PAYLOAD
        )));
    }
    let mut frame = Vec::with_capacity(PROXY_CTL_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&[0u8; 4]);
    frame.extend_from_slice(payload);
    retry_write_all(w, &frame)
}

/// Read one control frame, rejecting payloads over the 1024-byte bound.
pub fn read_ctl_frame<R: Read>(r: &mut R) -> RuntimeResult<CtlFrame> {
    let mut header = [0u8; PROXY_CTL_HEADER_SIZE];
    retry_read_exact(r, &mut header)?;
    let len = u32::from_be_bytes(header[0..4].try_into().unwrap()) as usize;
    if len > PROXY_CTL_MAX_PAYLOAD {
        return Err(RuntimeError::ProxyRpc(format!(
            "control frame too large: {len} > {PROXY_CTL_MAX_PAYLOAD}"
        )));
    }
    let mut payload = vec![0u8; len];
    retry_read_exact(r, &mut payload)?;
    Ok(CtlFrame { payload })
}

/// Write one I/O frame: 8-byte BE stream sequence, 4-byte BE length, payload.
pub fn write_io_frame<W: Write>(w: &mut W, seq: u64, payload: &[u8]) -> RuntimeResult<()> {
    if payload.len() > PROXY_IO_MAX_PAYLOAD {
        return Err(RuntimeError::ProxyRpc(format!(
            "io payload too large: {} > {}",
            payload.len(),
            PROXY_IO_MAX_PAYLOAD
        )));
    }
    let mut frame = Vec::with_capacity(PROXY_IO_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    retry_write_all(w, &frame)
}

/// Write the EOF marker frame (`length == 12`, no payload) for `seq`.
pub fn write_io_eof<W: Write>(w: &mut W, seq: u64) -> RuntimeResult<()> {
    let mut frame = Vec::with_capacity(PROXY_IO_HEADER_SIZE);
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&IO_EOF_MARKER_LEN.to_be_bytes());
    retry_write_all(w, &frame)
}

/// Write the trailing exit-status frame (`length == 13`, one payload byte).
pub fn write_io_exit_status<W: Write>(w: &mut W, seq: u64, status: u8) -> RuntimeResult<()> {
    let mut frame = Vec::with_capacity(PROXY_IO_HEADER_SIZE + 1);
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&IO_EXIT_STATUS_LEN.to_be_bytes());
    frame.push(status);
    retry_write_all(w, &frame)
}

/// Outcome of reading one I/O-socket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoFrameEvent {
    Data(IoFrame),
    Eof { seq: u64 },
    ExitStatus { seq: u64, status: u8 },
}

/// Read one I/O frame and classify it per §4.1's EOF encodings.
pub fn read_io_frame<R: Read>(r: &mut R) -> RuntimeResult<IoFrameEvent> {
    let mut header = [0u8; PROXY_IO_HEADER_SIZE];
    retry_read_exact(r, &mut header)?;
    let seq = u64::from_be_bytes(header[0..8].try_into().unwrap());
    let len = u32::from_be_bytes(header[8..12].try_into().unwrap());

    if len == IO_EOF_MARKER_LEN {
        return Ok(IoFrameEvent::Eof { seq });
    }
    if len == IO_EXIT_STATUS_LEN {
        let mut status = [0u8; 1];
        retry_read_exact(r, &mut status)?;
        return Ok(IoFrameEvent::ExitStatus {
            seq,
            status: status[0],
        });
    }
    let len = len as usize;
    if len > PROXY_IO_MAX_PAYLOAD {
        return Err(RuntimeError::ProxyRpc(format!(
            "io frame too large: {len} > {PROXY_IO_MAX_PAYLOAD}"
        )));
    }
    let mut payload = vec![0u8; len];
    retry_read_exact(r, &mut payload)?;
    Ok(IoFrameEvent::Data(IoFrame { seq, payload }))
}

/// Map an I/O error that should be treated as "peer gone" rather than a
/// hard failure, used by the shim's poll loop to decide whether a read of
/// zero bytes on a non-blocking fd means "try again" or "fd is dead".
pub fn is_transient(err: &io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn ctl_frame_round_trips() {
        let payload = br#"{"id":"hello","data":{}}"#;
        let mut buf = Vec::new();
        write_ctl_frame(&mut buf, payload).unwrap();
        assert_eq!(buf.len(), PROXY_CTL_HEADER_SIZE + payload.len());
        assert_eq!(
            u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize,
            payload.len()
        );
        assert_eq!(&buf[4..8], &[0u8; 4]);

        let mut cursor = Cursor::new(buf);
        let frame = read_ctl_frame(&mut cursor).unwrap();
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn ctl_frame_rejects_oversized_payload() {
        let payload = vec![0u8; PROXY_CTL_MAX_PAYLOAD + 1];
        let mut buf = Vec::new();
        assert!(write_ctl_frame(&mut buf, &payload).is_err());
    }

    #[test]
    fn ctl_frame_rejects_oversized_incoming_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&((PROXY_CTL_MAX_PAYLOAD as u32) + 1).to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        let mut cursor = Cursor::new(buf);
        assert!(read_ctl_frame(&mut cursor).is_err());
    }

    #[test]
    fn io_frame_round_trips_and_routes_by_seq() {
        let mut buf = Vec::new();
        write_io_frame(&mut buf, 5, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        match read_io_frame(&mut cursor).unwrap() {
            IoFrameEvent::Data(frame) => {
                assert_eq!(frame.seq, 5);
                assert_eq!(frame.payload, b"hello");
            }
            other => panic!("expected data frame, got {other:?}"),
        }
    }

    #[test]
    fn io_frame_eof_then_exit_status() {
        let mut buf = Vec::new();
        write_io_eof(&mut buf, 3).unwrap();
        write_io_exit_status(&mut buf, 3, 7).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_io_frame(&mut cursor).unwrap(), IoFrameEvent::Eof { seq: 3 });
        assert_eq!(
            read_io_frame(&mut cursor).unwrap(),
            IoFrameEvent::ExitStatus { seq: 3, status: 7 }
        );
    }

    #[test]
    fn io_frame_rejects_oversized_payload() {
        let payload = vec![0u8; PROXY_IO_MAX_PAYLOAD + 1];
        let mut buf = Vec::new();
        assert!(write_io_frame(&mut buf, 0, &payload).is_err());
    }

    #[test]
    fn every_outbound_frame_header_matches_payload_length() {
        for payload in [&b""[..], b"x", b"hello world"] {
            let mut buf = Vec::new();
            write_ctl_frame(&mut buf, payload).unwrap();
            let declared = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
            assert_eq!(declared, payload.len());
            assert_eq!(buf.len(), 8 + payload.len());
        }
    }
}
