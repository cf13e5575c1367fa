use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use log::{info, warn};

use crate::config::LINE_MAX;
use crate::error::{Error, Result};
use crate::net::{drain_available, read_line_bounded};

/// End-of-transfer marker. Appended after the payload by whichever side is
/// sending a file and consumed (never stored) by the receiver. Payloads
/// containing this byte pair cannot be carried over the wire; the protocol
/// is only reliable for content without it.
pub const TRANSFER_END: &[u8] = b"\n\0";

/// Chunk size for streaming payload bytes.
pub const CHUNK: usize = 4095;

/// Verb listing sent in response to `help`.
pub const COMMAND_LIST: &str = "put\nget\ndel\nhelp\n";

/// Files created by transfers are private to the owner.
const TRANSFER_MODE: u32 = 0o600;

/// Per-session I/O bundle: buffered reads and raw writes over the same
/// socket. Every read in a session — login lines, command lines, transfer
/// payloads — goes through the one reader so no byte is ever stranded in a
/// second buffer.
pub struct IoCtx {
    pub reader: BufReader<TcpStream>,
    pub writer: TcpStream,
}

impl IoCtx {
    pub fn new(stream: TcpStream) -> io::Result<IoCtx> {
        let writer = stream.try_clone()?;
        Ok(IoCtx {
            reader: BufReader::with_capacity(LINE_MAX, stream),
            writer,
        })
    }

    /// Send bytes verbatim; prompts deliberately carry no trailing newline.
    pub fn send(&mut self, data: &str) -> Result<()> {
        self.writer.write_all(data.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// One line from the peer, newline stripped. EOF before any byte is
    /// `Ok(None)`.
    pub fn try_recv_line(&mut self) -> Result<Option<String>> {
        read_line_bounded(&mut self.reader, LINE_MAX)
    }

    /// Like `try_recv_line`, but mid-dialogue EOF is a protocol error.
    pub fn recv_line(&mut self) -> Result<String> {
        match self.try_recv_line()? {
            Some(line) => Ok(line),
            None => Err(Error::Protocol("peer closed the connection".to_string())),
        }
    }
}

/// Stream `src` into `dst` in `CHUNK`-sized slices, then append the
/// end-of-transfer marker. Returns the payload byte count.
pub fn send_payload<R: Read, W: Write>(src: &mut R, dst: &mut W) -> Result<u64> {
    let mut buf = [0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
    dst.write_all(TRANSFER_END)?;
    dst.flush()?;
    Ok(total)
}

/// Copy payload bytes from `src` into `dst` up to the end-of-transfer
/// marker, which is consumed but not written. The marker may arrive split
/// across reads; a stream that ends before it is a protocol error.
/// Returns the payload byte count.
pub fn recv_payload<R: BufRead, W: Write>(src: &mut R, dst: &mut W) -> Result<u64> {
    let mut total = 0u64;
    // A trailing '\n' is held back until the next byte decides whether it
    // was payload or the start of the marker.
    let mut held_newline = false;
    loop {
        let (consumed, out, done) = {
            let buf = src.fill_buf()?;
            if buf.is_empty() {
                return Err(Error::Protocol(
                    "transfer ended before the end marker".to_string(),
                ));
            }
            let mut out: Vec<u8> = Vec::with_capacity(buf.len());
            let mut i = 0;
            let mut done = false;
            while i < buf.len() {
                let b = buf[i];
                if held_newline {
                    if b == 0 {
                        i += 1;
                        done = true;
                        break;
                    }
                    out.push(b'\n');
                    held_newline = false;
                    continue; // reconsider b as an ordinary byte
                }
                if b == b'\n' {
                    held_newline = true;
                } else {
                    out.push(b);
                }
                i += 1;
            }
            (i, out, done)
        };
        dst.write_all(&out)?;
        total += out.len() as u64;
        src.consume(consumed);
        if done {
            dst.flush()?;
            return Ok(total);
        }
    }
}

// ---------------------------------------------------------------------------
// server side
// ---------------------------------------------------------------------------

/// `get`: prompt for a filename, stream that file to the client, then wait
/// for the client's save confirmation line. A file that cannot be opened
/// ends the session; the server itself keeps running.
pub fn server_get(io: &mut IoCtx, client_id: u64) -> Result<()> {
    io.send("filename: ")?;
    let name = io.recv_line()?;
    let mut file = File::open(&name)?;
    let sent = send_payload(&mut file, &mut io.writer)?;
    info!("::client {} got {} ({} bytes)", client_id, name, sent);
    io.recv_line()?;
    Ok(())
}

/// `put`: prompt for a filename, create or truncate it owner-only, then
/// receive the payload up to the end marker.
pub fn server_put(io: &mut IoCtx, client_id: u64) -> Result<()> {
    io.send("filename: ")?;
    let name = io.recv_line()?;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(TRANSFER_MODE)
        .open(&name)?;
    let received = recv_payload(&mut io.reader, &mut file)?;
    info!("::client {} put {} ({} bytes)", client_id, name, received);
    Ok(())
}

/// `del`: prompt for a filename and remove it. A miss is logged, not fatal:
/// deleting a file that is already gone should not cost the session.
pub fn server_del(io: &mut IoCtx, client_id: u64) -> Result<()> {
    io.send("filename: ")?;
    let name = io.recv_line()?;
    match fs::remove_file(&name) {
        Ok(()) => info!("::client {} deleted {}", client_id, name),
        Err(e) => warn!("::client {} delete {} failed: {}", client_id, name, e),
    }
    Ok(())
}

/// `help`: transmit the verb listing.
pub fn server_help(io: &mut IoCtx) -> Result<()> {
    io.send(COMMAND_LIST)
}

// ---------------------------------------------------------------------------
// client side
// ---------------------------------------------------------------------------

fn read_user_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

/// Echo the server's `filename: ` prompt, then forward the user's answer.
/// Returns the filename as typed.
fn filename_roundtrip<R: BufRead, W: Write>(
    io: &mut IoCtx,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    drain_available(&mut io.reader, output)?;
    let name = match read_user_line(input)? {
        Some(name) => name,
        None => return Err(Error::Protocol("stdin closed mid-transfer".to_string())),
    };
    io.send(&format!("{name}\n"))?;
    Ok(name)
}

/// Client half of `get`: answer the filename prompt, save the payload to
/// `<name>.newsave` so an existing local file is never clobbered, then send
/// the confirmation newline the server is waiting on.
pub fn client_get<R: BufRead, W: Write>(io: &mut IoCtx, input: &mut R, output: &mut W) -> Result<()> {
    let name = filename_roundtrip(io, input, output)?;
    let savename = format!("{name}.newsave");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(TRANSFER_MODE)
        .open(&savename)?;
    let received = recv_payload(&mut io.reader, &mut file)?;
    io.send("\n")?;
    writeln!(output, "saved {received} bytes to {savename}").map_err(Error::Io)?;
    Ok(())
}

/// Client half of `put`: answer the filename prompt, then stream the local
/// file. The local path is resolved against `$PWD` (falling back to the
/// process working directory); the server receives the name as typed.
pub fn client_put<R: BufRead, W: Write>(io: &mut IoCtx, input: &mut R, output: &mut W) -> Result<()> {
    let name = filename_roundtrip(io, input, output)?;
    let local = resolve_local(&name)?;
    let mut file = File::open(&local)?;
    let sent = send_payload(&mut file, &mut io.writer)?;
    writeln!(output, "sent {} bytes from {}", sent, local.display()).map_err(Error::Io)?;
    Ok(())
}

/// Client half of `del`: just the filename dialogue.
pub fn client_del<R: BufRead, W: Write>(io: &mut IoCtx, input: &mut R, output: &mut W) -> Result<()> {
    filename_roundtrip(io, input, output)?;
    Ok(())
}

fn resolve_local(name: &str) -> Result<PathBuf> {
    let name = PathBuf::from(name);
    if name.is_absolute() {
        return Ok(name);
    }
    let cwd = match env::var_os("PWD") {
        Some(dir) => PathBuf::from(dir),
        None => env::current_dir()?,
    };
    Ok(cwd.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn recv(bytes: &[u8]) -> Result<Vec<u8>> {
        let mut src = Cursor::new(bytes.to_vec());
        let mut dst = Vec::new();
        recv_payload(&mut src, &mut dst).map(|_| dst)
    }

    #[test]
    fn test_send_appends_marker() {
        let mut src = Cursor::new(b"hello world".to_vec());
        let mut dst = Vec::new();
        let n = send_payload(&mut src, &mut dst).unwrap();
        assert_eq!(n, 11);
        assert_eq!(dst, b"hello world\n\0");
    }

    #[test]
    fn test_recv_strips_marker() {
        assert_eq!(recv(b"hello world\n\0").unwrap(), b"hello world");
    }

    #[test]
    fn test_recv_keeps_interior_newlines() {
        assert_eq!(recv(b"a\nb\nc\n\n\0").unwrap(), b"a\nb\nc\n");
    }

    #[test]
    fn test_recv_marker_split_across_reads() {
        // BufReader with a tiny buffer forces the pair onto separate fills
        let data = b"payload ends here\n\0".to_vec();
        let mut src = BufReader::with_capacity(4, Cursor::new(data));
        let mut dst = Vec::new();
        recv_payload(&mut src, &mut dst).unwrap();
        assert_eq!(dst, b"payload ends here");
    }

    #[test]
    fn test_recv_truncated_stream_is_protocol_error() {
        assert!(matches!(recv(b"no marker here"), Err(Error::Protocol(_))));
        assert!(matches!(recv(b"ends on newline\n"), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_round_trip_marker_free_payload() {
        // bytes covering every value except an embedded "\n\0" pair
        let mut payload = Vec::new();
        for i in 0u8..=255 {
            if i != 0 {
                payload.push(i);
            }
        }
        payload.extend_from_slice(b"tail with spaces and \ttabs\n");
        let mut wire = Vec::new();
        send_payload(&mut Cursor::new(payload.clone()), &mut wire).unwrap();
        assert_eq!(recv(&wire).unwrap(), payload);
    }

    #[test]
    fn test_round_trip_large_payload() {
        let payload: Vec<u8> = (0..20_000).map(|i| (i % 251 + 1) as u8).collect();
        let mut wire = Vec::new();
        let sent = send_payload(&mut Cursor::new(payload.clone()), &mut wire).unwrap();
        assert_eq!(sent, payload.len() as u64);
        assert_eq!(recv(&wire).unwrap(), payload);
    }

    #[test]
    fn test_empty_payload_round_trips() {
        let mut wire = Vec::new();
        send_payload(&mut Cursor::new(Vec::new()), &mut wire).unwrap();
        assert_eq!(wire, TRANSFER_END);
        assert!(recv(&wire).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_local_absolute_untouched() {
        let p = resolve_local("/etc/hosts").unwrap();
        assert_eq!(p, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_resolve_local_relative_joins_cwd() {
        let p = resolve_local("notes.txt").unwrap();
        assert!(p.is_absolute());
        assert!(p.ends_with("notes.txt"));
    }
}
