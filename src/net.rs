use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{Error, Result};

/// Listen backlog. Small on purpose: the accept loop drains immediately and
/// each session moves to its own worker.
pub const BACKLOG: i32 = 16;

/// Bind an IPv4 listening socket with `SO_REUSEADDR` set and the fixed
/// backlog, then hand it over as a plain std listener.
pub fn listen(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("bad listen address {addr}: {e}")))?;
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(Error::Socket)?;
    socket.set_reuse_address(true).map_err(Error::Socket)?;
    socket.bind(&addr.into()).map_err(Error::Socket)?;
    socket.listen(BACKLOG).map_err(Error::Socket)?;
    Ok(socket.into())
}

/// Connect to a server (client side).
pub fn connect(ip: &str, port: &str) -> Result<TcpStream> {
    let port: u16 = port
        .parse()
        .map_err(|e| Error::Config(format!("bad port {port}: {e}")))?;
    TcpStream::connect((ip, port)).map_err(Error::Socket)
}

/// Read one newline-terminated line with the newline stripped, enforcing
/// `max` as the bound on the raw line. Returns `Ok(None)` on clean EOF
/// before any byte arrived; a line that fills the bound without a newline
/// is a protocol error.
pub fn read_line_bounded<R: BufRead>(reader: &mut R, max: usize) -> Result<Option<String>> {
    let mut raw = Vec::new();
    let n = std::io::Read::take(reader, max as u64).read_until(b'\n', &mut raw)?;
    if n == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    } else if n == max {
        return Err(Error::Protocol(format!("line exceeds {max} bytes")));
    }
    // EOF mid-line falls through: what arrived is the final line
    String::from_utf8(raw)
        .map(Some)
        .map_err(|e| Error::Protocol(format!("line is not valid utf-8: {e}")))
}

/// Forward everything the peer has sent so far into `out`: one blocking
/// fill guarantees at least a byte (or reports EOF as 0), then a
/// non-blocking drain picks up the rest of the burst. The socket is put
/// back into blocking mode on every path.
pub fn drain_available<W: Write>(reader: &mut BufReader<TcpStream>, out: &mut W) -> Result<usize> {
    let mut total = 0;
    let first = {
        let buf = reader.fill_buf().map_err(Error::Io)?;
        if buf.is_empty() {
            return Ok(0);
        }
        out.write_all(buf).map_err(Error::Io)?;
        buf.len()
    };
    reader.consume(first);
    total += first;

    reader.get_ref().set_nonblocking(true).map_err(Error::Io)?;
    let mut drained: io::Result<()> = Ok(());
    loop {
        let n = match reader.fill_buf() {
            Ok(buf) if buf.is_empty() => break,
            Ok(buf) => match out.write_all(buf) {
                Ok(()) => buf.len(),
                Err(e) => {
                    drained = Err(e);
                    break;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                drained = Err(e);
                break;
            }
        };
        reader.consume(n);
        total += n;
    }
    reader.get_ref().set_nonblocking(false).map_err(Error::Io)?;
    drained?;
    out.flush().map_err(Error::Io)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_line_strips_newline() {
        let mut r = Cursor::new(b"hello\nworld\n".to_vec());
        assert_eq!(read_line_bounded(&mut r, 64).unwrap(), Some("hello".to_string()));
        assert_eq!(read_line_bounded(&mut r, 64).unwrap(), Some("world".to_string()));
        assert_eq!(read_line_bounded(&mut r, 64).unwrap(), None);
    }

    #[test]
    fn test_read_line_eof_without_newline() {
        let mut r = Cursor::new(b"partial".to_vec());
        assert_eq!(read_line_bounded(&mut r, 64).unwrap(), Some("partial".to_string()));
    }

    #[test]
    fn test_read_line_overlong_is_protocol_error() {
        let mut r = Cursor::new(vec![b'a'; 128]);
        assert!(matches!(read_line_bounded(&mut r, 16), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_read_line_exactly_at_bound() {
        // 15 bytes + newline fits a bound of 16
        let mut r = Cursor::new(b"aaaaaaaaaaaaaaa\n".to_vec());
        assert_eq!(
            read_line_bounded(&mut r, 16).unwrap(),
            Some("a".repeat(15))
        );
    }

    #[test]
    fn test_drain_available_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut peer = TcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        peer.write_all(b"server> ").unwrap();
        peer.flush().unwrap();

        let mut reader = BufReader::new(accepted);
        let mut out = Vec::new();
        let n = drain_available(&mut reader, &mut out).unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, b"server> ");

        // a second burst still arrives through the same reader
        peer.write_all(b"more\n").unwrap();
        peer.flush().unwrap();
        out.clear();
        drain_available(&mut reader, &mut out).unwrap();
        assert_eq!(out, b"more\n");
    }
}
