//! Non-blocking datagram source for incoming route updates:
//! `[N: uint8][N action bytes]` replacing the pending route wholesale.

use std::os::unix::net::UnixDatagram;
use std::path::Path;

const MAX_DATAGRAM: usize = 256;

/// Wraps the route-input socket in non-blocking mode so the main loop can
/// poll it once per frame without stalling the pipeline.
pub struct RouteSource {
    socket: UnixDatagram,
}

impl RouteSource {
    /// Removes any stale socket file at `socket_path` and binds fresh.
    pub fn bind(socket_path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = socket_path.as_ref();
        let _ = std::fs::remove_file(path);
        let socket = UnixDatagram::bind(path)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    /// Polls for a pending datagram. Returns `Ok(None)` when nothing has
    /// arrived (`WouldBlock`), `Ok(Some(actions))` with the decoded action
    /// bytes (length prefix stripped) on success.
    pub fn try_recv(&self) -> crate::Result<Option<Vec<u8>>> {
        let mut buf = [0u8; MAX_DATAGRAM];
        match self.socket.recv(&mut buf) {
            Ok(n) if n == 0 => Ok(None),
            Ok(n) => {
                let declared = buf[0] as usize;
                let actual = n - 1;
                if declared != actual {
                    return Err(crate::Error::RouteDatagramLength { declared, actual });
                }
                Ok(Some(buf[1..n].to_vec()))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixDatagram;

    #[test]
    fn returns_none_when_nothing_has_arrived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.sock");

        let source = RouteSource::bind(&path).unwrap();
        assert!(source.try_recv().unwrap().is_none());
    }

    #[test]
    fn well_formed_datagram_strips_the_length_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.sock");

        let source = RouteSource::bind(&path).unwrap();
        let client = UnixDatagram::unbound().unwrap();
        client.connect(&path).unwrap();
        client.send(&[2, b'V', b'H']).unwrap();

        assert_eq!(source.try_recv().unwrap(), Some(vec![b'V', b'H']));
    }

    #[test]
    fn mismatched_length_prefix_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.sock");

        let source = RouteSource::bind(&path).unwrap();
        let client = UnixDatagram::unbound().unwrap();
        client.connect(&path).unwrap();
        client.send(&[3, b'V', b'H']).unwrap();

        let err = source.try_recv().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::RouteDatagramLength { declared: 3, actual: 2 }
        ));
    }

    #[test]
    fn binding_over_a_stale_socket_file_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.sock");

        let _first = RouteSource::bind(&path).unwrap();
        let second = RouteSource::bind(&path).unwrap();
        assert!(second.try_recv().unwrap().is_none());
    }
}
