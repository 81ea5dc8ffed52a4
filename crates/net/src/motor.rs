//! Unidirectional datagram sink for the motor controller: one byte per
//! frame, either a quantized heading or a reserved stop code.

use std::os::unix::net::UnixDatagram;
use std::path::Path;

/// Wraps the motor control socket. Connectionless: each send is a single
/// one-byte datagram.
pub struct MotorSink {
    socket: UnixDatagram,
}

impl MotorSink {
    /// Binds an unnamed local socket and connects it to `socket_path`, the
    /// motor controller's listening path.
    pub fn connect(socket_path: impl AsRef<Path>) -> crate::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(socket_path)?;
        Ok(Self { socket })
    }

    /// Sends a single payload byte. Transient send failures (e.g. the
    /// controller isn't listening yet) are the caller's concern to log and
    /// continue past; this just reports them.
    pub fn send_byte(&self, byte: u8) -> crate::Result<()> {
        self.socket.send(&[byte])?;
        Ok(())
    }
}
