//! TCP frame streamer: an accept thread and a send thread sharing two
//! mutex-protected slots, exactly as laid out in the concurrency model —
//! at most one connected client, and only the newest pushed frame is ever
//! sent.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use byteorder::{BigEndian, WriteBytesExt};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SEND_IDLE_SLEEP: Duration = Duration::from_millis(2);

/// Owns the accept and send threads for one streaming session. Dropping
/// this without calling [`FrameStreamer::stop`] leaves the threads
/// running; `stop` is the normal shutdown path.
pub struct FrameStreamer {
    frame_slot: Arc<Mutex<Option<Vec<u8>>>>,
    client_slot: Arc<Mutex<Option<TcpStream>>>,
    stop_flag: Arc<AtomicBool>,
    accept_handle: Option<JoinHandle<()>>,
    send_handle: Option<JoinHandle<()>>,
}

impl FrameStreamer {
    /// Binds `port` and starts both threads.
    pub fn start(port: u16) -> crate::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;

        let frame_slot = Arc::new(Mutex::new(None));
        let client_slot: Arc<Mutex<Option<TcpStream>>> = Arc::new(Mutex::new(None));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let accept_handle = {
            let client_slot = Arc::clone(&client_slot);
            let stop_flag = Arc::clone(&stop_flag);
            thread::spawn(move || accept_loop(listener, client_slot, stop_flag))
        };

        let send_handle = {
            let frame_slot = Arc::clone(&frame_slot);
            let client_slot = Arc::clone(&client_slot);
            let stop_flag = Arc::clone(&stop_flag);
            thread::spawn(move || send_loop(frame_slot, client_slot, stop_flag))
        };

        Ok(Self {
            frame_slot,
            client_slot,
            stop_flag,
            accept_handle: Some(accept_handle),
            send_handle: Some(send_handle),
        })
    }

    /// Publishes the latest JPEG-encoded frame, displacing whatever was
    /// queued and not yet sent.
    pub fn push(&self, jpeg: Vec<u8>) {
        *self.frame_slot.lock().unwrap() = Some(jpeg);
    }

    /// Signals both threads to stop and joins them.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.send_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FrameStreamer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    listener: TcpListener,
    client_slot: Arc<Mutex<Option<TcpStream>>>,
    stop_flag: Arc<AtomicBool>,
) {
    while !stop_flag.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                tracing::info!(%addr, "accepted streaming client");
                let _ = stream.set_nodelay(true);
                *client_slot.lock().unwrap() = Some(stream);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                tracing::warn!(error = %e, "frame streamer accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn send_loop(
    frame_slot: Arc<Mutex<Option<Vec<u8>>>>,
    client_slot: Arc<Mutex<Option<TcpStream>>>,
    stop_flag: Arc<AtomicBool>,
) {
    while !stop_flag.load(Ordering::SeqCst) {
        let frame = frame_slot.lock().unwrap().take();
        let Some(payload) = frame else {
            thread::sleep(SEND_IDLE_SLEEP);
            continue;
        };

        let mut client_guard = client_slot.lock().unwrap();
        if let Some(stream) = client_guard.as_mut() {
            if let Err(e) = write_framed(stream, &payload) {
                tracing::warn!(error = %e, "streaming client disconnected");
                *client_guard = None;
            }
        }
    }
}

fn write_framed(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    stream.write_u32::<BigEndian>(payload.len() as u32)?;
    stream.write_all(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn write_framed_prefixes_a_big_endian_length() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        write_framed(&mut server, b"hello").unwrap();

        let mut len_buf = [0u8; 4];
        client.read_exact(&mut len_buf).unwrap();
        assert_eq!(u32::from_be_bytes(len_buf), 5);

        let mut payload = vec![0u8; 5];
        client.read_exact(&mut payload).unwrap();
        assert_eq!(&payload, b"hello");
    }

    #[test]
    fn write_framed_handles_an_empty_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        write_framed(&mut server, &[]).unwrap();

        let mut len_buf = [0u8; 4];
        client.read_exact(&mut len_buf).unwrap();
        assert_eq!(u32::from_be_bytes(len_buf), 0);
    }
}
