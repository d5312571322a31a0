//! TCP transport to the simulator.
//!
//! Reads are bounded by an absolute deadline: the socket read timeout is
//! re-armed with the time left before every `read` call, so a response that
//! trickles in byte by byte still cannot outlive its deadline.

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{ProtocolError, SessionError};
use crate::framing::{read_frame, write_frame};
use crate::message::Message;

/// Pause between connection attempts while the simulator starts listening.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound on a single connection attempt.
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// DeadlineReader
// ---------------------------------------------------------------------------

struct DeadlineReader<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl Read for DeadlineReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "response deadline passed"));
        }
        let mut stream = self.stream;
        stream.set_read_timeout(Some(left))?;
        stream.read(buf)
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// One TCP connection to the simulator.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connect to `addr`, retrying until `timeout` has elapsed.
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let left = deadline.saturating_duration_since(Instant::now());
            let attempt = left.min(CONNECT_ATTEMPT_TIMEOUT).max(Duration::from_millis(1));
            match TcpStream::connect_timeout(&addr, attempt) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%addr, attempts, "transport connected");
                    return Ok(Self { stream });
                }
                Err(source) => {
                    if Instant::now() + CONNECT_RETRY_INTERVAL >= deadline {
                        return Err(SessionError::Connect {
                            addr,
                            timeout,
                            source,
                        });
                    }
                    thread::sleep(CONNECT_RETRY_INTERVAL);
                }
            }
        }
    }

    pub fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        write_frame(&mut self.stream, msg)
    }

    /// Read one frame, failing with a `TimedOut` IO error once `deadline`
    /// passes. `Ok(None)` means the peer closed the connection.
    pub fn receive(&mut self, deadline: Instant) -> Result<Option<Message>, ProtocolError> {
        let mut reader = DeadlineReader {
            stream: &self.stream,
            deadline,
        };
        read_frame(&mut reader)
    }

    /// Close both directions. Errors are ignored; the peer may already be gone.
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageKind, Value};
    use std::net::TcpListener;

    fn listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn echo_roundtrip() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let msg = read_frame(&mut stream).unwrap().unwrap();
            write_frame(&mut stream, &msg).unwrap();
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        let msg = Message::values(MessageKind::Step, &[Value::Int(9)]);
        transport.send(&msg).unwrap();
        let back = transport
            .receive(Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert_eq!(back, Some(msg));
        server.join().unwrap();
    }

    #[test]
    fn receive_times_out_on_silent_peer() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(400));
            drop(stream);
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        let start = Instant::now();
        let err = transport
            .receive(Instant::now() + Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Io(ref e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        ));
        assert!(start.elapsed() < Duration::from_millis(350));
        server.join().unwrap();
    }

    #[test]
    fn peer_close_reads_as_none() {
        let (listener, addr) = listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        server.join().unwrap();
        let got = transport
            .receive(Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn connect_gives_up_after_timeout() {
        // Bind then drop to get a port nobody listens on.
        let (listener, addr) = listener();
        drop(listener);

        let start = Instant::now();
        let err = TcpTransport::connect(addr, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn connect_retries_until_listener_appears() {
        let (listener, addr) = listener();
        drop(listener);

        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            let listener = TcpListener::bind(addr).unwrap();
            let (mut stream, _) = listener.accept().unwrap();
            write_frame(&mut stream, &Message::empty(MessageKind::Hello)).unwrap();
        });

        let mut transport = TcpTransport::connect(addr, Duration::from_secs(5)).unwrap();
        let hello = transport
            .receive(Instant::now() + Duration::from_secs(5))
            .unwrap()
            .unwrap();
        assert_eq!(hello.kind, MessageKind::Hello);
        server.join().unwrap();
    }
}
