use std::net::UdpSocket;
use std::time::Duration;

use crate::error::Result;

/// Largest media datagram the client will accept in one read.
pub const MAX_DATAGRAM: usize = 20 * 1024;

/// Bind an ephemeral socket for outbound RTP.
///
/// This layer is deliberately address-only — the caller resolves session
/// state to a destination address before sending.
pub fn bind_sender() -> Result<UdpSocket> {
    Ok(UdpSocket::bind("0.0.0.0:0")?)
}

/// Inbound media socket bound to the client's advertised port.
///
/// Reads time out after `timeout` so the receive loop can poll its stop
/// signal; a timeout is a control point, not an error.
pub struct MediaReceiver {
    socket: UdpSocket,
}

impl MediaReceiver {
    pub fn bind(port: u16, timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(timeout))?;
        tracing::debug!(port, "media port bound");
        Ok(Self { socket })
    }

    /// Receive one datagram; `Ok(None)` on read timeout.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        match self.socket.recv(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_times_out_quietly() {
        let receiver = MediaReceiver::bind(0, Duration::from_millis(10)).unwrap();
        let mut buf = [0u8; 64];
        assert!(receiver.recv(&mut buf).unwrap().is_none());
    }

    #[test]
    fn sender_reaches_receiver() {
        let receiver = MediaReceiver::bind(0, Duration::from_millis(200)).unwrap();
        let port = receiver.socket.local_addr().unwrap().port();

        let sender = bind_sender().unwrap();
        sender.send_to(b"hello", ("127.0.0.1", port)).unwrap();

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], b"hello");
    }
}
