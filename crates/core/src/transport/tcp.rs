use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::config::StreamConfig;
use crate::protocol::SessionHandler;
use crate::protocol::request::RtspRequest;

/// Largest control message accepted in one read.
const CONTROL_BUF_SIZE: usize = 1024;

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50 ms poll interval
/// so that [`crate::Server::stop`] can terminate it promptly. Each
/// accepted client gets its own thread and its own session.
pub(crate) fn accept_loop(
    listener: TcpListener,
    config: Arc<StreamConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let c = config.clone();
                let r = running.clone();
                thread::spawn(move || {
                    Connection::handle(stream, c, r);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single control connection with its own session lifecycle.
struct Connection {
    stream: TcpStream,
    handler: SessionHandler,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    pub fn handle(stream: TcpStream, config: Arc<StreamConfig>, running: Arc<AtomicBool>) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };

        tracing::info!(%peer_addr, "client connected");

        let handler = SessionHandler::new(peer_addr.ip(), config);
        let mut conn = Connection {
            stream,
            handler,
            peer_addr,
        };

        let reason = conn.run(&running);
        conn.handler.shutdown();

        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    /// Request/reply loop. Returns the reason for exiting.
    ///
    /// Control messages carry no explicit terminator; like the wire
    /// peers it interoperates with, one socket read is one message.
    fn run(&mut self, running: &Arc<AtomicBool>) -> &'static str {
        let mut buf = [0u8; CONTROL_BUF_SIZE];

        while running.load(Ordering::SeqCst) {
            let n = match self.stream.read(&mut buf) {
                Ok(0) => return "connection closed by client",
                Ok(n) => n,
                Err(_) => return "read error",
            };

            let text = String::from_utf8_lossy(&buf[..n]);
            if text.trim().is_empty() {
                continue;
            }

            match RtspRequest::parse(&text) {
                Ok(request) => {
                    tracing::debug!(
                        peer = %self.peer_addr,
                        method = %request.method,
                        filename = %request.filename,
                        "request"
                    );

                    let reply = self.handler.handle(&request);

                    tracing::debug!(
                        peer = %self.peer_addr,
                        status = reply.status_code,
                        "reply"
                    );

                    if self.stream.write_all(reply.serialize().as_bytes()).is_err() {
                        return "write error";
                    }
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                }
            }
        }

        "server shutting down"
    }
}
