use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::transport::tcp;

/// High-level streaming server orchestrator.
///
/// Listens for control connections and hands each one to its own thread,
/// where a [`SessionHandler`](crate::protocol::SessionHandler) drives the
/// session state machine and spawns the media pump on PLAY. Media files
/// are resolved per SETUP request, so one server serves any number of
/// concurrent clients and files.
pub struct Server {
    bind_addr: String,
    config: Arc<StreamConfig>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, StreamConfig::default())
    }

    /// Create a server with custom tuning.
    pub fn with_config(bind_addr: &str, config: StreamConfig) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            config: Arc::new(config),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(StreamError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        self.local_addr = listener.local_addr().ok();

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let config = self.config.clone();

        tracing::info!(addr = %self.bind_addr, "streaming server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, config, running);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bound control address, available once [`start`](Self::start) returns.
    ///
    /// Useful when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_twice_is_an_error() {
        let mut server = Server::new("127.0.0.1:0");
        server.start().unwrap();
        assert!(matches!(server.start(), Err(StreamError::AlreadyRunning)));
        server.stop();
    }

    #[test]
    fn local_addr_known_after_start() {
        let mut server = Server::new("127.0.0.1:0");
        assert!(server.local_addr().is_none());
        server.start().unwrap();
        assert!(server.local_addr().unwrap().port() != 0);
        server.stop();
    }
}
