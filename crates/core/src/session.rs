//! Session state and lifecycle primitives.
//!
//! A session is created per control connection and walks
//!
//! ```text
//! SETUP    -> Ready
//! PLAY     -> Playing
//! PAUSE    -> Ready     (from Playing)
//! TEARDOWN -> Init      (from any non-Init state)
//! ```
//!
//! The server allocates a random 6-digit session id on SETUP; the client
//! adopts it from the first reply and checks it on every reply after.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use rand::RngExt;

use crate::analytics::AnalyticsWindow;
use crate::media::mjpeg::{MjpegStream, Resolution};

/// Control state machine shared by both peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session established.
    Init,
    /// SETUP completed; media delivery not running.
    Ready,
    /// Media is flowing.
    Playing,
}

/// One-way latch observed by the media pump and the client receive loop.
///
/// `signal` wakes any waiter immediately; the pump polls it with a short
/// timeout so PAUSE and TEARDOWN take effect within one poll interval.
#[derive(Default)]
pub struct StopSignal {
    flag: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        *self.flag.lock() = true;
        self.condvar.notify_all();
    }

    pub fn clear(&self) {
        *self.flag.lock() = false;
    }

    pub fn is_signalled(&self) -> bool {
        *self.flag.lock()
    }

    /// Block up to `timeout`; returns whether the signal is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if !*flag {
            let _ = self.condvar.wait_for(&mut flag, timeout);
        }
        *flag
    }
}

/// Server-side session owned by one control connection.
///
/// Holds the resolved media stream, the client's media destination, the
/// freshly bound media socket (PLAY through TEARDOWN), the pump worker,
/// and the pause/teardown signal. The stream and analytics are behind
/// coarse locks because the pump thread shares them with the control
/// thread.
pub struct Session {
    pub id: u32,
    state: SessionState,
    pub resolution: Option<Resolution>,
    pub media_dest: Option<SocketAddr>,
    pub stream: Option<Arc<Mutex<MjpegStream>>>,
    pub media_socket: Option<Arc<UdpSocket>>,
    pub pump: Option<JoinHandle<()>>,
    pub stop: Arc<StopSignal>,
    pub analytics: Arc<Mutex<AnalyticsWindow>>,
    /// RTP sequence counter, strictly monotonic across frames and
    /// fragments for the lifetime of the session (pause included).
    pub seq: Arc<AtomicU64>,
}

impl Session {
    pub fn new(analytics: AnalyticsWindow) -> Self {
        Self {
            id: 0,
            state: SessionState::Init,
            resolution: None,
            media_dest: None,
            stream: None,
            media_socket: None,
            pump: None,
            stop: Arc::new(StopSignal::new()),
            analytics: Arc::new(Mutex::new(analytics)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Draw a session id uniformly from the 6-digit range.
    pub fn allocate_id() -> u32 {
        rand::rng().random_range(100_000..=999_999)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        tracing::debug!(
            session_id = self.id,
            old_state = ?self.state,
            new_state = ?state,
            "state transition"
        );
        self.state = state;
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn stop_signal_wait_times_out_when_clear() {
        let signal = StopSignal::new();
        let before = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(before.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn stop_signal_wakes_waiter() {
        let signal = Arc::new(StopSignal::new());
        let waiter = signal.clone();
        let handle = std::thread::spawn(move || waiter.wait_timeout(Duration::from_secs(5)));
        std::thread::sleep(Duration::from_millis(10));
        signal.signal();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn stop_signal_clears() {
        let signal = StopSignal::new();
        signal.signal();
        assert!(signal.is_signalled());
        signal.clear();
        assert!(!signal.is_signalled());
    }

    #[test]
    fn allocated_ids_are_six_digits() {
        for _ in 0..100 {
            let id = Session::allocate_id();
            assert!((100_000..=999_999).contains(&id));
        }
    }
}
