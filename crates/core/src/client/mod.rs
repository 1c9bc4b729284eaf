//! Client: control mirror, media receive pipeline, pre-buffer, display.
//!
//! The client owns three long-lived activities:
//!
//! - the control path (the caller's thread): sends SETUP/PLAY/PAUSE/
//!   TEARDOWN and validates each reply's CSeq and session id;
//! - the media thread ([`pipeline::ReceivePipeline`]): receives RTP
//!   datagrams, reassembles fragmented frames, and feeds the pre-buffer;
//! - the display thread: started once the pre-buffer holds
//!   `queue_depth` frames, it pops one frame every display interval and
//!   hands it to the [`VideoSink`].
//!
//! PAUSE stops the media and display threads and clears the pre-buffer,
//! so the next PLAY pre-buffers from scratch.

mod pipeline;
mod queue;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::analytics::{AnalyticsSummary, AnalyticsWindow};
use crate::config::StreamConfig;
use crate::error::{ParseErrorKind, Result, StreamError};
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::response::RtspReply;
use crate::session::{SessionState, StopSignal};
use crate::transport::MediaReceiver;

use pipeline::ReceivePipeline;
use queue::FrameQueue;

/// External rendering collaborator.
///
/// The core delivers complete JPEG frame bytes and periodic analytics
/// snapshots; decoding and painting are not its business.
pub trait VideoSink: Send + Sync {
    /// One decoded-ready frame, in display order.
    fn on_frame(&self, frame: &[u8]);

    /// Periodic network statistics, roughly once per second while playing.
    fn on_stats(&self, _summary: &AnalyticsSummary) {}
}

/// State shared between the control, media, and display threads.
pub(crate) struct ClientShared {
    pub state: Mutex<SessionState>,
    pub queue: FrameQueue,
    pub stop: StopSignal,
    pub teardown_acked: AtomicBool,
    pub analytics: Mutex<AnalyticsWindow>,
    pub cache_path: Mutex<Option<PathBuf>>,
    pub display: Mutex<Option<JoinHandle<()>>>,
    pub display_interval: Duration,
}

/// Streaming client: control mirror plus receive/display pipeline.
pub struct Client {
    control: TcpStream,
    media_port: u16,
    filename: String,
    hd_mode: bool,
    cseq: u32,
    session_id: u32,
    config: Arc<StreamConfig>,
    shared: Arc<ClientShared>,
    sink: Arc<dyn VideoSink>,
    receiver: Option<Arc<MediaReceiver>>,
    receive_thread: Option<JoinHandle<()>>,
}

impl Client {
    /// Open the control connection. No session exists until
    /// [`setup`](Self::setup).
    pub fn connect(
        host: &str,
        port: u16,
        media_port: u16,
        filename: &str,
        hd_mode: bool,
        sink: Arc<dyn VideoSink>,
    ) -> Result<Self> {
        Self::connect_with_config(
            host,
            port,
            media_port,
            filename,
            hd_mode,
            sink,
            StreamConfig::default(),
        )
    }

    pub fn connect_with_config(
        host: &str,
        port: u16,
        media_port: u16,
        filename: &str,
        hd_mode: bool,
        sink: Arc<dyn VideoSink>,
        config: StreamConfig,
    ) -> Result<Self> {
        let control = TcpStream::connect((host, port)).inspect_err(
            |error| tracing::error!(host, port, %error, "connection failed"),
        )?;

        tracing::info!(host, port, filename, hd_mode, "control connection established");

        let shared = Arc::new(ClientShared {
            state: Mutex::new(SessionState::Init),
            queue: FrameQueue::new(config.queue_depth),
            stop: StopSignal::new(),
            teardown_acked: AtomicBool::new(false),
            analytics: Mutex::new(AnalyticsWindow::new(&config)),
            cache_path: Mutex::new(None),
            display: Mutex::new(None),
            display_interval: Duration::from_millis(config.display_interval_ms),
        });

        Ok(Self {
            control,
            media_port,
            filename: filename.to_string(),
            hd_mode,
            cseq: 0,
            session_id: 0,
            config: Arc::new(config),
            shared,
            sink,
            receiver: None,
            receive_thread: None,
        })
    }

    /// Establish the session and bind the local media port.
    ///
    /// A bind failure aborts the SETUP: the session stays in `Init`.
    pub fn setup(&mut self) -> Result<()> {
        if self.state() != SessionState::Init {
            return Ok(());
        }

        self.send_request(Method::Setup)?;

        let receiver = MediaReceiver::bind(
            self.media_port,
            Duration::from_millis(self.config.media_recv_timeout_ms),
        )
        .inspect_err(
            |error| tracing::error!(port = self.media_port, %error, "unable to bind media port"),
        )?;
        self.receiver = Some(Arc::new(receiver));

        *self.shared.cache_path.lock() = Some(PathBuf::from(format!(
            "cache-{}.jpg",
            self.session_id
        )));

        self.set_state(SessionState::Ready);
        Ok(())
    }

    /// Start (or resume) playback.
    ///
    /// The receive thread is started once the server confirms; datagrams
    /// that land before it spins up wait in the socket buffer.
    pub fn play(&mut self) -> Result<()> {
        if self.state() != SessionState::Ready {
            return Ok(());
        }
        let receiver = self.receiver.clone().ok_or(StreamError::NotConnected)?;

        self.send_request(Method::Play)?;
        self.set_state(SessionState::Playing);

        self.shared.stop.clear();
        let pipeline = ReceivePipeline::new(
            receiver,
            self.shared.clone(),
            self.sink.clone(),
            self.config.reassembly_capacity,
        );
        self.receive_thread = Some(thread::spawn(move || pipeline.run()));
        Ok(())
    }

    /// Suspend playback: stop the media and display threads and drop any
    /// buffered frames, so the next PLAY pre-buffers again.
    pub fn pause(&mut self) -> Result<()> {
        if self.state() != SessionState::Playing {
            return Ok(());
        }

        self.shared.stop.signal();
        self.send_request(Method::Pause)?;
        self.set_state(SessionState::Ready);

        self.join_workers();
        self.shared.queue.reset();
        Ok(())
    }

    /// End the session. Safe to call from any non-`Init` state.
    pub fn teardown(&mut self) -> Result<()> {
        if self.state() == SessionState::Init {
            return Ok(());
        }

        self.shared.stop.signal();
        self.send_request(Method::Teardown)?;

        self.shared.teardown_acked.store(true, Ordering::SeqCst);
        self.set_state(SessionState::Init);

        self.join_workers();
        self.shared.queue.reset();
        self.remove_cache_file();
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Session id assigned by the server, 0 before SETUP completes.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Snapshot of the client-side analytics.
    pub fn analytics_summary(&self) -> AnalyticsSummary {
        self.shared.analytics.lock().summary()
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.shared.state.lock();
        tracing::debug!(old_state = ?*current, new_state = ?state, "client state transition");
        *current = state;
    }

    /// Send one request and validate its reply.
    ///
    /// A reply must echo the CSeq of this request and, once a session is
    /// established, name that session; anything else is rejected.
    fn send_request(&mut self, method: Method) -> Result<RtspReply> {
        self.cseq += 1;
        let mut request =
            RtspRequest::new(method, &self.filename).add_header("CSeq", &self.cseq.to_string());

        match method {
            Method::Setup => {
                request = request.add_header(
                    "Transport",
                    &format!("RTP/UDP; client_port={}", self.media_port),
                );
                if self.hd_mode {
                    request = request.add_header("Resolution", "1080p");
                }
            }
            _ => {
                request = request.add_header("Session", &self.session_id.to_string());
            }
        }

        self.control.write_all(request.serialize().as_bytes())?;
        tracing::debug!(%method, cseq = self.cseq, "request sent");

        let mut buf = [0u8; 1024];
        let n = self.control.read(&mut buf)?;
        if n == 0 {
            return Err(StreamError::NotConnected);
        }

        let reply = RtspReply::parse(&String::from_utf8_lossy(&buf[..n]))?;

        let got_cseq = reply.cseq().ok_or(StreamError::Parse {
            kind: ParseErrorKind::MissingCseq,
        })?;
        if got_cseq != self.cseq {
            return Err(StreamError::CseqMismatch {
                expected: self.cseq,
                got: got_cseq,
            });
        }

        if reply.status_code != 200 {
            return Err(StreamError::ServerStatus {
                code: reply.status_code,
                text: reply.status_text.clone(),
            });
        }

        let session = reply.session().unwrap_or(0);
        if self.session_id == 0 {
            self.session_id = session;
        } else if session != self.session_id {
            return Err(StreamError::SessionMismatch {
                expected: self.session_id,
                got: session,
            });
        }

        Ok(reply)
    }

    fn join_workers(&mut self) {
        if let Some(handle) = self.receive_thread.take()
            && handle.join().is_err()
        {
            tracing::warn!("receive thread panicked");
        }
        let display = self.shared.display.lock().take();
        if let Some(handle) = display
            && handle.join().is_err()
        {
            tracing::warn!("display thread panicked");
        }
    }

    fn remove_cache_file(&self) {
        if let Some(path) = self.shared.cache_path.lock().take()
            && let Err(error) = std::fs::remove_file(&path)
        {
            tracing::debug!(%error, path = %path.display(), "cache file not removed");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shared.stop.signal();
        self.remove_cache_file();
    }
}
