use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::analytics::AnalyticsWindow;
use crate::config::StreamConfig;
use crate::media::fragment::Fragmenter;
use crate::media::mjpeg::{MjpegStream, Resolution};
use crate::protocol::request::{Method, RtspRequest};
use crate::protocol::response::RtspReply;
use crate::pump::MediaPump;
use crate::session::{Session, SessionState};
use crate::transport::udp;

/// Drives one session's control state machine on the server.
///
/// Each control connection owns one handler; every parsed request maps to
/// exactly one reply. Methods arriving in the wrong state are acknowledged
/// with a 200 and no side effect.
pub struct SessionHandler {
    session: Session,
    client_ip: IpAddr,
    config: Arc<StreamConfig>,
}

impl SessionHandler {
    pub fn new(client_ip: IpAddr, config: Arc<StreamConfig>) -> Self {
        Self {
            session: Session::new(AnalyticsWindow::new(&config)),
            client_ip,
            config,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn handle(&mut self, request: &RtspRequest) -> RtspReply {
        let cseq = request.cseq().unwrap_or("0").to_string();

        match (request.method, self.session.state()) {
            (Method::Setup, SessionState::Init) => self.handle_setup(&cseq, request),
            (Method::Play, SessionState::Ready) => self.handle_play(&cseq),
            (Method::Pause, SessionState::Playing) => self.handle_pause(&cseq),
            (Method::Teardown, state) if state != SessionState::Init => {
                self.handle_teardown(&cseq)
            }
            (method, state) => {
                // Wrong-state methods are acknowledged and ignored.
                tracing::debug!(%method, ?state, "method in wrong state, no-op");
                self.ok_reply(&cseq)
            }
        }
    }

    fn handle_setup(&mut self, cseq: &str, request: &RtspRequest) -> RtspReply {
        let resolution = request.resolution();
        let hd = resolution == Some(Resolution::Hd1080);

        let stream = if hd {
            MjpegStream::open_hd(&request.filename, Resolution::Hd1080, 30)
        } else {
            MjpegStream::open(&request.filename)
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(error) => {
                tracing::warn!(%error, filename = %request.filename, "SETUP failed");
                return RtspReply::not_found().add_header("CSeq", cseq);
            }
        };

        let Some(client_port) = request.client_port() else {
            tracing::warn!(%cseq, "SETUP missing client_port");
            return RtspReply::connection_error().add_header("CSeq", cseq);
        };

        self.session.id = Session::allocate_id();
        self.session.resolution = if hd { Some(Resolution::Hd1080) } else { None };
        self.session.media_dest = Some(SocketAddr::new(self.client_ip, client_port));
        self.session.stream = Some(Arc::new(Mutex::new(stream)));
        self.session.set_state(SessionState::Ready);

        tracing::info!(
            session_id = self.session.id,
            filename = %request.filename,
            client_port,
            hd,
            "session created via SETUP"
        );

        self.ok_reply(cseq)
    }

    fn handle_play(&mut self, cseq: &str) -> RtspReply {
        let (Some(dest), Some(stream)) =
            (self.session.media_dest, self.session.stream.clone())
        else {
            tracing::warn!(%cseq, "PLAY before transport was configured");
            return RtspReply::connection_error().add_header("CSeq", cseq);
        };

        let socket = match udp::bind_sender() {
            Ok(socket) => Arc::new(socket),
            Err(error) => {
                tracing::error!(%error, "failed to bind media socket");
                return RtspReply::connection_error().add_header("CSeq", cseq);
            }
        };
        self.session.media_socket = Some(socket.clone());

        self.session.stop.clear();
        let pump = MediaPump {
            socket,
            dest,
            stream,
            analytics: self.session.analytics.clone(),
            stop: self.session.stop.clone(),
            seq: self.session.seq.clone(),
            fragmenter: Fragmenter::new(self.config.mtu),
            stop_poll: Duration::from_millis(self.config.pump_stop_poll_ms),
        };
        self.session.pump = Some(thread::spawn(move || pump.run()));
        self.session.set_state(SessionState::Playing);

        tracing::info!(session_id = self.session.id, "session started playing");
        self.ok_reply(cseq)
    }

    fn handle_pause(&mut self, cseq: &str) -> RtspReply {
        self.stop_pump();
        self.session.set_state(SessionState::Ready);
        tracing::info!(session_id = self.session.id, "session paused");
        self.ok_reply(cseq)
    }

    fn handle_teardown(&mut self, cseq: &str) -> RtspReply {
        self.stop_pump();
        self.session.media_socket = None;
        self.session.set_state(SessionState::Init);
        tracing::info!(session_id = self.session.id, "session terminated via TEARDOWN");
        self.ok_reply(cseq)
    }

    /// Signal the pump and reclaim its thread, if one is running.
    fn stop_pump(&mut self) {
        self.session.stop.signal();
        if let Some(pump) = self.session.pump.take()
            && pump.join().is_err()
        {
            tracing::warn!(session_id = self.session.id, "media pump panicked");
        }
    }

    /// 200 with the session id, plus the HD marker on HD sessions.
    fn ok_reply(&self, cseq: &str) -> RtspReply {
        let mut reply = RtspReply::ok()
            .add_header("CSeq", cseq)
            .add_header("Session", &self.session.id.to_string());
        if self.session.resolution == Some(Resolution::Hd1080) {
            reply = reply.add_header("HD-Mode", "1080p");
        }
        reply
    }

    /// Cleanup when the control connection drops without TEARDOWN.
    pub fn shutdown(&mut self) {
        self.stop_pump();
        self.session.media_socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::Ipv4Addr;

    fn write_movie() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..5 {
            file.write_all(&[0xff, 0xd8]).unwrap();
            file.write_all(&[0u8; 100]).unwrap();
            file.write_all(&[0xff, 0xd9]).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn make_handler() -> SessionHandler {
        SessionHandler::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            Arc::new(StreamConfig::default()),
        )
    }

    fn setup_request(path: &str) -> RtspRequest {
        RtspRequest::new(Method::Setup, path)
            .add_header("CSeq", "1")
            .add_header("Transport", "RTP/UDP; client_port=39999")
    }

    #[test]
    fn setup_allocates_session_and_moves_to_ready() {
        let movie = write_movie();
        let mut handler = make_handler();

        let reply = handler.handle(&setup_request(movie.path().to_str().unwrap()));
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.get_header("CSeq"), Some("1"));

        let id: u32 = reply.get_header("Session").unwrap().parse().unwrap();
        assert!((100_000..=999_999).contains(&id));
        assert_eq!(handler.session().state(), SessionState::Ready);
    }

    #[test]
    fn setup_missing_file_replies_404_and_stays_init() {
        let mut handler = make_handler();

        let reply = handler.handle(&setup_request("/no/such/file.mjpeg"));
        assert_eq!(reply.status_code, 404);
        assert_eq!(handler.session().state(), SessionState::Init);

        // A PLAY after the failed SETUP is a no-op acknowledgment.
        let play = RtspRequest::new(Method::Play, "/no/such/file.mjpeg").add_header("CSeq", "2");
        let reply = handler.handle(&play);
        assert_eq!(reply.status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Init);
    }

    #[test]
    fn full_lifecycle_play_pause_teardown() {
        let movie = write_movie();
        let path = movie.path().to_str().unwrap().to_string();
        let mut handler = make_handler();

        handler.handle(&setup_request(&path));

        let play = RtspRequest::new(Method::Play, &path).add_header("CSeq", "2");
        assert_eq!(handler.handle(&play).status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Playing);
        assert!(handler.session().media_socket.is_some());

        let pause = RtspRequest::new(Method::Pause, &path).add_header("CSeq", "3");
        assert_eq!(handler.handle(&pause).status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Ready);

        let play = RtspRequest::new(Method::Play, &path).add_header("CSeq", "4");
        assert_eq!(handler.handle(&play).status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Playing);

        let teardown = RtspRequest::new(Method::Teardown, &path).add_header("CSeq", "5");
        assert_eq!(handler.handle(&teardown).status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Init);
        assert!(handler.session().media_socket.is_none());
    }

    #[test]
    fn hd_setup_marks_replies() {
        let movie = write_movie();
        let mut handler = make_handler();

        let request = setup_request(movie.path().to_str().unwrap()).add_header("Resolution", "1080p");
        let reply = handler.handle(&request);
        assert_eq!(reply.status_code, 200);
        assert_eq!(reply.get_header("HD-Mode"), Some("1080p"));
    }

    #[test]
    fn pause_in_ready_is_acknowledged_without_effect() {
        let movie = write_movie();
        let path = movie.path().to_str().unwrap().to_string();
        let mut handler = make_handler();
        handler.handle(&setup_request(&path));

        let pause = RtspRequest::new(Method::Pause, &path).add_header("CSeq", "2");
        assert_eq!(handler.handle(&pause).status_code, 200);
        assert_eq!(handler.session().state(), SessionState::Ready);
    }
}
