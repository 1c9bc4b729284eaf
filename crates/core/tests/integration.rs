//! End-to-end tests: SETUP → PLAY → frames → PAUSE → PLAY → TEARDOWN
//! over real sockets, with a generated MJPEG container on disk.

use std::io::Write;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mjstream::{AnalyticsSummary, Client, Server, SessionState, StreamError, VideoSink};

/// Collects everything the pipeline hands to the renderer.
#[derive(Default)]
struct CollectingSink {
    frames: Mutex<Vec<Vec<u8>>>,
    stats: Mutex<Vec<AnalyticsSummary>>,
}

impl VideoSink for CollectingSink {
    fn on_frame(&self, frame: &[u8]) {
        self.frames.lock().push(frame.to_vec());
    }

    fn on_stats(&self, summary: &AnalyticsSummary) {
        self.stats.lock().push(*summary);
    }
}

impl CollectingSink {
    fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.frame_count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }
}

/// Write an MJPEG container of `frames` images, each `body_len` bytes of
/// payload between the JPEG start/end markers.
fn write_movie(dir: &tempfile::TempDir, frames: usize, body_len: usize) -> PathBuf {
    let path = dir.path().join("movie.mjpeg");
    let mut file = std::fs::File::create(&path).unwrap();
    for i in 0..frames {
        file.write_all(&[0xff, 0xd8]).unwrap();
        file.write_all(&vec![(i % 200) as u8; body_len]).unwrap();
        file.write_all(&[0xff, 0xd9]).unwrap();
    }
    file.flush().unwrap();
    path
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start_server() -> (Server, u16) {
    let mut server = Server::new("127.0.0.1:0");
    server.start().expect("server start");
    let port = server.local_addr().unwrap().port();
    (server, port)
}

#[test]
fn small_frame_session_delivers_frames() {
    let dir = tempfile::tempdir().unwrap();
    let movie = write_movie(&dir, 400, 600);

    let (mut server, port) = start_server();
    let sink = Arc::new(CollectingSink::default());

    let mut client = Client::connect(
        "127.0.0.1",
        port,
        free_udp_port(),
        movie.to_str().unwrap(),
        false,
        sink.clone(),
    )
    .expect("connect");

    client.setup().expect("setup");
    let session_id = client.session_id();
    assert!((100_000..=999_999).contains(&session_id));
    assert_eq!(client.state(), SessionState::Ready);

    client.play().expect("play");
    assert_eq!(client.state(), SessionState::Playing);

    assert!(
        sink.wait_for_frames(5, Duration::from_secs(10)),
        "expected at least 5 displayed frames, got {}",
        sink.frame_count()
    );

    // Every displayed frame is a complete JPEG.
    for frame in sink.frames.lock().iter() {
        assert_eq!(&frame[..2], &[0xff, 0xd8]);
        assert_eq!(&frame[frame.len() - 2..], &[0xff, 0xd9]);
    }

    let summary = client.analytics_summary();
    assert!(summary.packets_received >= 5);
    assert!(summary.bytes_received > 0);

    client.teardown().expect("teardown");
    assert_eq!(client.state(), SessionState::Init);

    // The per-session cache file is removed on teardown.
    assert!(!PathBuf::from(format!("cache-{}.jpg", session_id)).exists());

    server.stop();
}

#[test]
fn hd_frames_are_fragmented_and_reassembled() {
    let dir = tempfile::tempdir().unwrap();
    // ~10 KB frames: each one crosses the MTU and ships as 7 fragments.
    let movie = write_movie(&dir, 100, 10_000);

    let (mut server, port) = start_server();
    let sink = Arc::new(CollectingSink::default());

    let mut client = Client::connect(
        "127.0.0.1",
        port,
        free_udp_port(),
        movie.to_str().unwrap(),
        true,
        sink.clone(),
    )
    .expect("connect");

    client.setup().expect("setup");
    client.play().expect("play");

    assert!(
        sink.wait_for_frames(4, Duration::from_secs(10)),
        "expected at least 4 reassembled frames, got {}",
        sink.frame_count()
    );

    for frame in sink.frames.lock().iter() {
        assert_eq!(frame.len(), 10_000 + 4);
        assert_eq!(&frame[..2], &[0xff, 0xd8]);
        assert_eq!(&frame[frame.len() - 2..], &[0xff, 0xd9]);
    }

    client.teardown().expect("teardown");
    server.stop();
}

#[test]
fn pause_clears_the_prebuffer_and_play_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let movie = write_movie(&dir, 1000, 600);

    let (mut server, port) = start_server();
    let sink = Arc::new(CollectingSink::default());

    let mut client = Client::connect(
        "127.0.0.1",
        port,
        free_udp_port(),
        movie.to_str().unwrap(),
        false,
        sink.clone(),
    )
    .expect("connect");

    client.setup().expect("setup");
    client.play().expect("play");
    assert!(sink.wait_for_frames(3, Duration::from_secs(10)));

    client.pause().expect("pause");
    assert_eq!(client.state(), SessionState::Ready);
    let frames_at_pause = sink.frame_count();

    // Nothing is displayed while paused.
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(sink.frame_count(), frames_at_pause);

    client.play().expect("resume");
    assert_eq!(client.state(), SessionState::Playing);
    assert!(
        sink.wait_for_frames(frames_at_pause + 3, Duration::from_secs(10)),
        "playback did not resume"
    );

    client.teardown().expect("teardown");
    server.stop();
}

#[test]
fn setup_of_missing_file_is_rejected() {
    let (mut server, port) = start_server();
    let sink = Arc::new(CollectingSink::default());

    let mut client = Client::connect(
        "127.0.0.1",
        port,
        free_udp_port(),
        "/no/such/movie.mjpeg",
        false,
        sink,
    )
    .expect("connect");

    match client.setup() {
        Err(StreamError::ServerStatus { code, .. }) => assert_eq!(code, 404),
        other => panic!("expected 404 rejection, got {:?}", other.err()),
    }
    assert_eq!(client.state(), SessionState::Init);

    // PLAY without a session is a local no-op.
    client.play().expect("play is a no-op in Init");
    assert_eq!(client.state(), SessionState::Init);

    server.stop();
}

#[test]
fn connect_to_dead_server_fails() {
    let sink = Arc::new(CollectingSink::default());
    // Port 1 on localhost: nothing listens there.
    let result = Client::connect("127.0.0.1", 1, free_udp_port(), "movie.mjpeg", false, sink);
    assert!(result.is_err());
}
