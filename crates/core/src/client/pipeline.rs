use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::client::queue::PushOutcome;
use crate::client::{ClientShared, VideoSink};
use crate::media::fragment::{FRAGMENT_HEADER_SIZE, FragmentHeader, Reassembler};
use crate::media::rtp::RtpPacket;
use crate::session::SessionState;
use crate::transport::{MAX_DATAGRAM, MediaReceiver};

/// How often the receive loop publishes an analytics summary to the sink.
const STATS_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Initial delay before the first display tick once the pre-buffer fills.
const DISPLAY_START_DELAY: Duration = Duration::from_millis(1);

/// Receive half of the client media pipeline, run on its own thread
/// between PLAY and PAUSE/TEARDOWN.
///
/// Every datagram is decoded as RTP; the payload is classified as either
/// one fragment of a large frame or a complete single-packet frame:
///
/// - a payload of at least 10 bytes whose leading fragmentation header is
///   self-consistent goes to the reassembler, and a completed frame is
///   pushed onto the queue;
/// - anything else is a whole frame, accepted only when its RTP sequence
///   number advances past the last frame delivered (late duplicates of
///   already displayed content are dropped).
///
/// The reassembler is owned by this thread — no other thread touches it.
pub(crate) struct ReceivePipeline {
    receiver: Arc<MediaReceiver>,
    shared: Arc<ClientShared>,
    sink: Arc<dyn VideoSink>,
    reassembler: Reassembler,
    last_rtp_seq: Option<u64>,
    last_frame_nbr: u64,
}

impl ReceivePipeline {
    pub fn new(
        receiver: Arc<MediaReceiver>,
        shared: Arc<ClientShared>,
        sink: Arc<dyn VideoSink>,
        reassembly_capacity: usize,
    ) -> Self {
        Self {
            receiver,
            shared,
            sink,
            reassembler: Reassembler::new(reassembly_capacity),
            last_rtp_seq: None,
            last_frame_nbr: 0,
        }
    }

    pub fn run(mut self) {
        tracing::debug!("receive loop started");
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut last_stats = Instant::now();

        while !self.shared.stop.is_signalled() {
            let n = match self.receiver.recv(&mut buf) {
                Ok(Some(n)) => n,
                // Timeout: a control point to observe the stop signal.
                Ok(None) => continue,
                Err(error) => {
                    if self.shared.teardown_acked.load(Ordering::SeqCst) {
                        break;
                    }
                    tracing::warn!(%error, "media recv failed");
                    continue;
                }
            };

            match RtpPacket::decode(&buf[..n]) {
                Ok(packet) => self.handle_packet(packet),
                Err(error) => tracing::warn!(%error, "dropping undecodable datagram"),
            }

            if last_stats.elapsed() >= STATS_UPDATE_INTERVAL {
                let summary = self.shared.analytics.lock().summary();
                self.sink.on_stats(&summary);
                last_stats = Instant::now();
            }
        }

        tracing::debug!("receive loop stopped");
    }

    fn handle_packet(&mut self, packet: RtpPacket) {
        let seq = packet.seq_num() as u64;
        if let Some(last) = self.last_rtp_seq
            && seq < last
        {
            tracing::debug!(seq, last, "out-of-order packet");
        }
        self.last_rtp_seq = Some(seq);

        let payload = packet.payload().clone();

        if payload.len() >= FRAGMENT_HEADER_SIZE
            && let Some(header) = FragmentHeader::decode(&payload)
            && header.is_consistent_with(payload.len() - FRAGMENT_HEADER_SIZE)
        {
            let body = payload.slice(FRAGMENT_HEADER_SIZE..);
            if let Some(frame) = self.reassembler.add_fragment(&header, body) {
                self.last_frame_nbr = header.fragment_id as u64;
                self.shared
                    .analytics
                    .lock()
                    .frame_received(header.fragment_id as u64, frame.len());
                self.deliver(frame);
            }
            return;
        }

        // No (plausible) fragmentation header: the payload is a complete
        // single-packet frame, gated on sequence progress.
        if seq > self.last_frame_nbr {
            self.last_frame_nbr = seq;
            self.shared
                .analytics
                .lock()
                .frame_received(seq, payload.len());
            self.deliver(payload);
        }
    }

    fn deliver(&self, frame: Bytes) {
        if self.shared.queue.push(frame) == PushOutcome::StartDisplay {
            tracing::debug!("pre-buffer full, starting display");
            let shared = self.shared.clone();
            let sink = self.sink.clone();
            let handle = thread::spawn(move || run_display(shared, sink));
            *self.shared.display.lock() = Some(handle);
        }
    }
}

/// Display ticker, run on its own thread.
///
/// Pops one frame per tick, writes it to the session cache file, and
/// hands it to the renderer. Keeps ticking while the session is playing
/// and the stop signal is clear.
pub(crate) fn run_display(shared: Arc<ClientShared>, sink: Arc<dyn VideoSink>) {
    thread::sleep(DISPLAY_START_DELAY);
    tracing::debug!("display ticker started");

    loop {
        if *shared.state.lock() != SessionState::Playing || shared.stop.is_signalled() {
            break;
        }

        if let Some(frame) = shared.queue.pop() {
            let cache_path = shared.cache_path.lock().clone();
            if let Some(path) = cache_path
                && let Err(error) = std::fs::write(&path, &frame)
            {
                tracing::warn!(%error, path = %path.display(), "cache write failed");
            }
            sink.on_frame(&frame);
        }

        thread::sleep(shared.display_interval);
    }

    tracing::debug!("display ticker stopped");
}
