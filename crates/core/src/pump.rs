//! Server media pump: reads frames, packetizes, fragments, sends, paces.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use crate::analytics::AnalyticsWindow;
use crate::media::fragment::{FRAGMENT_HEADER_SIZE, Fragmenter};
use crate::media::mjpeg::MjpegStream;
use crate::media::rtp::RtpPacket;
use crate::session::StopSignal;

const BANDWIDTH_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const FRAGMENT_SPACING: Duration = Duration::from_millis(1);

/// One worker per playing session.
///
/// Each loop iteration waits on the stop signal (so PAUSE/TEARDOWN take
/// effect within one poll interval), then reads and ships the next frame.
/// Frames above the fragmentation threshold are split and sent as
/// `fragment header ‖ chunk` payloads with a 1 ms gap to smooth
/// microbursts; smaller frames go out raw in a single packet — the
/// receiver detects the absence of a fragmentation header by payload
/// length and self-consistency, so this asymmetry is part of the wire
/// contract.
pub(crate) struct MediaPump {
    pub socket: Arc<UdpSocket>,
    pub dest: SocketAddr,
    pub stream: Arc<Mutex<MjpegStream>>,
    pub analytics: Arc<Mutex<AnalyticsWindow>>,
    pub stop: Arc<StopSignal>,
    pub seq: Arc<AtomicU64>,
    pub fragmenter: Fragmenter,
    pub stop_poll: Duration,
}

impl MediaPump {
    pub(crate) fn run(self) {
        tracing::debug!(dest = %self.dest, "media pump started");

        let mut last_sample = Instant::now();
        let mut bytes_since_sample: u64 = 0;

        loop {
            if self.stop.wait_timeout(self.stop_poll) {
                break;
            }

            let now = Instant::now();
            if now.duration_since(last_sample) >= BANDWIDTH_SAMPLE_INTERVAL {
                self.analytics.lock().record_bandwidth_sample(
                    bytes_since_sample,
                    now.duration_since(last_sample).as_secs_f64(),
                );
                bytes_since_sample = 0;
                last_sample = now;
            }

            let (frame, frame_nbr) = {
                let mut stream = self.stream.lock();
                match stream.next_frame() {
                    Ok(Some(frame)) => (frame, stream.frame_number()),
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::warn!(%error, "frame read failed");
                        continue;
                    }
                }
            };

            bytes_since_sample += self.send_frame(frame, frame_nbr);
        }

        tracing::debug!(dest = %self.dest, "media pump stopped");
    }

    /// Ship one frame; returns the bytes put on the wire.
    fn send_frame(&self, frame: Bytes, frame_nbr: u64) -> u64 {
        let mut wire_bytes = 0u64;

        if frame.len() > self.fragmenter.max_payload() {
            let fragments = self.fragmenter.fragment_frame(&frame, frame_nbr);
            self.analytics
                .lock()
                .frame_sent(frame_nbr, frame.len(), fragments.len() as u32);

            for fragment in fragments {
                let mut payload =
                    BytesMut::with_capacity(FRAGMENT_HEADER_SIZE + fragment.payload.len());
                payload.extend_from_slice(&fragment.header.encode());
                payload.extend_from_slice(&fragment.payload);

                wire_bytes += self.send_packet(payload.freeze(), frame_nbr);
                thread::sleep(FRAGMENT_SPACING);
            }
        } else {
            self.analytics.lock().frame_sent(frame_nbr, frame.len(), 1);
            wire_bytes += self.send_packet(frame, frame_nbr);
        }

        wire_bytes
    }

    fn send_packet(&self, payload: Bytes, frame_nbr: u64) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let packet = RtpPacket::new(seq as u16, payload).to_bytes();

        match self.socket.send_to(&packet, self.dest) {
            Ok(sent) => sent as u64,
            Err(error) => {
                tracing::warn!(%error, dest = %self.dest, "media send failed");
                self.analytics.lock().packet_loss(frame_nbr, 1);
                0
            }
        }
    }
}
