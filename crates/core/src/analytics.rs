//! Rolling network analytics and the adaptive-bitrate signal.
//!
//! One [`AnalyticsWindow`] lives on each side of the session. The server
//! records sends and observed losses; the client records completed frame
//! receipts. Both expose the same metric surface. Per-frame statistics
//! roll through a bounded window (default 300 frames); the scalar totals
//! are cumulative and unaffected by window eviction.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::StreamConfig;

const BANDWIDTH_SAMPLE_CAP: usize = 100;

/// Statistics for a single frame, as far as this side observed it.
#[derive(Debug, Clone)]
pub struct FrameStat {
    pub frame_id: u64,
    pub frame_size: usize,
    pub sent_at: Option<Instant>,
    pub received_at: Option<Instant>,
    pub fragments_expected: u32,
    pub fragments_lost: u32,
    pub complete: bool,
}

impl FrameStat {
    fn latency_ms(&self) -> Option<f64> {
        match (self.sent_at, self.received_at) {
            (Some(sent), Some(received)) => {
                Some(received.duration_since(sent).as_secs_f64() * 1000.0)
            }
            _ => None,
        }
    }
}

/// Point-in-time snapshot of every exported metric.
///
/// Values are plain numerics; formatting belongs to whoever displays them.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticsSummary {
    pub elapsed_seconds: f64,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frame_loss_rate: f64,
    pub packet_loss_rate: f64,
    pub current_bitrate_mbps: f64,
    pub average_bitrate_mbps: f64,
    pub average_latency_ms: f64,
    pub max_latency_ms: f64,
    pub jitter_ms: f64,
    pub recommended_bitrate_bps: u64,
}

/// Rolling window of frame statistics plus cumulative totals.
pub struct AnalyticsWindow {
    window_size: usize,
    frames: VecDeque<FrameStat>,
    timestamps: VecDeque<Instant>,
    bandwidth_samples: VecDeque<f64>,
    started: Instant,

    bytes_sent: u64,
    bytes_received: u64,
    packets_sent: u64,
    packets_received: u64,
    packets_lost: u64,

    current_bitrate: f64,
    target_bitrate: f64,
    min_bitrate: f64,
    max_bitrate: f64,
}

impl AnalyticsWindow {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            window_size: config.analytics_window.max(1),
            frames: VecDeque::new(),
            timestamps: VecDeque::new(),
            bandwidth_samples: VecDeque::new(),
            started: Instant::now(),
            bytes_sent: 0,
            bytes_received: 0,
            packets_sent: 0,
            packets_received: 0,
            packets_lost: 0,
            current_bitrate: 0.0,
            target_bitrate: config.target_bitrate_bps as f64,
            min_bitrate: config.min_bitrate_bps as f64,
            max_bitrate: config.max_bitrate_bps as f64,
        }
    }

    /// Record a frame leaving the server in `fragments` packets.
    pub fn frame_sent(&mut self, frame_id: u64, frame_size: usize, fragments: u32) {
        let now = Instant::now();
        self.push_frame(FrameStat {
            frame_id,
            frame_size,
            sent_at: Some(now),
            received_at: None,
            fragments_expected: fragments,
            fragments_lost: 0,
            complete: false,
        });
        self.push_timestamp(now);
        self.bytes_sent += frame_size as u64;
        self.packets_sent += fragments as u64;
    }

    /// Record a completed frame on the receiving side.
    ///
    /// When a matching send record exists (loopback/testing), it gains a
    /// receive time and a latency sample. Otherwise — the normal client
    /// case — a receive-only record is appended so that loss and bitrate
    /// can still be computed without the sender's clock.
    pub fn frame_received(&mut self, frame_id: u64, frame_size: usize) {
        let now = Instant::now();
        self.bytes_received += frame_size as u64;
        self.packets_received += 1;

        if let Some(stat) = self.frames.iter_mut().find(|s| s.frame_id == frame_id) {
            stat.received_at = Some(now);
            stat.complete = true;
            return;
        }

        self.push_frame(FrameStat {
            frame_id,
            frame_size,
            sent_at: None,
            received_at: Some(now),
            fragments_expected: 1,
            fragments_lost: 0,
            complete: true,
        });
        self.push_timestamp(now);
    }

    /// Record `count` packets lost while sending `frame_id`.
    pub fn packet_loss(&mut self, frame_id: u64, count: u32) {
        self.packets_lost += count as u64;
        if let Some(stat) = self.frames.iter_mut().find(|s| s.frame_id == frame_id) {
            stat.fragments_lost += count;
        }
    }

    /// Feed one `(bytes, seconds)` observation to the bandwidth history.
    pub fn record_bandwidth_sample(&mut self, bytes_transferred: u64, delta_secs: f64) {
        if delta_secs <= 0.0 {
            return;
        }
        let mbps = bytes_transferred as f64 * 8.0 / (delta_secs * 1e6);
        if self.bandwidth_samples.len() >= BANDWIDTH_SAMPLE_CAP {
            self.bandwidth_samples.pop_front();
        }
        self.bandwidth_samples.push_back(mbps);
    }

    /// Share of windowed frames that never completed, in percent.
    pub fn frame_loss_rate(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let lost = self.frames.iter().filter(|s| !s.complete).count();
        lost as f64 / self.frames.len() as f64 * 100.0
    }

    /// Lost packets over sent packets, in percent.
    pub fn packet_loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_lost as f64 / self.packets_sent as f64 * 100.0
    }

    pub fn average_latency_ms(&self) -> f64 {
        let latencies = self.latencies();
        if latencies.is_empty() {
            return 0.0;
        }
        latencies.iter().sum::<f64>() / latencies.len() as f64
    }

    pub fn max_latency_ms(&self) -> f64 {
        self.latencies().into_iter().fold(0.0, f64::max)
    }

    /// Population standard deviation of the per-frame latency series.
    pub fn jitter_ms(&self) -> f64 {
        let latencies = self.latencies();
        if latencies.len() < 2 {
            return 0.0;
        }
        let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
        let variance = latencies
            .iter()
            .map(|latency| (latency - mean).powi(2))
            .sum::<f64>()
            / latencies.len() as f64;
        variance.sqrt()
    }

    /// Bitrate over the window: frame bytes over the timestamp span, Mbps.
    pub fn current_bitrate_mbps(&self) -> f64 {
        if self.timestamps.len() < 2 {
            return 0.0;
        }
        let span = self
            .timestamps
            .back()
            .expect("nonempty")
            .duration_since(*self.timestamps.front().expect("nonempty"))
            .as_secs_f64();
        if span == 0.0 {
            return 0.0;
        }
        let bytes: u64 = self.frames.iter().map(|s| s.frame_size as u64).sum();
        bytes as f64 * 8.0 / span / 1e6
    }

    /// Bitrate since construction (or the last [`reset`](Self::reset)), Mbps.
    pub fn average_bitrate_mbps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 * 8.0 / elapsed / 1e6
    }

    /// Recommended sending rate in bps, scaled by observed packet loss.
    ///
    /// Loss above 10% cuts the rate to 0.7×, above 5% to 0.85×; loss
    /// under 1% grows it by 1.1×. The result is held within
    /// `[min_bitrate, max_bitrate]`, and a rate that is still zero is
    /// seeded with the target.
    pub fn adaptive_bitrate_bps(&mut self) -> u64 {
        let loss = self.packet_loss_rate();

        if loss > 10.0 {
            self.current_bitrate = self.min_bitrate.max(self.current_bitrate * 0.7);
        } else if loss > 5.0 {
            self.current_bitrate = self.min_bitrate.max(self.current_bitrate * 0.85);
        } else if loss < 1.0 {
            self.current_bitrate = self.max_bitrate.min(self.current_bitrate * 1.1);
        }

        if self.current_bitrate == 0.0 {
            self.current_bitrate = self.target_bitrate;
        }

        self.current_bitrate as u64
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn packets_lost(&self) -> u64 {
        self.packets_lost
    }

    /// Snapshot every exported metric at once.
    pub fn summary(&mut self) -> AnalyticsSummary {
        AnalyticsSummary {
            elapsed_seconds: self.started.elapsed().as_secs_f64(),
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            packets_lost: self.packets_lost,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            frame_loss_rate: self.frame_loss_rate(),
            packet_loss_rate: self.packet_loss_rate(),
            current_bitrate_mbps: self.current_bitrate_mbps(),
            average_bitrate_mbps: self.average_bitrate_mbps(),
            average_latency_ms: self.average_latency_ms(),
            max_latency_ms: self.max_latency_ms(),
            jitter_ms: self.jitter_ms(),
            recommended_bitrate_bps: self.adaptive_bitrate_bps(),
        }
    }

    /// Clear all history, totals, and adaptive state; restart the clock.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.timestamps.clear();
        self.bandwidth_samples.clear();
        self.started = Instant::now();
        self.bytes_sent = 0;
        self.bytes_received = 0;
        self.packets_sent = 0;
        self.packets_received = 0;
        self.packets_lost = 0;
        self.current_bitrate = 0.0;
    }

    fn latencies(&self) -> Vec<f64> {
        self.frames.iter().filter_map(FrameStat::latency_ms).collect()
    }

    fn push_frame(&mut self, stat: FrameStat) {
        if self.frames.len() >= self.window_size {
            self.frames.pop_front();
        }
        self.frames.push_back(stat);
    }

    fn push_timestamp(&mut self, at: Instant) {
        if self.timestamps.len() >= self.window_size {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_window() -> AnalyticsWindow {
        AnalyticsWindow::new(&StreamConfig::default())
    }

    #[test]
    fn frame_loss_counts_incomplete_entries() {
        let mut analytics = make_window();
        for id in 0..10 {
            analytics.frame_sent(id, 1024, 1);
        }
        analytics.frame_received(0, 1024);
        analytics.frame_received(5, 1024);
        analytics.frame_received(9, 1024);

        assert_eq!(analytics.frame_loss_rate(), 70.0);
    }

    #[test]
    fn packet_loss_rate_over_fragments() {
        let mut analytics = make_window();
        analytics.frame_sent(1, 10_000, 5);
        analytics.packet_loss(1, 2);

        assert_eq!(analytics.packet_loss_rate(), 40.0);
        assert_eq!(analytics.packets_lost(), 2);
    }

    #[test]
    fn no_traffic_means_zero_rates() {
        let analytics = make_window();
        assert_eq!(analytics.frame_loss_rate(), 0.0);
        assert_eq!(analytics.packet_loss_rate(), 0.0);
        assert_eq!(analytics.average_latency_ms(), 0.0);
        assert_eq!(analytics.jitter_ms(), 0.0);
        assert_eq!(analytics.current_bitrate_mbps(), 0.0);
    }

    #[test]
    fn latency_needs_both_endpoints() {
        let mut analytics = make_window();
        analytics.frame_sent(1, 100, 1);
        assert_eq!(analytics.average_latency_ms(), 0.0);

        analytics.frame_received(1, 100);
        assert!(analytics.average_latency_ms() >= 0.0);
        assert!(analytics.max_latency_ms() >= analytics.average_latency_ms());
    }

    #[test]
    fn receive_without_send_appends_a_record() {
        let mut analytics = make_window();
        analytics.frame_received(17, 4096);

        assert_eq!(analytics.packets_received(), 1);
        assert_eq!(analytics.bytes_received(), 4096);
        assert_eq!(analytics.frame_loss_rate(), 0.0);
        // No sender clock, so no latency sample.
        assert_eq!(analytics.average_latency_ms(), 0.0);
    }

    #[test]
    fn totals_survive_window_eviction() {
        let mut config = StreamConfig::default();
        config.analytics_window = 4;
        let mut analytics = AnalyticsWindow::new(&config);

        for id in 0..20 {
            analytics.frame_sent(id, 1000, 1);
        }
        assert_eq!(analytics.packets_sent(), 20);
        assert_eq!(analytics.bytes_sent(), 20_000);
    }

    #[test]
    fn counters_are_monotonic() {
        let mut analytics = make_window();
        let mut last = (0, 0, 0, 0, 0);
        for id in 0..50 {
            analytics.frame_sent(id, 100, 2);
            if id % 3 == 0 {
                analytics.packet_loss(id, 1);
            }
            if id % 2 == 0 {
                analytics.frame_received(id, 100);
            }
            let now = (
                analytics.packets_sent(),
                analytics.packets_received(),
                analytics.packets_lost(),
                analytics.bytes_sent(),
                analytics.bytes_received(),
            );
            assert!(now.0 >= last.0 && now.1 >= last.1 && now.2 >= last.2);
            assert!(now.3 >= last.3 && now.4 >= last.4);
            last = now;
        }
    }

    #[test]
    fn adaptive_bitrate_stays_clamped() {
        let config = StreamConfig::default();
        let mut analytics = make_window();

        // Seed: no history yet, recommendation is the target.
        assert_eq!(analytics.adaptive_bitrate_bps(), config.target_bitrate_bps);

        // Heavy loss drives it down but never below the floor.
        analytics.frame_sent(1, 1000, 10);
        analytics.packet_loss(1, 5);
        for _ in 0..100 {
            let rate = analytics.adaptive_bitrate_bps();
            assert!(rate >= config.min_bitrate_bps);
            assert!(rate <= config.max_bitrate_bps);
        }
        assert_eq!(analytics.adaptive_bitrate_bps(), config.min_bitrate_bps);
    }

    #[test]
    fn adaptive_bitrate_grows_without_loss() {
        let config = StreamConfig::default();
        let mut analytics = make_window();
        analytics.frame_sent(1, 1000, 100);

        let mut previous = analytics.adaptive_bitrate_bps();
        for _ in 0..100 {
            let rate = analytics.adaptive_bitrate_bps();
            assert!(rate >= previous);
            assert!(rate <= config.max_bitrate_bps);
            previous = rate;
        }
        assert_eq!(previous, config.max_bitrate_bps);
    }

    #[test]
    fn bandwidth_sample_history_is_bounded() {
        let mut analytics = make_window();
        for i in 0..250 {
            analytics.record_bandwidth_sample(i * 1000, 1.0);
        }
        assert!(analytics.bandwidth_samples.len() <= BANDWIDTH_SAMPLE_CAP);
    }

    #[test]
    fn reset_clears_everything() {
        let mut analytics = make_window();
        analytics.frame_sent(1, 1000, 3);
        analytics.packet_loss(1, 1);
        analytics.frame_received(1, 1000);
        analytics.adaptive_bitrate_bps();

        analytics.reset();
        assert_eq!(analytics.packets_sent(), 0);
        assert_eq!(analytics.packets_received(), 0);
        assert_eq!(analytics.packets_lost(), 0);
        assert_eq!(analytics.bytes_sent(), 0);
        assert_eq!(analytics.frame_loss_rate(), 0.0);
    }

    #[test]
    fn summary_reflects_counters() {
        let mut analytics = make_window();
        analytics.frame_sent(1, 2048, 2);
        analytics.frame_received(1, 2048);

        let summary = analytics.summary();
        assert_eq!(summary.packets_sent, 2);
        assert_eq!(summary.packets_received, 1);
        assert_eq!(summary.bytes_sent, 2048);
        assert_eq!(summary.bytes_received, 2048);
        assert!(summary.recommended_bitrate_bps > 0);
    }
}
