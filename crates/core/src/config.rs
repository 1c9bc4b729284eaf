//! Runtime configuration shared by server and client.

use crate::media::fragment::FRAGMENT_HEADER_SIZE;
use crate::media::rtp::RTP_HEADER_SIZE;

/// Tunables for one streaming endpoint.
///
/// Both [`Server`](crate::Server) and [`Client`](crate::Client) take a
/// config at construction; there is no global state. The defaults
/// reproduce standard Ethernet framing and a ~30 fps display cadence.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Link MTU in bytes. Bounds a single datagram: RTP header (12) +
    /// fragmentation header (10) + payload.
    pub mtu: usize,
    /// Maximum number of partially reassembled frames kept at once.
    /// The 8-bit fragment identifier wraps quickly at HD rates, so the
    /// table must stay bounded; the oldest entry is evicted on overflow.
    pub reassembly_capacity: usize,
    /// Client pre-buffer depth: frames accumulated before display starts.
    pub queue_depth: usize,
    /// Number of frames retained in the analytics window.
    pub analytics_window: usize,
    /// Adaptive-bitrate seed when no loss history exists yet.
    pub target_bitrate_bps: u64,
    /// Adaptive-bitrate floor.
    pub min_bitrate_bps: u64,
    /// Adaptive-bitrate ceiling.
    pub max_bitrate_bps: u64,
    /// Display ticker period (33 ms ≈ 30 fps).
    pub display_interval_ms: u64,
    /// Read timeout on the client's media socket, so the receive loop can
    /// observe the stop signal.
    pub media_recv_timeout_ms: u64,
    /// How long the server pump waits on its stop signal per iteration.
    pub pump_stop_poll_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mtu: 1500,
            reassembly_capacity: 64,
            queue_depth: 3,
            analytics_window: 300,
            target_bitrate_bps: 5_000_000,
            min_bitrate_bps: 500_000,
            max_bitrate_bps: 25_000_000,
            display_interval_ms: 33,
            media_recv_timeout_ms: 500,
            pump_stop_poll_ms: 50,
        }
    }
}

impl StreamConfig {
    /// Largest fragment payload that fits one datagram under this MTU.
    ///
    /// `mtu − 12 − 10`; 1478 bytes at the default MTU of 1500.
    pub fn max_fragment_payload(&self) -> usize {
        self.mtu - RTP_HEADER_SIZE - FRAGMENT_HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_fragment_payload() {
        let config = StreamConfig::default();
        assert_eq!(config.max_fragment_payload(), 1478);
    }
}
