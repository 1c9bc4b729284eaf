use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::error::{Result, StreamError};

/// Size of the RTP fixed header in bytes.
pub const RTP_HEADER_SIZE: usize = 12;

/// Static RTP payload type for MJPEG video.
pub const MJPEG_PAYLOAD_TYPE: u8 = 26;

const RTP_VERSION: u8 = 2;

/// Minimal RTP packet (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// All multibyte fields are big-endian. Padding, extension, and CSRC
/// count are always 0 on the encode path; the timestamp is the wallclock
/// in whole seconds at encode time, and the SSRC is 0 — one media flow
/// per session, so no source disambiguation is needed.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    version: u8,
    padding: bool,
    extension: bool,
    csrc_count: u8,
    marker: bool,
    payload_type: u8,
    seq_num: u16,
    timestamp: u32,
    ssrc: u32,
    payload: Bytes,
}

impl RtpPacket {
    /// Build an MJPEG packet for the wire.
    ///
    /// Version 2, no padding/extension/CSRCs, marker clear, payload
    /// type 26, SSRC 0, timestamp = current wallclock seconds.
    pub fn new(seq_num: u16, payload: Bytes) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type: MJPEG_PAYLOAD_TYPE,
            seq_num,
            timestamp: wallclock_secs(),
            ssrc: 0,
            payload,
        }
    }

    /// Parse a packet from a received datagram.
    ///
    /// Anything shorter than the 12-byte fixed header is a hard error.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(StreamError::MalformedRtpHeader);
        }

        Ok(Self {
            version: data[0] >> 6,
            padding: data[0] & 0x20 != 0,
            extension: data[0] & 0x10 != 0,
            csrc_count: data[0] & 0x0f,
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7f,
            seq_num: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            payload: Bytes::copy_from_slice(&data[RTP_HEADER_SIZE..]),
        })
    }

    /// Serialize header and payload into one datagram-ready buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(RTP_HEADER_SIZE + self.payload.len());
        packet.push(
            (self.version << 6)
                | ((self.padding as u8) << 5)
                | ((self.extension as u8) << 4)
                | self.csrc_count,
        );
        packet.push(((self.marker as u8) << 7) | self.payload_type);
        packet.extend_from_slice(&self.seq_num.to_be_bytes());
        packet.extend_from_slice(&self.timestamp.to_be_bytes());
        packet.extend_from_slice(&self.ssrc.to_be_bytes());
        packet.extend_from_slice(&self.payload);
        packet
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn seq_num(&self) -> u16 {
        self.seq_num
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn payload_type(&self) -> u8 {
        self.payload_type
    }

    pub fn marker(&self) -> bool {
        self.marker
    }

    /// CSRC count from the first header byte.
    pub fn cc(&self) -> u8 {
        self.csrc_count
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total wire size: fixed header plus payload.
    pub fn packet_size(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }
}

fn wallclock_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_packet() -> RtpPacket {
        RtpPacket::new(7, Bytes::from_static(b"\xff\xd8 jpeg \xff\xd9"))
    }

    #[test]
    fn encode_decode_round_trip() {
        let packet = make_packet();
        let wire = packet.to_bytes();
        let decoded = RtpPacket::decode(&wire).unwrap();

        assert_eq!(decoded.version(), 2);
        assert_eq!(decoded.seq_num(), 7);
        assert_eq!(decoded.payload_type(), MJPEG_PAYLOAD_TYPE);
        assert!(!decoded.marker());
        assert_eq!(decoded.cc(), 0);
        assert_eq!(decoded.timestamp(), packet.timestamp());
        assert_eq!(decoded.payload(), packet.payload());
    }

    #[test]
    fn header_byte_layout() {
        let wire = make_packet().to_bytes();
        assert_eq!(wire[0] >> 6, 2);
        assert_eq!(wire[0] & 0x3f, 0); // no padding/extension/CSRCs
        assert_eq!(wire[1], MJPEG_PAYLOAD_TYPE); // marker clear
        assert_eq!(u16::from_be_bytes([wire[2], wire[3]]), 7);
        assert_eq!(u32::from_be_bytes([wire[8], wire[9], wire[10], wire[11]]), 0);
    }

    #[test]
    fn packet_size_is_header_plus_payload() {
        let packet = make_packet();
        assert_eq!(packet.packet_size(), RTP_HEADER_SIZE + packet.payload().len());
        assert_eq!(packet.to_bytes().len(), packet.packet_size());
    }

    #[test]
    fn decode_short_datagram_fails() {
        assert!(matches!(
            RtpPacket::decode(&[0u8; 11]),
            Err(StreamError::MalformedRtpHeader)
        ));
    }

    #[test]
    fn decode_empty_payload() {
        let wire = RtpPacket::new(1, Bytes::new()).to_bytes();
        assert_eq!(wire.len(), RTP_HEADER_SIZE);
        let decoded = RtpPacket::decode(&wire).unwrap();
        assert!(decoded.payload().is_empty());
    }
}
