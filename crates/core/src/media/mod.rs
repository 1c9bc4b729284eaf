//! Media plane: RTP packet codec, frame fragmentation, MJPEG extraction.
//!
//! Each UDP datagram on the media channel is one RTP packet
//! ([`rtp::RtpPacket`]): a 12-byte fixed header followed by an opaque
//! payload. The payload is either
//!
//! - a complete JPEG frame (frames that fit under the MTU are sent raw,
//!   with no extra framing), or
//! - a 10-byte fragmentation header ([`fragment::FragmentHeader`])
//!   followed by one piece of a larger frame.
//!
//! The receiver tells the two apart by payload length and header
//! self-consistency; this asymmetry is a wire contract, not an
//! optimization. Fragments of one frame may arrive in any order —
//! [`fragment::Reassembler`] is order-free and only needs the tail
//! fragment to declare a frame complete.
//!
//! Frames come out of an MJPEG container scanned for JPEG start/end
//! markers by [`mjpeg::MjpegStream`].

pub mod fragment;
pub mod mjpeg;
pub mod rtp;
