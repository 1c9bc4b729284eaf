//! Network transport: TCP control signaling and UDP media delivery.
//!
//! The protocol uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries the RTSP request/reply signaling. One
//!   blocking TCP connection per client, handled by its own thread.
//!
//! - **UDP** ([`udp`]): carries RTP media packets. The server binds a
//!   fresh send socket per PLAY and drops it on TEARDOWN; the client
//!   binds its advertised media port once per session, with a short read
//!   timeout so the receive loop can observe its stop signal.

pub mod tcp;
pub mod udp;

pub use udp::{MAX_DATAGRAM, MediaReceiver};
