//! RTSP control protocol: requests, replies, and the server-side method
//! handler.
//!
//! The control channel carries ASCII messages with LF-separated lines and
//! no blank-line terminator — one message per socket read:
//!
//! ```text
//! SETUP movie.mjpeg RTSP/1.0
//! CSeq: 1
//! Transport: RTP/UDP; client_port=25000
//! Resolution: 1080p
//! ```
//!
//! ```text
//! RTSP/1.0 200 OK
//! CSeq: 1
//! Session: 123456
//! HD-Mode: 1080p
//! ```
//!
//! Unknown headers are ignored, and header order after the first line is
//! free: both sides look headers up by name, case-insensitively.
//!
//! ## Methods
//!
//! | Method | Purpose |
//! |--------|---------|
//! | SETUP | Resolve the media file, allocate a session, register the client's media port |
//! | PLAY | Start the media pump |
//! | PAUSE | Suspend the media pump |
//! | TEARDOWN | Destroy the session and close the media socket |

pub mod handler;
pub mod request;
pub mod response;

pub use handler::SessionHandler;
pub use request::{Method, RtspRequest};
pub use response::RtspReply;
