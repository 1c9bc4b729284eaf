//! Error types for the streaming library.

use std::fmt;

/// Errors that can occur in the streaming library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Control protocol**: [`Parse`](Self::Parse) — malformed RTSP messages;
///   [`CseqMismatch`](Self::CseqMismatch) and
///   [`SessionMismatch`](Self::SessionMismatch) — a reply that does not
///   belong to the request the client last sent.
/// - **Media**: [`MediaOpen`](Self::MediaOpen) — the container file is
///   missing or unreadable (the server answers 404);
///   [`MalformedRtpHeader`](Self::MalformedRtpHeader) — a datagram shorter
///   than the 12-byte fixed header.
/// - **Transport**: [`Io`](Self::Io) — socket/network failures.
/// - **Server/client lifecycle**: [`ServerStatus`](Self::ServerStatus),
///   [`NotConnected`](Self::NotConnected),
///   [`AlreadyRunning`](Self::AlreadyRunning).
///
/// Inconsistent fragmentation headers are not represented here: the
/// receive path drops the offending fragment, keeps the reassembly entry,
/// and moves on. A method arriving in the wrong session state is answered
/// with a 200 no-op by protocol convention and is not an error either.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The MJPEG container file could not be opened.
    #[error("cannot open media file: {path}")]
    MediaOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse an RTSP control message.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A reply's CSeq does not echo the request the client last sent.
    #[error("reply CSeq {got} does not match request CSeq {expected}")]
    CseqMismatch { expected: u32, got: u32 },

    /// A reply names a session other than the one established on SETUP.
    #[error("reply session {got} does not match established session {expected}")]
    SessionMismatch { expected: u32, got: u32 },

    /// The server answered with a non-200 status.
    #[error("server replied {code} {text}")]
    ServerStatus { code: u16, text: String },

    /// A media datagram shorter than the 12-byte RTP fixed header.
    #[error("RTP datagram shorter than the 12-byte header")]
    MalformedRtpHeader,

    /// A control operation was attempted before the connection existed.
    #[error("control connection not established")]
    NotConnected,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request or status line).
    EmptyMessage,
    /// Request line did not have the expected `METHOD filename RTSP/1.0` format.
    InvalidRequestLine,
    /// The request line names a method outside SETUP/PLAY/PAUSE/TEARDOWN.
    UnknownMethod,
    /// Status line did not have the expected `RTSP/1.0 code text` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// A reply arrived without a CSeq header.
    MissingCseq,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::UnknownMethod => write!(f, "unknown method"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::MissingCseq => write!(f, "missing CSeq header"),
        }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;
