use std::fmt;

use crate::error::{ParseErrorKind, Result, StreamError};
use crate::media::mjpeg::Resolution;

/// The four control methods of the streaming protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
        }
    }

    fn parse(token: &str) -> Option<Self> {
        match token {
            "SETUP" => Some(Self::Setup),
            "PLAY" => Some(Self::Play),
            "PAUSE" => Some(Self::Pause),
            "TEARDOWN" => Some(Self::Teardown),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A control request, parsed from or serialized to its text form.
///
/// ```text
/// <METHOD> <filename> RTSP/1.0
/// CSeq: <n>
/// <further headers>
/// ```
///
/// Headers are stored as ordered `(name, value)` pairs; lookups are
/// case-insensitive.
#[derive(Debug)]
pub struct RtspRequest {
    pub method: Method,
    pub filename: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl RtspRequest {
    pub fn new(method: Method, filename: &str) -> Self {
        Self {
            method,
            filename: filename.to_string(),
            version: "RTSP/1.0".to_string(),
            headers: Vec::new(),
        }
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to the wire form: LF-separated, no trailing terminator.
    pub fn serialize(&self) -> String {
        let mut request = format!("{} {} {}", self.method, self.filename, self.version);
        for (name, value) in &self.headers {
            request.push_str(&format!("\n{}: {}", name, value));
        }
        request
    }

    /// Parse one control message.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let request_line = lines.next().filter(|l| !l.trim().is_empty()).ok_or(
            StreamError::Parse {
                kind: ParseErrorKind::EmptyMessage,
            },
        )?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(StreamError::Parse {
                kind: ParseErrorKind::InvalidRequestLine,
            });
        }

        let method = Method::parse(parts[0]).ok_or(StreamError::Parse {
            kind: ParseErrorKind::UnknownMethod,
        })?;
        let filename = parts[1].to_string();
        let version = parts[2].to_string();

        if version != "RTSP/1.0" {
            tracing::warn!(version, "client sent non-RTSP/1.0 version");
        }

        let mut headers = Vec::new();
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let colon_pos = line.find(':').ok_or(StreamError::Parse {
                kind: ParseErrorKind::InvalidHeader,
            })?;
            headers.push((
                line[..colon_pos].trim().to_string(),
                line[colon_pos + 1..].trim().to_string(),
            ));
        }

        Ok(Self {
            method,
            filename,
            version,
            headers,
        })
    }

    /// Look up a header value by name, case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The CSeq header, numbering request/reply pairs.
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// The media port advertised in `Transport: RTP/UDP; client_port=<p>`.
    pub fn client_port(&self) -> Option<u16> {
        let transport = self.get_header("Transport")?;
        let after = transport.split("client_port=").nth(1)?;
        after
            .trim()
            .split(|c: char| !c.is_ascii_digit())
            .next()?
            .parse()
            .ok()
    }

    /// The session id from the `Session` header.
    pub fn session(&self) -> Option<u32> {
        self.get_header("Session")?.trim().parse().ok()
    }

    /// The requested resolution from the `Resolution` header.
    pub fn resolution(&self) -> Option<Resolution> {
        Resolution::parse(self.get_header("Resolution")?)
    }
}
