use crate::error::{ParseErrorKind, Result, StreamError};

/// A control reply, built by the server and parsed by the client.
///
/// ```text
/// RTSP/1.0 <code> <text>
/// CSeq: <n>
/// Session: <id>
/// [HD-Mode: 1080p]
/// ```
///
/// Uses a builder pattern — chain [`add_header`](Self::add_header), then
/// call [`serialize`](Self::serialize). The client parses headers by name
/// rather than by position, so their order is free.
#[must_use]
#[derive(Debug)]
pub struct RtspReply {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
}

impl RtspReply {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        Self {
            status_code,
            status_text: status_text.to_string(),
            headers: Vec::new(),
        }
    }

    /// 200 OK — the request took effect (or was a harmless no-op).
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// 404 Not Found — the media file does not exist or is unreadable.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// 500 Connection Error — the server could not set up media delivery.
    pub fn connection_error() -> Self {
        Self::new(500, "Connection Error")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize to the wire form: LF-separated, no trailing terminator.
    pub fn serialize(&self) -> String {
        let mut reply = format!("RTSP/1.0 {} {}", self.status_code, self.status_text);
        for (name, value) in &self.headers {
            reply.push_str(&format!("\n{}: {}", name, value));
        }
        reply
    }

    /// Parse one reply message.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let status_line = lines.next().filter(|l| !l.trim().is_empty()).ok_or(
            StreamError::Parse {
                kind: ParseErrorKind::EmptyMessage,
            },
        )?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        let code = parts.next().and_then(|c| c.parse::<u16>().ok());
        let (Some(status_code), true) = (code, version.starts_with("RTSP/")) else {
            return Err(StreamError::Parse {
                kind: ParseErrorKind::InvalidStatusLine,
            });
        };
        let status_text = parts.next().unwrap_or("").trim().to_string();

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
            status_code,
            status_text,
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

    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq")?.trim().parse().ok()
    }

    pub fn session(&self) -> Option<u32> {
        self.get_header("Session")?.trim().parse().ok()
    }

    /// The `HD-Mode` header value, present on replies of HD sessions.
    pub fn hd_mode(&self) -> Option<&str> {
        self.get_header("HD-Mode")
    }
}
