use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{Result, StreamError};

const READ_CHUNK: usize = 4096;
const SOI: [u8; 2] = [0xff, 0xd8];
const EOI: [u8; 2] = [0xff, 0xd9];

/// HD resolution presets negotiated via the `Resolution` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hd720,
    Hd1080,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Hd720 => (1280, 720),
            Self::Hd1080 => (1920, 1080),
        }
    }

    /// Header value as it appears on the wire.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }

    /// Parse a `Resolution` header value.
    pub fn parse(value: &str) -> Option<Self> {
        if value.contains("1080") {
            Some(Self::Hd1080)
        } else if value.contains("720") {
            Some(Self::Hd720)
        } else {
            None
        }
    }
}

/// Cursor over an MJPEG container file.
///
/// Produces complete JPEG images by scanning for the `FFD8`/`FFD9`
/// start/end markers, reading the file in 4 KiB chunks into an internal
/// buffer. Unconsumed bytes are retained across reads; the buffer never
/// holds a complete image that has not been emitted.
pub struct MjpegStream {
    file: File,
    buffer: Vec<u8>,
    frame_count: u64,
    total_bytes: u64,
    file_size: u64,
    file_pos: u64,
    started: Instant,
    resolution: Option<Resolution>,
    fps: u32,
}

impl MjpegStream {
    /// Open a standard-definition stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_inner(path.as_ref(), None, 30)
    }

    /// Open an HD stream with explicit resolution metadata.
    pub fn open_hd<P: AsRef<Path>>(path: P, resolution: Resolution, fps: u32) -> Result<Self> {
        Self::open_inner(path.as_ref(), Some(resolution), fps)
    }

    fn open_inner(path: &Path, resolution: Option<Resolution>, fps: u32) -> Result<Self> {
        let file = File::open(path).map_err(|source| StreamError::MediaOpen {
            path: path.display().to_string(),
            source,
        })?;
        let file_size = file
            .metadata()
            .map_err(|source| StreamError::MediaOpen {
                path: path.display().to_string(),
                source,
            })?
            .len();

        tracing::debug!(path = %path.display(), file_size, ?resolution, "media stream opened");

        Ok(Self {
            file,
            buffer: Vec::new(),
            frame_count: 0,
            total_bytes: 0,
            file_size,
            file_pos: 0,
            started: Instant::now(),
            resolution,
            fps,
        })
    }

    /// Next complete JPEG image, or `None` at end of stream.
    ///
    /// Scans forward for the next end marker, refilling the buffer in
    /// 4 KiB reads. The emitted frame starts at the first start marker
    /// before that end marker; any leading junk is discarded. A trailing
    /// truncated image (end of file before an end marker) is silently
    /// dropped.
    pub fn next_frame(&mut self) -> std::io::Result<Option<Bytes>> {
        loop {
            let end = loop {
                if let Some(pos) = find_marker(&self.buffer, &EOI) {
                    break pos;
                }
                let mut chunk = [0u8; READ_CHUNK];
                let n = self.file.read(&mut chunk)?;
                if n == 0 {
                    return Ok(None);
                }
                self.file_pos += n as u64;
                self.buffer.extend_from_slice(&chunk[..n]);
            };

            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            match find_marker(&raw, &SOI) {
                Some(start) => {
                    let frame = Bytes::copy_from_slice(&raw[start..]);
                    self.frame_count += 1;
                    self.total_bytes += frame.len() as u64;
                    return Ok(Some(frame));
                }
                None => {
                    // Stray end marker with no start before it: skip it
                    // and keep scanning.
                    tracing::trace!(discarded = raw.len(), "no start marker before end marker");
                }
            }
        }
    }

    /// Number of frames emitted so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_count
    }

    pub fn total_bytes_read(&self) -> u64 {
        self.total_bytes
    }

    pub fn stream_duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emitted bytes over elapsed wallclock, in Mbps.
    pub fn current_bitrate_mbps(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        (self.total_bytes as f64 * 8.0) / elapsed / 1e6
    }

    /// Position within the container file as a percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.file_size == 0 {
            return 0.0;
        }
        self.file_pos as f64 / self.file_size as f64 * 100.0
    }

    /// Rewind to the start of the container, resetting the scan buffer
    /// and all counters. Arbitrary seek targets are not supported.
    pub fn rewind(&mut self) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.buffer.clear();
        self.frame_count = 0;
        self.total_bytes = 0;
        self.file_pos = 0;
        self.started = Instant::now();
        Ok(())
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|window| window == marker)
}
