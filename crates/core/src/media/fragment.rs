use std::collections::{BTreeMap, HashMap};

use bytes::{Bytes, BytesMut};

use crate::media::rtp::RTP_HEADER_SIZE;

/// Size of the fragmentation header in bytes.
pub const FRAGMENT_HEADER_SIZE: usize = 10;

const FLAG_MORE_FRAGMENTS: u8 = 0x01;

/// Application-level fragmentation header, carried in front of each piece
/// of a frame that exceeds the MTU.
///
/// ```text
/// B0      flags        bit 0: MORE_FRAGMENTS, bits 1..7 reserved
/// B1      fragment_id  frame identity modulo 256
/// B2..5   offset       byte offset of this piece within the frame
/// B6..9   frame_size   total size of the original frame
/// ```
///
/// Big-endian multibyte fields. All fragments of one frame share
/// `fragment_id` and `frame_size`; the fragment with MORE_FRAGMENTS clear
/// is the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub more_fragments: bool,
    pub fragment_id: u8,
    pub fragment_offset: u32,
    pub frame_size: u32,
}

impl FragmentHeader {
    pub fn encode(&self) -> [u8; FRAGMENT_HEADER_SIZE] {
        let mut header = [0u8; FRAGMENT_HEADER_SIZE];
        header[0] = if self.more_fragments {
            FLAG_MORE_FRAGMENTS
        } else {
            0
        };
        header[1] = self.fragment_id;
        header[2..6].copy_from_slice(&self.fragment_offset.to_be_bytes());
        header[6..10].copy_from_slice(&self.frame_size.to_be_bytes());
        header
    }

    /// Decode the first 10 bytes of `data`; `None` if it is too short.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < FRAGMENT_HEADER_SIZE {
            return None;
        }
        Some(Self {
            more_fragments: data[0] & FLAG_MORE_FRAGMENTS != 0,
            fragment_id: data[1],
            fragment_offset: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
            frame_size: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
        })
    }

    /// Whether this header can describe a fragment of `payload_len` bytes.
    ///
    /// The receive path uses this to tell a real fragmentation header from
    /// the first ten bytes of a raw single-packet JPEG: a fragment must
    /// fit inside the frame it claims to belong to.
    pub fn is_consistent_with(&self, payload_len: usize) -> bool {
        self.fragment_offset as u64 + payload_len as u64 <= self.frame_size as u64
    }
}

/// One piece of a fragmented frame, ready to be prefixed to an RTP payload.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub header: FragmentHeader,
    pub payload: Bytes,
}

/// Splits frames into sub-MTU fragments.
#[derive(Debug, Clone)]
pub struct Fragmenter {
    max_payload: usize,
}

impl Fragmenter {
    pub fn new(mtu: usize) -> Self {
        Self {
            max_payload: mtu - RTP_HEADER_SIZE - FRAGMENT_HEADER_SIZE,
        }
    }

    /// Largest payload a single fragment may carry.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Split `frame` into fragments whose offsets tile it contiguously.
    ///
    /// Every fragment carries `frame_id mod 256` and the full frame size;
    /// MORE_FRAGMENTS is set on all but the last. A frame that already
    /// fits yields exactly one tail fragment at offset 0. Payloads are
    /// zero-copy slices of `frame`.
    pub fn fragment_frame(&self, frame: &Bytes, frame_id: u64) -> Vec<Fragment> {
        let fragment_id = (frame_id % 256) as u8;
        let frame_size = frame.len() as u32;

        if frame.len() <= self.max_payload {
            return vec![Fragment {
                header: FragmentHeader {
                    more_fragments: false,
                    fragment_id,
                    fragment_offset: 0,
                    frame_size,
                },
                payload: frame.clone(),
            }];
        }

        let mut fragments = Vec::with_capacity(frame.len().div_ceil(self.max_payload));
        let mut offset = 0usize;
        while offset < frame.len() {
            let chunk_size = self.max_payload.min(frame.len() - offset);
            fragments.push(Fragment {
                header: FragmentHeader {
                    more_fragments: offset + chunk_size < frame.len(),
                    fragment_id,
                    fragment_offset: offset as u32,
                    frame_size,
                },
                payload: frame.slice(offset..offset + chunk_size),
            });
            offset += chunk_size;
        }

        tracing::trace!(
            frame_id = fragment_id,
            frame_bytes = frame.len(),
            fragments = fragments.len(),
            "frame fragmented"
        );

        fragments
    }
}

struct ReassemblyEntry {
    /// Offset → payload; sorted iteration gives the concatenation order.
    parts: BTreeMap<u32, Bytes>,
    frame_size: u32,
    has_tail: bool,
    created_tick: u64,
}

impl ReassemblyEntry {
    fn stored_bytes(&self) -> usize {
        self.parts.values().map(Bytes::len).sum()
    }
}

/// Order-free reassembly of fragmented frames, keyed by fragment id.
///
/// An entry is created on the first fragment for an id and destroyed
/// either on successful reassembly or by eviction: the id space is only
/// 8 bits wide and aliases under concurrent frames, so the table caps the
/// number of live entries and drops the oldest (by creation tick) when a
/// new frame would exceed it.
pub struct Reassembler {
    entries: HashMap<u8, ReassemblyEntry>,
    capacity: usize,
    tick: u64,
}

impl Reassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    /// Insert one fragment; returns the complete frame once the tail has
    /// arrived and the stored bytes cover the advertised frame size.
    ///
    /// Duplicate offsets overwrite. A fragment whose `frame_size`
    /// contradicts the entry it lands in is dropped (the entry is kept).
    pub fn add_fragment(&mut self, header: &FragmentHeader, payload: Bytes) -> Option<Bytes> {
        self.tick += 1;

        if let Some(entry) = self.entries.get(&header.fragment_id)
            && entry.frame_size != header.frame_size
        {
            tracing::debug!(
                fragment_id = header.fragment_id,
                expected = entry.frame_size,
                got = header.frame_size,
                "fragment contradicts reassembly entry, dropped"
            );
            return None;
        }

        if !self.entries.contains_key(&header.fragment_id) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        let entry = self
            .entries
            .entry(header.fragment_id)
            .or_insert_with(|| ReassemblyEntry {
                parts: BTreeMap::new(),
                frame_size: header.frame_size,
                has_tail: false,
                created_tick: self.tick,
            });

        entry.parts.insert(header.fragment_offset, payload);
        if !header.more_fragments {
            entry.has_tail = true;
        }

        if !(entry.has_tail && entry.stored_bytes() >= entry.frame_size as usize) {
            return None;
        }

        let entry = self.entries.remove(&header.fragment_id)?;
        let mut frame = BytesMut::with_capacity(entry.frame_size as usize);
        for part in entry.parts.values() {
            frame.extend_from_slice(part);
        }
        frame.truncate(entry.frame_size as usize);
        Some(frame.freeze())
    }

    /// Number of frames currently awaiting more fragments.
    pub fn pending_frames(&self) -> usize {
        self.entries.len()
    }

    /// Drop every incomplete entry.
    pub fn clear_incomplete(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "cleared incomplete reassembly entries");
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((&id, _)) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_tick)
        {
            self.entries.remove(&id);
            tracing::debug!(fragment_id = id, "evicted stale reassembly entry");
        }
    }
}
