use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

/// What a push did, as seen by the receive thread.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// Frame buffered; display already running or still pre-buffering.
    Buffered,
    /// This push filled the pre-buffer: the caller must start the
    /// display ticker.
    StartDisplay,
}

struct Inner {
    frames: VecDeque<Bytes>,
    display_started: bool,
}

/// Bounded FIFO between the receive thread and the display ticker.
///
/// Holds at most `capacity` reassembled frames; a push onto a full queue
/// drops the oldest frame first. The `display_started` latch fires once,
/// when a push brings the queue up to capacity, and is re-armed by
/// [`reset`](Self::reset) so the next playback pre-buffers again.
///
/// The mutex is held only across O(1) operations — never during I/O.
pub(crate) struct FrameQueue {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                frames: VecDeque::new(),
                display_started: false,
            }),
        }
    }

    pub fn push(&self, frame: Bytes) -> PushOutcome {
        let mut inner = self.inner.lock();
        if inner.frames.len() >= self.capacity {
            inner.frames.pop_front();
        }
        inner.frames.push_back(frame);

        if inner.frames.len() == self.capacity && !inner.display_started {
            inner.display_started = true;
            return PushOutcome::StartDisplay;
        }
        PushOutcome::Buffered
    }

    pub fn pop(&self) -> Option<Bytes> {
        self.inner.lock().frames.pop_front()
    }

    /// Drop all frames and re-arm the pre-buffer latch.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.frames.clear();
        inner.display_started = false;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    #[cfg(test)]
    pub fn display_started(&self) -> bool {
        self.inner.lock().display_started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8) -> Bytes {
        Bytes::copy_from_slice(&[tag; 4])
    }

    #[test]
    fn latch_fires_when_prebuffer_fills() {
        let queue = FrameQueue::new(3);
        assert_eq!(queue.push(frame(1)), PushOutcome::Buffered);
        assert_eq!(queue.push(frame(2)), PushOutcome::Buffered);
        assert_eq!(queue.push(frame(3)), PushOutcome::StartDisplay);
        assert!(queue.display_started());
    }

    #[test]
    fn latch_fires_only_once() {
        let queue = FrameQueue::new(3);
        for tag in 0..3 {
            queue.push(frame(tag));
        }
        assert_eq!(queue.push(frame(9)), PushOutcome::Buffered);
    }

    #[test]
    fn overflow_drops_oldest() {
        let queue = FrameQueue::new(3);
        for tag in 1..=4 {
            queue.push(frame(tag));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(frame(2)));
        assert_eq!(queue.pop(), Some(frame(3)));
        assert_eq!(queue.pop(), Some(frame(4)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn reset_rearms_the_latch() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));
        queue.push(frame(2));
        queue.reset();

        assert_eq!(queue.len(), 0);
        assert!(!queue.display_started());
        queue.push(frame(3));
        assert_eq!(queue.push(frame(4)), PushOutcome::StartDisplay);
    }
}
