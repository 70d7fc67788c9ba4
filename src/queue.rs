//! Bounded producer/consumer queue for `Capture` descriptors: one mutex,
//! single producer (the capture loop), many consumers (workers).
//!
//! No condition variable: an empty queue is a normal, frequent state, and
//! workers that find it empty sleep briefly and retry, matching the
//! original's `usleep(1)` idle poll. Capture-side backpressure is implicit
//! via radio sample pacing, not via blocking pushes.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::capture::Capture;

/// How long a worker sleeps after finding the queue empty before retrying.
pub const IDLE_POLL: Duration = Duration::from_micros(1);

pub struct CaptureQueue {
    inner: Mutex<VecDeque<Capture>>,
}

impl CaptureQueue {
    pub fn new() -> Self {
        Self { inner: Mutex::new(VecDeque::new()) }
    }

    pub fn push(&self, capture: Capture) {
        self.inner.lock().expect("capture queue mutex poisoned").push_back(capture);
    }

    pub fn pop(&self) -> Option<Capture> {
        self.inner.lock().expect("capture queue mutex poisoned").pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("capture queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CaptureQueue {
    fn default() -> Self {
        Self::new()
    }
}
