// Hybrid sample-to-offset seek resolution shared by every seekable format.
//
// The engine never touches the source. Each step hands back either the
// resolved offset or a byte offset to read from next; the caller finds the
// first frame at or after that offset and reports it with
// `SeekEngine::on_frame` (or `SeekEngine::on_miss` if there is none).
//
// Between the bounds the next offset is estimated by linear interpolation,
// which converges in one or two steps on constant-bitrate content. With
// `force_binary_search`, or when the caller declares the model unreliable,
// the byte range is bisected instead.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A known `(sample, byte offset)` pair. `offset` is where the frame that
/// starts at `sample` begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekPoint {
    pub sample: u64,
    pub offset: u64,
}

impl SeekPoint {
    pub fn new(sample: u64, offset: u64) -> Self {
        SeekPoint { sample, offset }
    }
}

/// A frame found by the caller after repositioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// First sample of the frame, when the format can tell
    pub start: Option<u64>,
    /// One past the last sample of the frame
    pub end: u64,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SeekFlags {
    pub force_binary_search: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekStep {
    /// Read from this absolute offset and report the first frame found there
    Seek(u64),
    /// Decoding should resume at this absolute offset
    Resolved(u64),
}

#[derive(Debug, Clone)]
pub struct SeekEngine {
    target: u64,
    lo: SeekPoint,
    hi: SeekPoint,
    flags: SeekFlags,
    reliable: bool,
    requested: u64,
    iterations: u32,
    max_iterations: u32,
}

impl SeekEngine {
    /// `lo` must be a frame boundary at or before `target`, `hi` a point past it.
    pub fn new(target: u64, lo: SeekPoint, hi: SeekPoint, flags: SeekFlags) -> Result<Self> {
        if hi.offset <= lo.offset || hi.sample <= lo.sample {
            return Err(Error::Unseekable("empty seek range"));
        }
        if target < lo.sample || target >= hi.sample {
            return Err(Error::Unseekable("target outside the stream"));
        }
        Ok(SeekEngine {
            target,
            lo,
            hi,
            flags,
            reliable: true,
            requested: lo.offset,
            iterations: 0,
            max_iterations: 64,
        })
    }

    /// Declare the linear model unreliable (e.g. VBR without a seek table)
    pub fn unreliable(mut self) -> Self {
        self.reliable = false;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// First step. `current` is the frame being decoded, if any; it can
    /// resolve the seek immediately or tighten the bounds.
    pub fn start(&mut self, current: Option<Frame>) -> Result<SeekStep> {
        if let Some(frame) = current {
            if let Some(step) = self.narrow(frame) {
                return Ok(step);
            }
        }
        self.next_request()
    }

    /// Report the first frame found at or after the last requested offset
    pub fn on_frame(&mut self, frame: Frame) -> Result<SeekStep> {
        debug!(
            target = self.target,
            start = ?frame.start,
            end = frame.end,
            offset = frame.offset,
            lo = self.lo.offset,
            hi = self.hi.offset,
            "seek probe"
        );
        if frame.offset >= self.hi.offset {
            // Nothing starts between the request and the upper bound
            self.hi.offset = self.requested;
        } else if let Some(step) = self.narrow(frame) {
            return Ok(step);
        }
        self.next_request()
    }

    /// Report that no frame exists between the last request and the end
    pub fn on_miss(&mut self) -> Result<SeekStep> {
        self.hi.offset = self.requested;
        self.next_request()
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn narrow(&mut self, frame: Frame) -> Option<SeekStep> {
        // A frame starting exactly at the lower bound starts at its sample
        let start = frame.start.or((frame.offset == self.lo.offset).then_some(self.lo.sample));

        if let Some(start) = start {
            if start <= self.target && self.target < frame.end {
                return Some(SeekStep::Resolved(frame.offset));
            }
        }

        if frame.end <= self.target {
            let end = frame.offset + frame.size;
            if end > self.lo.offset {
                self.lo = SeekPoint::new(frame.end, end);
            }
        } else {
            let sample = start.unwrap_or(frame.end).min(self.hi.sample);
            if frame.offset < self.hi.offset {
                self.hi = SeekPoint::new(sample.max(self.lo.sample + 1), frame.offset);
            }
        }
        None
    }

    fn next_request(&mut self) -> Result<SeekStep> {
        if self.hi.offset <= self.lo.offset {
            // The frame starting at the lower bound is the only candidate left
            if self.lo.sample <= self.target && self.target < self.hi.sample {
                return Ok(SeekStep::Resolved(self.lo.offset));
            }
            return Err(Error::SeekCollapsed { target: self.target, offset: self.lo.offset });
        }
        if self.iterations >= self.max_iterations {
            return Err(Error::SeekCollapsed { target: self.target, offset: self.lo.offset });
        }
        self.iterations += 1;

        let span = self.hi.offset - self.lo.offset;
        let offset = if self.flags.force_binary_search || !self.reliable {
            self.lo.offset + span / 2
        } else {
            let samples = self.hi.sample.saturating_sub(self.lo.sample).max(1) as u128;
            let into = self.target.saturating_sub(self.lo.sample) as u128;
            let estimate = self.lo.offset + (into * span as u128 / samples) as u64;
            estimate.clamp(self.lo.offset, self.hi.offset - 1)
        };
        self.requested = offset;
        Ok(SeekStep::Seek(offset))
    }
}
