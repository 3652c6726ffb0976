// Accumulate-until-N primitive shared by every format reader.
//
// A reader asks for `target` contiguous bytes. If the caller's input already
// holds them and nothing is buffered, the bytes are handed back in place
// without copying and without being consumed. Otherwise input is copied into
// the accumulator until the target is reached.

use tracing::trace;

/// Result of [`GatherBuffer::gather`]
#[derive(Debug, PartialEq, Eq)]
pub enum Gather<'a> {
    /// The target is available in the caller's input. Nothing was consumed:
    /// the caller advances past the span itself once it is done with it.
    Borrowed(&'a [u8]),
    /// The target was reached in the accumulator. The bytes that completed it
    /// were consumed from the input.
    Buffered(&'a [u8]),
    /// All input was consumed and the target is still not reached
    Pending,
}

#[derive(Debug, Default)]
pub struct GatherBuffer {
    buf: Vec<u8>,
    target: usize,
    satisfied: bool,
}

impl GatherBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GatherBuffer { buf: Vec::with_capacity(capacity), target: 0, satisfied: false }
    }

    /// Start a new gather of `target` bytes, dropping anything buffered
    pub fn begin(&mut self, target: usize) {
        self.buf.clear();
        self.target = target;
        self.satisfied = false;
    }

    /// Feed input toward the target. Returns the number of input bytes
    /// consumed alongside the outcome.
    pub fn gather<'a>(&'a mut self, input: &'a [u8]) -> (usize, Gather<'a>) {
        if self.satisfied {
            // The previous gather was handed out; start over with the same target
            self.buf.clear();
            self.satisfied = false;
        }

        if self.buf.is_empty() && input.len() >= self.target {
            return (0, Gather::Borrowed(&input[..self.target]));
        }

        let take = (self.target - self.buf.len()).min(input.len());
        self.buf.extend_from_slice(&input[..take]);
        trace!(buffered = self.buf.len(), target = self.target, "gather");

        if self.buf.len() == self.target {
            self.satisfied = true;
            (take, Gather::Buffered(&self.buf))
        } else {
            (take, Gather::Pending)
        }
    }

    /// Bytes currently held in the accumulator
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append bytes without checking the target
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn reset(&mut self) {
        self.begin(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_target_in_input_is_borrowed() {
        let mut g = GatherBuffer::new();
        g.begin(4);
        let input = b"abcdef";
        let (consumed, out) = g.gather(input);
        assert_eq!(consumed, 0);
        assert_eq!(out, Gather::Borrowed(b"abcd"));
        assert!(g.is_empty());
    }

    #[test]
    fn split_target_is_accumulated() {
        let mut g = GatherBuffer::new();
        g.begin(5);
        let (consumed, out) = g.gather(b"ab");
        assert_eq!((consumed, out), (2, Gather::Pending));
        let (consumed, out) = g.gather(b"cdefg");
        assert_eq!(consumed, 3);
        assert_eq!(out, Gather::Buffered(b"abcde"));
    }

    #[test]
    fn empty_input_makes_no_progress() {
        let mut g = GatherBuffer::new();
        g.begin(3);
        assert_eq!(g.gather(b""), (0, Gather::Pending));
        assert_eq!(g.buffered(), 0);
    }

    #[test]
    fn satisfied_gather_resets_on_next_call() {
        let mut g = GatherBuffer::new();
        g.begin(2);
        g.gather(b"a");
        assert!(matches!(g.gather(b"b"), (1, Gather::Buffered(b"ab"))));
        // Same target again, accumulator starts fresh
        assert_eq!(g.gather(b"c"), (1, Gather::Pending));
        assert_eq!(g.bytes(), b"c");
    }

    #[test]
    fn pushed_prefix_is_completed_from_input() {
        let mut g = GatherBuffer::new();
        g.begin(4);
        g.push(b"x");
        // Buffered bytes force a copy even when the input covers the target
        assert_eq!(g.gather(b"yzw!"), (3, Gather::Buffered(b"xyzw")));
    }
}
