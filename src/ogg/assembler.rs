// Packet reassembly from consecutive pages of one logical stream

use std::ops::Range;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::ogg::page::PageHeader;
use crate::ogg::MAX_SEGMENTS;

/// A packet finished by the current page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssembledPacket<'a> {
    pub data: &'a [u8],
    /// Page granule, set only on the last packet finishing on the page
    pub granule: Option<u64>,
    /// First packet of a beginning-of-stream page
    pub bos: bool,
    /// Last packet of an end-of-stream page
    pub eos: bool,
}

/// Where the bytes of a finished packet are
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanLocation {
    /// Range of the page body
    Body(Range<usize>),
    /// Joined from fragments of several pages and held by the assembler
    Joined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSpan {
    pub location: SpanLocation,
    pub granule: Option<u64>,
    pub bos: bool,
    pub eos: bool,
}

/// Index-based counterpart of [`Assembled`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Split {
    Packet(PacketSpan),
    NeedContinuation,
    NoMorePackets,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Assembled<'a> {
    Complete(AssembledPacket<'a>),
    /// The page ended inside a packet; its bytes are buffered until the next page
    NeedContinuation,
    NoMorePackets,
}

/// Splits page bodies into packets and glues packets that span pages.
///
/// The assembler owns only the lacing table and the partial-packet
/// accumulator. Page bodies are passed in on every call so they can live in
/// the caller's input or in a demuxer-owned buffer.
#[derive(Debug)]
pub struct PacketAssembler {
    segments: [u8; MAX_SEGMENTS],
    segment_count: usize,
    segment_cursor: usize,
    body_cursor: usize,
    last_terminal: Option<usize>,
    granule: Option<u64>,
    bos: bool,
    eos: bool,
    completed_on_page: usize,

    partial: Vec<u8>,
    pending: bool,
    partial_handed_out: bool,
    resync: bool,
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketAssembler {
    pub fn new() -> Self {
        PacketAssembler {
            segments: [0; MAX_SEGMENTS],
            segment_count: 0,
            segment_cursor: 0,
            body_cursor: 0,
            last_terminal: None,
            granule: None,
            bos: false,
            eos: false,
            completed_on_page: 0,
            partial: Vec::new(),
            pending: false,
            partial_handed_out: false,
            resync: false,
        }
    }

    /// Make the next page current.
    ///
    /// A page whose continuation flag disagrees with the pending state is
    /// rejected with `Continuation`; the assembler then drops its partial
    /// packet and skips leading fragments until a page starts a fresh packet.
    pub fn load_page(&mut self, header: &PageHeader) -> Result<()> {
        self.release_partial();
        let continued = header.is_continued();

        if !self.resync && continued != self.pending {
            let err = Error::Continuation { flag: continued, pending: self.pending };
            warn!(sequence = header.page_sequence, %err, "continuation desync");
            self.drop_partial();
            self.resync = true;
            self.segment_count = 0;
            self.segment_cursor = 0;
            return Err(err);
        }

        let table = header.segment_table();
        self.segments[..table.len()].copy_from_slice(table);
        self.segment_count = table.len();
        self.segment_cursor = 0;
        self.body_cursor = 0;
        self.last_terminal = table.iter().rposition(|&v| v < 255);
        self.granule = header.granule();
        self.bos = header.is_bos();
        self.eos = header.is_eos();
        self.completed_on_page = 0;

        if self.resync {
            if continued {
                self.skip_leading_fragment();
            } else {
                self.resync = false;
            }
        }
        Ok(())
    }

    /// Next packet of the current page.
    ///
    /// `body` is the unread remainder of the page body and `base` its offset
    /// within the body, which must equal [`body_cursor`](Self::body_cursor).
    pub fn next_packet<'a>(&'a mut self, body: &'a [u8], base: usize) -> Assembled<'a> {
        match self.next_span(body, base) {
            Split::Packet(span) => {
                let data = self.span_data(&span, body, base);
                Assembled::Complete(AssembledPacket { data, granule: span.granule, bos: span.bos, eos: span.eos })
            }
            Split::NeedContinuation => Assembled::NeedContinuation,
            Split::NoMorePackets => Assembled::NoMorePackets,
        }
    }

    /// Like [`next_packet`](Self::next_packet), but reports where the packet
    /// lives instead of borrowing it. Resolve it with [`span_data`](Self::span_data).
    pub fn next_span(&mut self, body: &[u8], base: usize) -> Split {
        self.release_partial();
        if self.segment_cursor == self.segment_count {
            return Split::NoMorePackets;
        }

        let start = self.body_cursor;
        let mut len = 0usize;
        let mut terminated = false;
        while self.segment_cursor < self.segment_count {
            let value = self.segments[self.segment_cursor];
            self.segment_cursor += 1;
            len += value as usize;
            if value < 255 {
                terminated = true;
                break;
            }
        }
        self.body_cursor += len;

        let Some(fragment) = start.checked_sub(base).and_then(|at| body.get(at..at + len)) else {
            warn!(start, len, available = body.len(), "page body shorter than its lacing table");
            self.segment_cursor = self.segment_count;
            return Split::NoMorePackets;
        };

        if !terminated {
            self.partial.extend_from_slice(fragment);
            self.pending = true;
            debug!(buffered = self.partial.len(), "packet continues on next page");
            return Split::NeedContinuation;
        }

        let terminal = self.segment_cursor - 1;
        let last_on_page = Some(terminal) == self.last_terminal;
        let bos = self.bos && self.completed_on_page == 0;
        self.completed_on_page += 1;
        let granule = if last_on_page { self.granule } else { None };
        let eos = self.eos && last_on_page;

        let location = if self.pending {
            self.partial.extend_from_slice(fragment);
            self.pending = false;
            self.partial_handed_out = true;
            SpanLocation::Joined
        } else {
            SpanLocation::Body(start..start + len)
        };
        Split::Packet(PacketSpan { location, granule, bos, eos })
    }

    /// Bytes of a packet returned by the latest [`next_span`](Self::next_span)
    /// call. `body` and `base` describe the same page body window.
    pub fn span_data<'a>(&'a self, span: &PacketSpan, body: &'a [u8], base: usize) -> &'a [u8] {
        match &span.location {
            SpanLocation::Joined => &self.partial,
            SpanLocation::Body(range) => {
                body.get(range.start.saturating_sub(base)..range.end.saturating_sub(base)).unwrap_or_default()
            }
        }
    }

    /// Bytes of the current page body consumed so far
    pub fn body_cursor(&self) -> usize {
        self.body_cursor
    }

    /// A packet is open and waits for a continued page
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Forget all state and skip leading fragments until a page starts
    /// a fresh packet. Used after the source was repositioned.
    pub fn reset(&mut self) {
        self.drop_partial();
        self.segment_count = 0;
        self.segment_cursor = 0;
        self.body_cursor = 0;
        self.resync = true;
    }

    /// Drop the open packet after data loss (a sequence gap)
    pub fn mark_hole(&mut self) {
        if self.pending {
            debug!(dropped = self.partial.len(), "dropping partial packet across a hole");
        }
        self.drop_partial();
        self.resync = true;
    }

    fn skip_leading_fragment(&mut self) {
        while self.segment_cursor < self.segment_count {
            let value = self.segments[self.segment_cursor];
            self.segment_cursor += 1;
            self.body_cursor += value as usize;
            if value < 255 {
                self.resync = false;
                break;
            }
        }
        debug!(skipped = self.body_cursor, still_skipping = self.resync, "skipped orphan fragment");
    }

    fn release_partial(&mut self) {
        if self.partial_handed_out {
            self.partial.clear();
            self.partial_handed_out = false;
        }
    }

    fn drop_partial(&mut self) {
        self.partial.clear();
        self.pending = false;
        self.partial_handed_out = false;
    }
}
