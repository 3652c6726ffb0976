// Page writer: packet lacing, page batching and in-place header stamping

use std::mem;

use tracing::debug;

use crate::error::{Error, Result};
use crate::ogg::page::PageHeader;
use crate::ogg::{
    crc, CRC_FIELD, HEADER_MAX, MAX_SEGMENTS, NO_GRANULE, OGG_HEADER_TYPE_BOS,
    OGG_HEADER_TYPE_CONTINUATION, OGG_HEADER_TYPE_EOS,
};
use crate::utils::io::put_le_u32;

/// What happens after a packet is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PacketEnd {
    /// Keep batching packets into the current page
    #[default]
    Normal,
    /// Flush the page after this packet
    EndPage,
    /// Flush the page and mark it as the last of the stream
    EndStream,
}

/// Lacing values for a packet of `len` bytes: `len / 255` values of 255
/// followed by one `len % 255`, which is emitted even when zero.
pub fn lacing_values(len: usize) -> Vec<u8> {
    let mut table = vec![255u8; len / 255];
    table.push((len % 255) as u8);
    table
}

/// Number of lacing values a complete packet of `len` bytes needs
pub fn segments_for(len: usize) -> usize {
    len / 255 + 1
}

/// Lacing values taken by `len` bytes of a packet. An open packet only
/// claims its full 255-byte segments so far.
fn segments_needed(len: usize, complete: bool) -> usize {
    if complete {
        segments_for(len)
    } else {
        len / 255
    }
}

/// Writes packets of one logical stream as Ogg pages.
///
/// Packets are batched into the current page until the caller ends the page
/// or the next packet would not fit in 255 lacing values. A packet that needs
/// more than 255 lacing values on its own is rejected with `PacketTooBig`:
/// this writer never splits a packet across pages by itself. Callers that
/// want to split a packet write it with [`write_fragment`](Self::write_fragment)
/// and flush in between.
///
/// Finished pages are appended to an output buffer drained with
/// [`take_output`](Self::take_output). No I/O happens here.
#[derive(Debug)]
pub struct PacketWriter {
    serial: u32,
    sequence: u32,
    /// `HEADER_MAX` bytes reserved for the header, then the page body
    scratch: Vec<u8>,
    lacing: Vec<u8>,
    /// Bytes of an unfinished packet at the end of the body, not laced yet
    open_len: usize,
    /// A packet has been started with `write_fragment` and not completed
    packet_open: bool,
    granule: u64,
    last_granule: u64,
    continued: bool,
    bos_pending: bool,
    carry: Vec<u8>,
    out: Vec<u8>,
}

impl PacketWriter {
    pub fn new(serial: u32) -> Self {
        PacketWriter {
            serial,
            sequence: 0,
            scratch: vec![0u8; HEADER_MAX],
            lacing: Vec::with_capacity(MAX_SEGMENTS),
            open_len: 0,
            packet_open: false,
            granule: NO_GRANULE,
            last_granule: 0,
            continued: false,
            bos_pending: true,
            carry: Vec::new(),
            out: Vec::new(),
        }
    }

    /// Write a complete packet. `granule` is the codec position at its end.
    pub fn write_packet(&mut self, data: &[u8], granule: u64, end: PacketEnd) -> Result<()> {
        self.write_fragment(data, true, granule)?;
        match end {
            PacketEnd::Normal => {}
            PacketEnd::EndPage => self.flush_page(false),
            PacketEnd::EndStream => self.flush_page(true),
        }
        Ok(())
    }

    /// Append bytes to the current packet; `complete` closes it.
    pub fn write_fragment(&mut self, data: &[u8], complete: bool, granule: u64) -> Result<()> {
        if self.lacing.len() + segments_needed(self.open_len + data.len(), complete) > MAX_SEGMENTS {
            // A flush leaves only the unlaced tail of the open packet behind
            let fresh = segments_needed(self.open_len % 255 + data.len(), complete);
            if fresh > MAX_SEGMENTS {
                return Err(Error::PacketTooBig { len: self.open_len + data.len(), segments: fresh });
            }
            self.flush_page(false);
        }

        self.scratch.extend_from_slice(data);
        self.open_len += data.len();
        self.packet_open = !complete;
        if complete {
            self.lacing.extend(lacing_values(self.open_len));
            self.open_len = 0;
            self.granule = granule;
            self.last_granule = granule;
        }
        Ok(())
    }

    /// Flush the current page if anything was laced into it
    pub fn flush(&mut self) {
        self.flush_page(false);
    }

    /// Close any open packet and write the end-of-stream page
    pub fn finish(&mut self) -> Result<()> {
        if self.packet_open {
            self.write_fragment(&[], true, self.last_granule)?;
        }
        self.flush_page(true);
        Ok(())
    }

    /// Lacing values of the page being built
    pub fn lacing(&self) -> &[u8] {
        &self.lacing
    }

    /// Sequence number the next page will carry
    pub fn page_sequence(&self) -> u32 {
        self.sequence
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Pages written so far and not yet taken
    pub fn output(&self) -> &[u8] {
        &self.out
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        mem::take(&mut self.out)
    }

    fn flush_page(&mut self, eos: bool) {
        let full_chunks = self.open_len / 255;
        let tail = self.open_len % 255;
        if self.lacing.is_empty() && full_chunks == 0 && !eos {
            return;
        }

        self.lacing.extend(std::iter::repeat(255u8).take(full_chunks));
        let body_end = self.scratch.len() - tail;
        self.carry.clear();
        self.carry.extend_from_slice(&self.scratch[body_end..]);

        let mut header_type = 0;
        if self.continued {
            header_type |= OGG_HEADER_TYPE_CONTINUATION;
        }
        if self.bos_pending {
            header_type |= OGG_HEADER_TYPE_BOS;
        }
        if eos {
            header_type |= OGG_HEADER_TYPE_EOS;
        }

        // Stamp the header right before the body, inside the reserved region
        let mut header = PageHeader::new(header_type, self.granule, self.serial, self.sequence);
        header.set_segments(&self.lacing);
        let start = HEADER_MAX - header.header_len();
        header.write_into(&mut self.scratch[start..HEADER_MAX]);
        let checksum = crc::page_checksum(&self.scratch[start..HEADER_MAX], &self.scratch[HEADER_MAX..body_end]);
        put_le_u32(&mut self.scratch, start + CRC_FIELD.start, checksum);
        self.out.extend_from_slice(&self.scratch[start..body_end]);

        debug!(
            serial = self.serial,
            sequence = self.sequence,
            segments = self.lacing.len(),
            body = body_end - HEADER_MAX,
            granule = self.granule,
            header_type,
            "page written"
        );

        self.continued = full_chunks > 0;
        self.sequence = self.sequence.wrapping_add(1);
        self.bos_pending = false;
        self.granule = NO_GRANULE;
        self.lacing.clear();
        self.scratch.truncate(HEADER_MAX);
        self.scratch.extend_from_slice(&self.carry);
        self.open_len = tail;
    }
}
