use crate::error::{Error, Result};
use crate::ogg::{
    crc, CRC_FIELD, FIXED_HEADER_LEN, MAX_SEGMENTS, NO_GRANULE, OGG_HEADER_TYPE_BOS,
    OGG_HEADER_TYPE_CONTINUATION, OGG_HEADER_TYPE_EOS, OGG_SIGNATURE,
};
use crate::utils::io::{le_u32_at, le_u64_at, put_le_u32, put_le_u64};

/// OGG Page Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    pub header_type: u8,
    pub granule_position: u64,
    pub bitstream_serial: u32,
    pub page_sequence: u32,
    pub crc: u32,
    segment_count: u8,
    segment_table: [u8; MAX_SEGMENTS],
}

/// Outcome of [`PageHeader::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse {
    /// Header and its length in bytes (fixed part plus segment table)
    Complete(PageHeader, usize),
    /// At least this many bytes are needed to finish the header
    NeedMore(usize),
}

impl PageHeader {
    pub fn new(header_type: u8, granule_position: u64, bitstream_serial: u32, page_sequence: u32) -> Self {
        PageHeader {
            header_type,
            granule_position,
            bitstream_serial,
            page_sequence,
            crc: 0,
            segment_count: 0,
            segment_table: [0; MAX_SEGMENTS],
        }
    }

    /// Parse the fixed 27-byte part. The segment table is left empty and the
    /// segment count is returned for the caller to gather.
    pub fn parse_fixed(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < FIXED_HEADER_LEN {
            return Err(Error::CapturePattern);
        }

        // Check OGG signature
        if &buf[0..4] != OGG_SIGNATURE {
            return Err(Error::CapturePattern);
        }

        let version = buf[4];
        if version != 0 {
            return Err(Error::Version(version));
        }

        let header_type = buf[5];
        if header_type & !(OGG_HEADER_TYPE_CONTINUATION | OGG_HEADER_TYPE_BOS | OGG_HEADER_TYPE_EOS) != 0 {
            return Err(Error::HeaderFlags(header_type));
        }

        let mut header = PageHeader::new(header_type, le_u64_at(buf, 6), le_u32_at(buf, 14), le_u32_at(buf, 18));
        header.crc = le_u32_at(buf, CRC_FIELD.start);
        Ok((header, buf[26] as usize))
    }

    /// Parse a full header (fixed part and segment table) from the start of `buf`
    pub fn parse(buf: &[u8]) -> Result<Parse> {
        if buf.len() < FIXED_HEADER_LEN {
            // Reject a wrong capture pattern as early as the bytes allow
            let n = buf.len().min(4);
            if buf[..n] != OGG_SIGNATURE[..n] {
                return Err(Error::CapturePattern);
            }
            return Ok(Parse::NeedMore(FIXED_HEADER_LEN));
        }

        let (mut header, segment_count) = Self::parse_fixed(buf)?;
        let header_len = FIXED_HEADER_LEN + segment_count;
        if buf.len() < header_len {
            return Ok(Parse::NeedMore(header_len));
        }
        header.set_segments(&buf[FIXED_HEADER_LEN..header_len]);
        Ok(Parse::Complete(header, header_len))
    }

    /// Replace the segment table. At most 255 values are kept.
    pub fn set_segments(&mut self, segments: &[u8]) {
        let n = segments.len().min(MAX_SEGMENTS);
        self.segment_table[..n].copy_from_slice(&segments[..n]);
        self.segment_count = n as u8;
    }

    pub fn segment_table(&self) -> &[u8] {
        &self.segment_table[..self.segment_count as usize]
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count as usize
    }

    /// Fixed header plus segment table
    pub fn header_len(&self) -> usize {
        FIXED_HEADER_LEN + self.segment_count as usize
    }

    /// Calculate total page data size from segment table
    pub fn body_len(&self) -> usize {
        self.segment_table().iter().map(|&x| x as usize).sum()
    }

    pub fn page_len(&self) -> usize {
        self.header_len() + self.body_len()
    }

    /// Number of packets that finish on this page
    pub fn packets_in_page(&self) -> usize {
        self.segment_table().iter().filter(|&&x| x < 255).count()
    }

    /// The last packet on the page continues on the next one
    pub fn ends_open(&self) -> bool {
        self.segment_table().last() == Some(&255)
    }

    pub fn is_continued(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_CONTINUATION != 0
    }

    /// Check if this is the beginning of a stream
    pub fn is_bos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_BOS != 0
    }

    pub fn is_eos(&self) -> bool {
        self.header_type & OGG_HEADER_TYPE_EOS != 0
    }

    /// Granule position, or `None` when no packet finishes on this page
    pub fn granule(&self) -> Option<u64> {
        (self.granule_position != NO_GRANULE).then_some(self.granule_position)
    }

    /// Serialize the header into `out`, which must be exactly `header_len()`
    /// bytes. The stored `crc` field is written as is.
    pub fn write_into(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(OGG_SIGNATURE);
        out[4] = 0;
        out[5] = self.header_type;
        put_le_u64(out, 6, self.granule_position);
        put_le_u32(out, 14, self.bitstream_serial);
        put_le_u32(out, 18, self.page_sequence);
        put_le_u32(out, CRC_FIELD.start, self.crc);
        out[26] = self.segment_count;
        out[FIXED_HEADER_LEN..self.header_len()].copy_from_slice(self.segment_table());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.header_len()];
        self.write_into(&mut out);
        out
    }

    /// Check the stored CRC against `raw_header` (this header's serialized
    /// bytes) and `body`
    pub fn verify(&self, raw_header: &[u8], body: &[u8]) -> Result<()> {
        let computed = crc::page_checksum(raw_header, body);
        if computed != self.crc {
            return Err(Error::Crc { stored: self.crc, computed });
        }
        Ok(())
    }
}

/// Result of scanning a buffer for the next page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// A header that parses cleanly starts here
    Page(usize),
    /// A possible page starts here but the buffer ends before it can be confirmed
    Partial(usize),
    /// No page can start anywhere in the buffer
    NotFound,
}

/// Offset of the first capture pattern in `data`, or of a prefix of it that
/// runs into the end of the buffer
pub fn find_capture(data: &[u8]) -> Option<usize> {
    (0..data.len()).find(|&pos| {
        let rest = &data[pos..];
        let n = rest.len().min(OGG_SIGNATURE.len());
        rest[..n] == OGG_SIGNATURE[..n]
    })
}

/// Scan `data` for the next capture pattern that is followed by a valid
/// header. When the whole page is present its CRC must match too, so a stray
/// "OggS" inside payload bytes is skipped.
pub fn scan(data: &[u8]) -> Scan {
    let mut pos = 0;
    while let Some(found) = find_capture(&data[pos..]) {
        let at = pos + found;
        let rest = &data[at..];
        if rest.len() < OGG_SIGNATURE.len() {
            return Scan::Partial(at);
        }
        match PageHeader::parse(rest) {
            Ok(Parse::NeedMore(_)) => return Scan::Partial(at),
            Ok(Parse::Complete(header, header_len)) => {
                let page_len = header.page_len();
                if rest.len() < page_len {
                    return Scan::Page(at);
                }
                if header.verify(&rest[..header_len], &rest[header_len..page_len]).is_ok() {
                    return Scan::Page(at);
                }
            }
            Err(_) => {}
        }
        pos = at + 1;
    }
    Scan::NotFound
}

/// Offset of the first confirmed page in `data`
pub fn find_page(data: &[u8]) -> Option<usize> {
    match scan(data) {
        Scan::Page(pos) => Some(pos),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page(segments: &[u8], fill: u8) -> Vec<u8> {
        let mut header = PageHeader::new(OGG_HEADER_TYPE_BOS, 1000, 42, 0);
        header.set_segments(segments);
        let body = vec![fill; header.body_len()];
        let raw = header.to_bytes();
        header.crc = crc::page_checksum(&raw, &body);
        let mut page = header.to_bytes();
        page.extend_from_slice(&body);
        page
    }

    #[test]
    fn parse_round_trips_fields() {
        let page = sample_page(&[10, 255, 45, 5], 7);
        let Parse::Complete(header, header_len) = PageHeader::parse(&page).unwrap() else {
            panic!("expected a complete header");
        };
        assert_eq!(header_len, 31);
        assert_eq!(header.granule_position, 1000);
        assert_eq!(header.bitstream_serial, 42);
        assert_eq!(header.page_sequence, 0);
        assert!(header.is_bos());
        assert!(!header.is_continued());
        assert_eq!(header.segment_table(), &[10, 255, 45, 5]);
        assert_eq!(header.body_len(), 315);
        assert_eq!(header.packets_in_page(), 3);
        assert_eq!(header.page_len(), page.len());
        header.verify(&page[..header_len], &page[header_len..]).unwrap();
    }

    #[test]
    fn parse_reports_missing_bytes() {
        let page = sample_page(&[1, 2, 3], 0);
        assert_eq!(PageHeader::parse(&page[..10]).unwrap(), Parse::NeedMore(27));
        assert_eq!(PageHeader::parse(&page[..28]).unwrap(), Parse::NeedMore(30));
    }

    #[test]
    fn parse_rejects_bad_sync_and_version() {
        let mut page = sample_page(&[1], 0);
        page[4] = 1;
        assert!(matches!(PageHeader::parse(&page), Err(Error::Version(1))));
        assert!(matches!(PageHeader::parse(b"OggX"), Err(Error::CapturePattern)));
        assert!(matches!(PageHeader::parse(b"Ox"), Err(Error::CapturePattern)));
    }

    #[test]
    fn parse_rejects_unknown_flags() {
        let mut page = sample_page(&[1], 0);
        page[5] = 0x08;
        assert!(matches!(PageHeader::parse(&page), Err(Error::HeaderFlags(0x08))));
    }

    #[test]
    fn open_page_detection() {
        let page = sample_page(&[255, 255], 0);
        let Parse::Complete(header, _) = PageHeader::parse(&page).unwrap() else {
            panic!("expected a complete header");
        };
        assert!(header.ends_open());
        assert_eq!(header.packets_in_page(), 0);
    }

    #[test]
    fn scan_handles_partial_capture_pattern() {
        assert_eq!(scan(b"xxOg"), Scan::Partial(2));
        assert_eq!(scan(b"xxxx"), Scan::NotFound);
        assert_eq!(scan(b"OggS\0\0"), Scan::Partial(0));
    }

    #[test]
    fn capture_search_reports_tail_prefix() {
        assert_eq!(find_capture(b"abOggSx"), Some(2));
        assert_eq!(find_capture(b"abcO"), Some(3));
        assert_eq!(find_capture(b"abcOgX"), None);
        assert_eq!(find_capture(b""), None);
    }

    #[test]
    fn find_page_skips_corrupt_page() {
        let mut bad = sample_page(&[4], 1);
        let last = bad.len() - 1;
        bad[last] ^= 0xff;
        let good = sample_page(&[4], 2);
        let mut data = bad.clone();
        data.extend_from_slice(&good);
        assert_eq!(find_page(&data), Some(bad.len()));
    }
}
