// Ogg container engine
//
// OGG File Structure:
// - OGG Page Header (27 bytes)
//   - Capture Pattern: "OggS" (4 bytes)
//   - Version: 0 (1 byte)
//   - Header Type: 1=continuation, 2=bos, 4=eos (1 byte)
//   - Granule Position (8 bytes)
//   - Bitstream Serial Number (4 bytes)
//   - Page Sequence Number (4 bytes)
//   - CRC Checksum (4 bytes)
//   - Number of Page Segments (1 byte)
//   - Segment Table (variable)
// - Page body: the sum of the segment table values
//
// A lacing value of 255 means the packet continues in the next segment; the
// first value below 255 terminates it. Packets may continue across pages.

pub mod assembler;
pub mod crc;
pub mod demuxer;
pub mod page;
pub mod vorbis;
pub mod writer;

use std::ops::Range;

pub use assembler::{Assembled, PacketAssembler};
pub use demuxer::{OggDemuxer, StreamInfo};
pub use page::{find_capture, find_page, scan, PageHeader, Parse, Scan};
pub use writer::{PacketEnd, PacketWriter};

// OGG signature
pub const OGG_SIGNATURE: &[u8; 4] = b"OggS";

/// Size of the header before the segment table
pub const FIXED_HEADER_LEN: usize = 27;
/// Maximum number of lacing values in one page
pub const MAX_SEGMENTS: usize = 255;
/// Largest possible header: fixed part plus a full segment table
pub const HEADER_MAX: usize = FIXED_HEADER_LEN + MAX_SEGMENTS;
/// Largest possible page
pub const MAX_PAGE_LEN: usize = HEADER_MAX + MAX_SEGMENTS * 255;

/// Byte range of the stored CRC inside the header
pub const CRC_FIELD: Range<usize> = 22..26;

/// Granule position meaning "no packet finishes on this page"
pub const NO_GRANULE: u64 = u64::MAX;

// OGG page header types
pub const OGG_HEADER_TYPE_CONTINUATION: u8 = 0x01;
pub const OGG_HEADER_TYPE_BOS: u8 = 0x02; // Beginning of Stream
pub const OGG_HEADER_TYPE_EOS: u8 = 0x04; // End of Stream
