// Incremental container demuxing and muxing.
//
// The core is a pull-based, non-blocking contract (`Demuxer`): callers
// feed bytes, the demuxer consumes a prefix and answers with one event. The
// Ogg engine under `ogg` is the full implementation: page framing, CRC
// checks, packet lacing on write and cross-page packet reassembly on read.
// `SeekEngine` resolves sample positions to byte offsets for any format
// that can report frames.

pub mod config;
pub mod demux;
pub mod error;
pub mod gather;
pub mod ogg;
pub mod opus;
pub mod retag;
pub mod seek;
pub mod tags;
pub mod utils;

pub use config::{DemuxConfig, PageGapPolicy};
pub use demux::{DemuxStatus, Demuxer, Driver, Event, Fed, Flow, Packet};
pub use error::{Error, ErrorKind, Result};
pub use gather::{Gather, GatherBuffer};
pub use ogg::{OggDemuxer, PacketEnd, PacketWriter, StreamInfo};
pub use seek::{Frame, SeekEngine, SeekFlags, SeekPoint, SeekStep};
pub use tags::VorbisComment;
