// Comment header rewriting for in-memory Ogg streams
//
// The stream is demuxed packet by packet and written again through the page
// writer with a new comment header. Audio pages keep their boundaries and
// granule positions; only the header pages change size.

use tracing::{debug, warn};

use crate::config::DemuxConfig;
use crate::demux::{Demuxer, Event, Fed, Packet};
use crate::error::{Error, Result};
use crate::ogg::page::{find_page, PageHeader, Parse};
use crate::ogg::vorbis;
use crate::ogg::writer::{PacketEnd, PacketWriter};
use crate::ogg::{OggDemuxer, StreamInfo};
use crate::opus;
use crate::tags::VorbisComment;

/// Largest fragment written per page when a packet must be split
const MAX_FRAGMENT: usize = 255 * 254;

/// Codec header and comment block of an in-memory stream
pub fn read_tags(data: &[u8]) -> Result<(StreamInfo, Option<VorbisComment>)> {
    let mut demuxer = OggDemuxer::new(in_memory_config());
    let mut info = None;
    let mut pos = 0;
    loop {
        let Fed { consumed, event } = demuxer.feed(&data[pos..])?;
        pos += consumed;
        match event {
            Event::Header(header) => info = Some(header),
            Event::Tag(comment) => {
                let info = info.ok_or_else(|| Error::codec("ogg", "comment before identification header"))?;
                return Ok((info, Some(comment)));
            }
            Event::Warning(err) => warn!(%err, "while reading tags"),
            Event::Data(_) | Event::More | Event::Done | Event::Seek(_) => break,
        }
    }
    info.map(|info| (info, None)).ok_or_else(|| Error::codec("ogg", "no identification header"))
}

/// Re-page `data` with `comment` as its comment header
pub fn retag(data: &[u8], comment: &VorbisComment) -> Result<Vec<u8>> {
    let serial = first_serial(data)?;
    let mut demuxer = OggDemuxer::new(in_memory_config());
    let mut writer = PacketWriter::new(serial);
    let mut codec = None;
    let mut last_granule = 0;
    let mut ended = false;
    let mut pos = 0;

    loop {
        let Fed { consumed, event } = demuxer.feed(&data[pos..])?;
        pos += consumed;
        match event {
            Event::Header(info) => {
                let packet = match &info {
                    StreamInfo::Vorbis(header) => header.to_bytes(),
                    StreamInfo::Opus(head) => head.to_bytes(),
                    StreamInfo::Unknown { .. } => {
                        return Err(Error::codec("ogg", "cannot rewrite comments of an unknown codec"));
                    }
                };
                writer.write_packet(&packet, 0, PacketEnd::EndPage)?;
                codec = Some(info);
            }
            Event::Tag(_) => match codec {
                // Vorbis keeps the setup header on the comment page
                Some(StreamInfo::Vorbis(_)) => {
                    writer.write_packet(&vorbis::comment_packet(comment), 0, PacketEnd::Normal)?;
                }
                _ => writer.write_packet(&opus::tags_packet(comment), 0, PacketEnd::EndPage)?,
            },
            Event::Data(packet) => {
                if let Some(granule) = packet.granule {
                    last_granule = granule;
                }
                ended |= packet.eos;
                write_packet(&mut writer, &packet, last_granule)?;
            }
            Event::Warning(err) => return Err(err),
            Event::More | Event::Done => break,
            Event::Seek(_) => return Err(Error::Unseekable("in-memory rewrite cannot seek")),
        }
    }

    if !ended {
        debug!("source had no end-of-stream page");
        writer.finish()?;
    }
    Ok(writer.take_output())
}

fn write_packet(writer: &mut PacketWriter, packet: &Packet<'_>, granule: u64) -> Result<()> {
    let end = if packet.eos {
        PacketEnd::EndStream
    } else if packet.granule.is_some() {
        PacketEnd::EndPage
    } else {
        PacketEnd::Normal
    };

    let mut rest = packet.data;
    while rest.len() > MAX_FRAGMENT {
        let (fragment, tail) = rest.split_at(MAX_FRAGMENT);
        writer.write_fragment(fragment, false, granule)?;
        writer.flush();
        rest = tail;
    }
    writer.write_packet(rest, granule, end)
}

fn first_serial(data: &[u8]) -> Result<u32> {
    let start = find_page(data).ok_or(Error::CapturePattern)?;
    match PageHeader::parse(&data[start..])? {
        Parse::Complete(header, _) => Ok(header.bitstream_serial),
        Parse::NeedMore(_) => Err(Error::CapturePattern),
    }
}

fn in_memory_config() -> DemuxConfig {
    DemuxConfig { probe_duration: false, ..DemuxConfig::default() }
}
