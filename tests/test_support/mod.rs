#![allow(dead_code)]

use oxidemux::ogg::crc;
use oxidemux::ogg::page::{PageHeader, Parse};
use oxidemux::{Demuxer, ErrorKind, Event, OggDemuxer, PacketEnd, PacketWriter, VorbisComment};

/// Owned copy of a demuxer event
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Header(&'static str),
    Tag(VorbisComment),
    Data(Vec<u8>, Option<u64>),
    Warning(ErrorKind),
    Done,
}

/// Feed `bytes` `chunk` bytes at a time, the way a non-seekable source would
pub fn demux(demuxer: &mut OggDemuxer, bytes: &[u8], chunk: usize) -> Vec<Seen> {
    let mut pending = Vec::new();
    let mut next = 0;
    let mut seen = Vec::new();
    loop {
        let (consumed, event) = {
            let fed = demuxer.feed(&pending).expect("fatal demux error");
            let event = match fed.event {
                Event::More => None,
                Event::Seek(offset) => panic!("unexpected seek to {offset}"),
                Event::Header(info) => Some(Seen::Header(info.codec())),
                Event::Tag(comment) => Some(Seen::Tag(comment)),
                Event::Data(p) => Some(Seen::Data(p.data.to_vec(), p.granule)),
                Event::Warning(err) => Some(Seen::Warning(err.kind())),
                Event::Done => Some(Seen::Done),
            };
            (fed.consumed, event)
        };
        pending.drain(..consumed);
        match event {
            Some(Seen::Done) => {
                seen.push(Seen::Done);
                return seen;
            }
            Some(event) => seen.push(event),
            None => {
                if next >= bytes.len() {
                    return seen;
                }
                let end = (next + chunk).min(bytes.len());
                pending.extend_from_slice(&bytes[next..end]);
                next = end;
            }
        }
    }
}

/// Data payloads and granules, in order
pub fn data(seen: &[Seen]) -> Vec<(Vec<u8>, Option<u64>)> {
    seen.iter()
        .filter_map(|s| match s {
            Seen::Data(d, g) => Some((d.clone(), *g)),
            _ => None,
        })
        .collect()
}

/// A stream whose first packet is an identification header nobody parses,
/// followed by `packets` written one page each
pub fn unknown_codec_stream(serial: u32, packets: &[(&[u8], u64)]) -> Vec<u8> {
    let mut w = PacketWriter::new(serial);
    w.write_packet(b"\x7fTEST header", 0, PacketEnd::EndPage).unwrap();
    for (i, (packet, granule)) in packets.iter().enumerate() {
        let end = if i + 1 == packets.len() { PacketEnd::EndStream } else { PacketEnd::EndPage };
        w.write_packet(packet, *granule, end).unwrap();
    }
    w.take_output()
}

/// Byte ranges of each page in `bytes`
pub fn page_spans(bytes: &[u8]) -> Vec<(usize, usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let Ok(Parse::Complete(header, header_len)) = PageHeader::parse(&bytes[pos..]) else {
            panic!("no page at {pos}");
        };
        spans.push((pos, header_len, header.page_len()));
        pos += header.page_len();
    }
    spans
}

/// Edit the header of the page at `start` and restamp its CRC
pub fn rewrite_page(bytes: &mut [u8], start: usize, edit: impl FnOnce(&mut PageHeader)) {
    let Ok(Parse::Complete(mut header, header_len)) = PageHeader::parse(&bytes[start..]) else {
        panic!("no page at {start}");
    };
    edit(&mut header);
    header.crc = 0;
    let end = start + header.page_len();
    let raw = header.to_bytes();
    header.crc = crc::page_checksum(&raw, &bytes[start + header_len..end]);
    bytes[start..start + header_len].copy_from_slice(&header.to_bytes());
}
