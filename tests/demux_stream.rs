use std::io::Cursor;

use oxidemux::ogg::OGG_HEADER_TYPE_CONTINUATION;
use oxidemux::{DemuxConfig, Demuxer, Driver, ErrorKind, Event, Flow, OggDemuxer, PacketEnd, PacketWriter};
use rstest::rstest;

mod test_support;
use test_support::{data, demux, page_spans, rewrite_page, unknown_codec_stream, Seen};

fn packet(len: usize, fill: u8) -> Vec<u8> {
    (0..len).map(|i| fill.wrapping_add(i as u8)).collect()
}

#[rstest]
fn packets_survive_the_round_trip(#[values(1, 13, 254, 4096, 1 << 20)] chunk: usize) {
    let sizes = [0usize, 1, 254, 255, 256, 300, 510, 4000, 65_024];
    let packets: Vec<Vec<u8>> = sizes.iter().enumerate().map(|(i, &len)| packet(len, i as u8)).collect();

    let mut w = PacketWriter::new(77);
    w.write_packet(b"\x7fTEST header", 0, PacketEnd::EndPage).unwrap();
    for (i, p) in packets.iter().enumerate() {
        w.write_packet(p, (i as u64 + 1) * 100, PacketEnd::Normal).unwrap();
    }
    w.finish().unwrap();
    let bytes = w.take_output();

    let seen = demux(&mut OggDemuxer::default(), &bytes, chunk);
    assert_eq!(seen.first(), Some(&Seen::Header("unknown")));
    assert_eq!(seen.last(), Some(&Seen::Done));
    assert!(!seen.iter().any(|s| matches!(s, Seen::Warning(_))));

    let got = data(&seen);
    assert_eq!(got.iter().map(|(d, _)| d.clone()).collect::<Vec<_>>(), packets);
    // Only the last packet completed on each page carries a granule
    assert_eq!(got.last().unwrap().1, Some(sizes.len() as u64 * 100));
    for (d, g) in &got {
        if let Some(g) = g {
            let i = packets.iter().position(|p| p == d).unwrap();
            assert_eq!(*g, (i as u64 + 1) * 100);
        }
    }
}

#[test]
fn cleared_continuation_flag_is_reported() {
    let mut w = PacketWriter::new(9);
    w.write_packet(b"\x7fTEST header", 0, PacketEnd::EndPage).unwrap();
    w.write_fragment(&[1; 300], false, 0).unwrap();
    w.flush();
    w.write_fragment(&[1; 20], true, 320).unwrap();
    w.write_packet(&[2; 40], 400, PacketEnd::EndPage).unwrap();
    w.write_packet(&[3; 50], 500, PacketEnd::EndStream).unwrap();
    let mut bytes = w.take_output();

    let spans = page_spans(&bytes);
    assert_eq!(spans.len(), 4);
    rewrite_page(&mut bytes, spans[2].0, |h| h.header_type &= !OGG_HEADER_TYPE_CONTINUATION);

    let seen = demux(&mut OggDemuxer::default(), &bytes, 64);
    assert!(seen.contains(&Seen::Warning(ErrorKind::Continuation)));
    assert_eq!(ErrorKind::Continuation.code(), "ECONTPKT");
    // The damaged packet is gone; the page after it decodes normally
    assert_eq!(data(&seen), vec![(vec![3; 50], Some(500))]);
}

#[test]
fn lost_page_is_a_sequence_warning() {
    let bytes = unknown_codec_stream(3, &[(&[1u8; 30][..], 10), (&[2u8; 30][..], 20), (&[3u8; 30][..], 30)]);
    let spans = page_spans(&bytes);
    let (start, _, len) = spans[2];
    let mut cut = bytes[..start].to_vec();
    cut.extend_from_slice(&bytes[start + len..]);

    let seen = demux(&mut OggDemuxer::default(), &cut, 4096);
    assert!(seen.contains(&Seen::Warning(ErrorKind::PageSequence)));
    assert_eq!(data(&seen), vec![(vec![1; 30], Some(10)), (vec![3; 30], Some(30))]);
}

#[test]
fn other_streams_are_ignored() {
    let ours = unknown_codec_stream(1, &[(&[1u8; 30][..], 10), (&[2u8; 30][..], 20)]);
    let theirs = unknown_codec_stream(2, &[(&[9u8; 30][..], 10)]);
    let a = page_spans(&ours);
    let b = page_spans(&theirs);

    // Interleave: our BOS, their pages, then the rest of ours
    let mut bytes = ours[..a[0].2].to_vec();
    for &(start, _, len) in &b {
        bytes.extend_from_slice(&theirs[start..start + len]);
    }
    bytes.extend_from_slice(&ours[a[1].0..]);

    let seen = demux(&mut OggDemuxer::default(), &bytes, 100);
    assert_eq!(data(&seen), vec![(vec![1; 30], Some(10)), (vec![2; 30], Some(20))]);
    assert_eq!(seen.last(), Some(&Seen::Done));
}

#[test]
fn driver_reports_duration_before_audio() {
    let packets: Vec<(Vec<u8>, u64)> = (1..=200u64).map(|i| (vec![i as u8; 100], i * 960)).collect();
    let refs: Vec<(&[u8], u64)> = packets.iter().map(|(p, g)| (p.as_slice(), *g)).collect();
    let bytes = unknown_codec_stream(5, &refs);
    let size = bytes.len() as u64;

    let mut demuxer = OggDemuxer::new(DemuxConfig { read_chunk: 1000, ..DemuxConfig::default() });
    let mut driver = Driver::new(Cursor::new(bytes), 1000).unwrap();
    let mut first = None;
    driver
        .run(&mut demuxer, |event| match event {
            Event::Data(p) => {
                first = Some(p.data.to_vec());
                Ok(Flow::Stop)
            }
            _ => Ok(Flow::Continue),
        })
        .unwrap();

    assert_eq!(first, Some(vec![1; 100]));
    assert_eq!(demuxer.end_granule(), Some(200 * 960));
    assert_eq!(demuxer.status().total_size, Some(size));
}

#[rstest]
fn false_page_split_across_feeds_hides_nothing(#[values(1, 16, 29, 100)] chunk: usize) {
    // A header that parses, claiming a 60 byte body that holds the real stream
    let mut bytes = b"OggS\0\0".to_vec();
    bytes.extend_from_slice(&[0; 20]);
    bytes.extend_from_slice(&[1, 60]);
    bytes.extend_from_slice(&unknown_codec_stream(4, &[(&[1u8; 30][..], 10), (&[2u8; 30][..], 20)]));

    let whole = demux(&mut OggDemuxer::default(), &bytes, bytes.len());
    let chunked = demux(&mut OggDemuxer::default(), &bytes, chunk);
    assert_eq!(data(&whole), vec![(vec![1; 30], Some(10)), (vec![2; 30], Some(20))]);
    assert_eq!(data(&chunked), data(&whole));
    assert!(chunked.contains(&Seen::Header("unknown")));
    assert_eq!(chunked.iter().filter(|s| **s == Seen::Warning(ErrorKind::Crc)).count(), 1);
    assert_eq!(chunked.last(), Some(&Seen::Done));
}
