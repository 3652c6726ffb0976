use oxidemux::ogg::page::{find_page, PageHeader, Parse};
use oxidemux::ogg::writer::{lacing_values, segments_for};
use oxidemux::ogg::OGG_HEADER_TYPE_BOS;
use oxidemux::{Error, PacketEnd, PacketWriter};
use quickcheck::quickcheck;
use rstest::rstest;

mod test_support;
use test_support::page_spans;

#[rstest]
#[case(0, &[0])]
#[case(1, &[1])]
#[case(254, &[254])]
#[case(255, &[255, 0])]
#[case(300, &[255, 45])]
#[case(510, &[255, 255, 0])]
fn lacing_law(#[case] len: usize, #[case] expected: &[u8]) {
    assert_eq!(lacing_values(len), expected);
    assert_eq!(segments_for(len), expected.len());
    assert_eq!(lacing_values(len).iter().map(|&v| v as usize).sum::<usize>(), len);
}

fn three_packet_page() -> Vec<u8> {
    let mut w = PacketWriter::new(42);
    w.write_packet(&[0xaa; 10], 10, PacketEnd::Normal).unwrap();
    w.write_packet(&[0xbb; 300], 500, PacketEnd::Normal).unwrap();
    w.write_packet(&[0xcc; 5], 1000, PacketEnd::EndPage).unwrap();
    w.take_output()
}

#[test]
fn three_packets_share_one_page() {
    let page = three_packet_page();
    let Parse::Complete(header, header_len) = PageHeader::parse(&page).unwrap() else {
        panic!("incomplete header");
    };
    assert_eq!(header.segment_table(), &[10, 255, 45, 5]);
    assert_eq!(header.body_len(), 315);
    assert_eq!(header_len, 27 + 4);
    assert_eq!(page.len(), header.page_len());
    assert_eq!(header.bitstream_serial, 42);
    assert_eq!(header.granule(), Some(1000));
    assert_eq!(header.header_type, OGG_HEADER_TYPE_BOS);
    header.verify(&page[..header_len], &page[header_len..]).unwrap();

    // Same input, same bytes, same checksum
    assert_eq!(three_packet_page(), page);
}

#[test]
fn sync_is_found_after_junk() {
    let mut data = b"junk1234".to_vec();
    data.extend_from_slice(&three_packet_page());
    assert_eq!(find_page(&data), Some(8));

    // A stray capture pattern with a broken header is passed over
    let mut data = b"OggS\x07junk".to_vec();
    data.extend_from_slice(&three_packet_page());
    assert_eq!(find_page(&data), Some(9));

    assert_eq!(find_page(b"no pages here"), None);
}

#[test]
fn packets_larger_than_a_page_are_rejected() {
    let mut w = PacketWriter::new(1);
    let err = w.write_packet(&vec![0; 255 * 255], 0, PacketEnd::EndPage).unwrap_err();
    assert_eq!(err.kind().code(), "EBIGPKT");
    assert!(matches!(err, Error::PacketTooBig { len: 65_025, .. }));
}

#[rstest]
fn fragments_span_pages(#[values(255, 300, 1000)] first: usize) {
    let mut w = PacketWriter::new(5);
    w.write_fragment(&vec![1; first], false, 0).unwrap();
    w.flush();
    w.write_fragment(&[2; 20], true, 77).unwrap();
    w.finish().unwrap();
    let bytes = w.take_output();

    let spans = page_spans(&bytes);
    assert!(spans.len() >= 2);
    let headers: Vec<PageHeader> = spans
        .iter()
        .map(|&(start, _, _)| match PageHeader::parse(&bytes[start..]).unwrap() {
            Parse::Complete(h, _) => h,
            Parse::NeedMore(_) => panic!("incomplete"),
        })
        .collect();
    assert!(headers[0].ends_open());
    assert_eq!(headers[0].granule(), None);
    assert!(headers[1].is_continued());
    assert!(headers.last().unwrap().is_eos());
    for (i, h) in headers.iter().enumerate() {
        assert_eq!(h.page_sequence, i as u32);
    }
}

quickcheck! {
    fn crc_catches_single_bit_flips(byte: usize, bit: u8) -> bool {
        let mut page = three_packet_page();
        let at = byte % page.len();
        page[at] ^= 1 << (bit % 8);
        match PageHeader::parse(&page) {
            Err(_) | Ok(Parse::NeedMore(_)) => true,
            Ok(Parse::Complete(header, header_len)) => {
                header.page_len() > page.len()
                    || header.verify(&page[..header_len], &page[header_len..header.page_len()]).is_err()
            }
        }
    }
}
