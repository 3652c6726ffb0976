// Byte-order helpers shared by the page codec and the codec header parsers

use std::io::Read;

/// Read little-endian 32-bit integer
pub fn read_le_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buffer = [0u8; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_le_bytes(buffer))
}

/// Read a little-endian u32 length prefix followed by that many bytes
pub fn read_le_prefixed<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let len = read_le_u32(reader)? as usize;
    let mut data = Vec::new();
    // Allocation is bounded by what the reader holds, not by the prefix
    reader.by_ref().take(len as u64).read_to_end(&mut data)?;
    if data.len() != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "length prefix exceeds available data",
        ));
    }
    Ok(data)
}

// Slice accessors. Callers check the length before indexing.

pub fn le_u16_at(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub fn le_u32_at(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub fn le_u64_at(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

pub fn put_le_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn put_le_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

/// Check if `data` starts with `signature`
pub fn check_signature(data: &[u8], signature: &[u8]) -> bool {
    data.len() >= signature.len() && &data[..signature.len()] == signature
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_accessors_are_little_endian() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(le_u16_at(&buf, 0), 0x0201);
        assert_eq!(le_u32_at(&buf, 4), 0x0807_0605);
        assert_eq!(le_u64_at(&buf, 0), 0x0807_0605_0403_0201);

        let mut out = [0u8; 12];
        put_le_u32(&mut out, 0, 0xdead_beef);
        put_le_u64(&mut out, 4, 1000);
        assert_eq!(le_u32_at(&out, 0), 0xdead_beef);
        assert_eq!(le_u64_at(&out, 4), 1000);
    }

    #[test]
    fn prefixed_read_rejects_short_data() {
        let mut ok = Cursor::new(vec![3, 0, 0, 0, b'a', b'b', b'c']);
        assert_eq!(read_le_prefixed(&mut ok).unwrap(), b"abc");

        let mut short = Cursor::new(vec![0xff, 0xff, 0xff, 0x7f, b'a']);
        assert!(read_le_prefixed(&mut short).is_err());
    }

    #[test]
    fn signature_check() {
        assert!(check_signature(b"OggS\0", b"OggS"));
        assert!(!check_signature(b"Ogg", b"OggS"));
    }
}
