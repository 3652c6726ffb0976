// CRC32 for Ogg pages
//
// Polynomial 0x04c11db7, initial value 0, no reflection, no final XOR.
// This is not the IEEE 802.3 (zlib) CRC: same polynomial, different bit order.

use super::CRC_FIELD;

const fn table_entry(idx: u32) -> u32 {
    let mut r: u32 = idx << 24;
    let mut i = 0;
    while i < 8 {
        r = if r & 0x8000_0000 != 0 { (r << 1) ^ 0x04c1_1db7 } else { r << 1 };
        i += 1;
    }
    r
}

const fn lookup_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = table_entry(i as u32);
        i += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = lookup_table();

/// Continue a running CRC over `data`. Start with `0`.
pub fn update(crc: u32, data: &[u8]) -> u32 {
    data.iter().fold(crc, |crc, &byte| {
        (crc << 8) ^ CRC_TABLE[((crc >> 24) as u8 ^ byte) as usize]
    })
}

/// CRC of a page split into its header (fixed part plus lacing table) and
/// body. The stored CRC field inside `header` is treated as zero.
pub fn page_checksum(header: &[u8], body: &[u8]) -> u32 {
    let mut crc = update(0, &header[..CRC_FIELD.start]);
    crc = update(crc, &[0u8; 4]);
    crc = update(crc, &header[CRC_FIELD.end..]);
    update(crc, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_reference_entries() {
        assert_eq!(CRC_TABLE[0], 0);
        assert_eq!(CRC_TABLE[1], 0x04c1_1db7);
        assert_eq!(CRC_TABLE[0x80], 0x690c_e0ee);
        assert_eq!(CRC_TABLE[0xff], 0xb1f7_40b4);
    }

    #[test]
    fn check_value() {
        // CRC-32/MPEG-2 parameters without init/xorout: 0x89a1897f for "123456789"
        assert_eq!(update(0, b"123456789"), 0x89a1_897f);
    }

    #[test]
    fn incremental_equals_one_shot() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let split = update(update(0, &data[..333]), &data[333..]);
        assert_eq!(split, update(0, &data));
    }
}
