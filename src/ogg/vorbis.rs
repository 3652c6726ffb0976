// Vorbis header packets carried in an Ogg stream
//
// Identification header (packet 0, 30 bytes):
// - Packet type 0x01 + "vorbis"
// - Version (u32), channels (u8), sample rate (u32)
// - Bitrate maximum / nominal / minimum (i32 each)
// - Blocksizes (two 4-bit exponents), framing bit
//
// Comment header (packet 1): 0x03 + "vorbis" + Vorbis comment + framing bit
// Setup header (packet 2): 0x05 + "vorbis" + codebooks, passed through as is

use serde::Serialize;

use crate::error::{Error, Result};
use crate::tags::VorbisComment;
use crate::utils::io::le_u32_at;

pub const VORBIS_SIGNATURE: &[u8; 6] = b"vorbis";

pub const PACKET_IDENTIFICATION: u8 = 0x01;
pub const PACKET_COMMENT: u8 = 0x03;
pub const PACKET_SETUP: u8 = 0x05;

const IDENTIFICATION_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VorbisInfo {
    pub version: u32,
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_maximum: i32,
    pub bitrate_nominal: i32,
    pub bitrate_minimum: i32,
    pub blocksize_short: u16,
    pub blocksize_long: u16,
}

/// Packet type byte, if `packet` is a Vorbis header packet
pub fn header_type(packet: &[u8]) -> Option<u8> {
    (packet.len() >= 7 && &packet[1..7] == VORBIS_SIGNATURE).then(|| packet[0])
}

pub fn is_identification(packet: &[u8]) -> bool {
    header_type(packet) == Some(PACKET_IDENTIFICATION)
}

impl VorbisInfo {
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if !is_identification(packet) {
            return Err(Error::codec("vorbis", "not an identification header"));
        }
        if packet.len() < IDENTIFICATION_LEN {
            return Err(Error::codec("vorbis", format!("identification header is {} bytes", packet.len())));
        }

        let version = le_u32_at(packet, 7);
        if version != 0 {
            return Err(Error::codec("vorbis", format!("unsupported version {version}")));
        }
        let channels = packet[11];
        let sample_rate = le_u32_at(packet, 12);
        if channels == 0 || sample_rate == 0 {
            return Err(Error::codec("vorbis", "zero channels or sample rate"));
        }

        let short_exp = packet[28] & 0x0f;
        let long_exp = packet[28] >> 4;
        if !(6..=13).contains(&short_exp) || !(6..=13).contains(&long_exp) || short_exp > long_exp {
            return Err(Error::codec("vorbis", format!("bad blocksizes {:#04x}", packet[28])));
        }
        if packet[29] & 1 == 0 {
            return Err(Error::codec("vorbis", "identification framing bit not set"));
        }

        Ok(VorbisInfo {
            version,
            channels,
            sample_rate,
            bitrate_maximum: le_u32_at(packet, 16) as i32,
            bitrate_nominal: le_u32_at(packet, 20) as i32,
            bitrate_minimum: le_u32_at(packet, 24) as i32,
            blocksize_short: 1 << short_exp,
            blocksize_long: 1 << long_exp,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IDENTIFICATION_LEN);
        out.push(PACKET_IDENTIFICATION);
        out.extend_from_slice(VORBIS_SIGNATURE);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.push(self.channels);
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.bitrate_maximum.to_le_bytes());
        out.extend_from_slice(&self.bitrate_nominal.to_le_bytes());
        out.extend_from_slice(&self.bitrate_minimum.to_le_bytes());
        let exp = |size: u16| size.trailing_zeros() as u8;
        out.push(exp(self.blocksize_short) | exp(self.blocksize_long) << 4);
        out.push(1);
        out
    }
}

/// Parse a comment header packet
pub fn parse_comment(packet: &[u8]) -> Result<VorbisComment> {
    if header_type(packet) != Some(PACKET_COMMENT) {
        return Err(Error::codec("vorbis", "not a comment header"));
    }
    let (comment, used) =
        VorbisComment::parse(&packet[7..]).map_err(|e| Error::codec("vorbis", e.to_string()))?;
    // Some encoders drop the framing byte; only a present but clear bit is wrong
    if let Some(&framing) = packet.get(7 + used) {
        if framing & 1 == 0 {
            return Err(Error::codec("vorbis", "comment framing bit not set"));
        }
    }
    Ok(comment)
}

/// Build a comment header packet
pub fn comment_packet(comment: &VorbisComment) -> Vec<u8> {
    let mut packet = vec![PACKET_COMMENT];
    packet.extend_from_slice(VORBIS_SIGNATURE);
    packet.extend_from_slice(&comment.to_bytes());
    packet.push(1);
    packet
}

pub fn is_comment(packet: &[u8]) -> bool {
    header_type(packet) == Some(PACKET_COMMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> VorbisInfo {
        VorbisInfo {
            version: 0,
            channels: 2,
            sample_rate: 44_100,
            bitrate_maximum: 0,
            bitrate_nominal: 128_000,
            bitrate_minimum: 0,
            blocksize_short: 256,
            blocksize_long: 2048,
        }
    }

    #[test]
    fn identification_round_trip() {
        let bytes = info().to_bytes();
        assert_eq!(bytes.len(), 30);
        assert_eq!(bytes[28], 0xb8);
        assert_eq!(VorbisInfo::parse(&bytes).unwrap(), info());
    }

    #[test]
    fn identification_rejects_bad_fields() {
        let mut bytes = info().to_bytes();
        bytes[29] = 0;
        assert!(VorbisInfo::parse(&bytes).is_err());

        let mut bytes = info().to_bytes();
        bytes[28] = 0x6b; // short larger than long
        assert!(VorbisInfo::parse(&bytes).is_err());

        assert!(VorbisInfo::parse(&info().to_bytes()[..20]).is_err());
        assert!(VorbisInfo::parse(b"\x01vorbix").is_err());
    }

    #[test]
    fn comment_packet_round_trip() {
        let mut comment = VorbisComment::new("Xiph.Org libVorbis I 20200704");
        comment.set("TITLE", "Étude");
        let packet = comment_packet(&comment);
        assert!(is_comment(&packet));
        assert_eq!(*packet.last().unwrap(), 1);
        assert_eq!(parse_comment(&packet).unwrap(), comment);
    }

    #[test]
    fn comment_packet_without_framing_byte_is_accepted() {
        let comment = VorbisComment::new("v");
        let mut packet = comment_packet(&comment);
        packet.pop();
        assert_eq!(parse_comment(&packet).unwrap(), comment);
    }
}
