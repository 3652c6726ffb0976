// OPUS header packets (in OGG container)
//
// OPUS File Structure:
// - Identification header: "OpusHead" (8 bytes) in the first packet
//   - Version (1 byte), channel count (1 byte), pre-skip (u16)
//   - Input sample rate (u32), output gain (i16, Q7.8 dB), mapping family (1 byte)
//   - Mapping families other than 0 add stream count, coupled count and a
//     channel mapping table
// - Comment header: "OpusTags" (8 bytes) followed by a Vorbis comment
// - Audio packets. Granule positions always count 48 kHz samples.
//
// Reference:
// - RFC 7845: Ogg Encapsulation for the Opus Audio Codec

use serde::Serialize;

use crate::error::{Error, Result};
use crate::tags::VorbisComment;
use crate::utils::io::{check_signature, le_u16_at, le_u32_at};

pub const OPUS_SIGNATURE: &[u8; 8] = b"OpusHead";
pub const OPUS_TAGS: &[u8; 8] = b"OpusTags";

/// Rate of every Opus granule position
pub const OPUS_GRANULE_RATE: u32 = 48_000;

const HEAD_LEN: usize = 19;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpusHead {
    pub version: u8,
    pub channels: u8,
    /// Samples at 48 kHz to drop from the start of the decoded stream
    pub pre_skip: u16,
    /// Sample rate of the original input, informational only
    pub input_sample_rate: u32,
    pub output_gain: i16,
    pub mapping_family: u8,
    pub stream_count: u8,
    pub coupled_count: u8,
    pub channel_mapping: Vec<u8>,
}

pub fn is_head(packet: &[u8]) -> bool {
    check_signature(packet, OPUS_SIGNATURE)
}

pub fn is_tags(packet: &[u8]) -> bool {
    check_signature(packet, OPUS_TAGS)
}

impl OpusHead {
    pub fn parse(packet: &[u8]) -> Result<Self> {
        if !is_head(packet) {
            return Err(Error::codec("opus", "missing OpusHead signature"));
        }
        if packet.len() < HEAD_LEN {
            return Err(Error::codec("opus", format!("OpusHead is {} bytes", packet.len())));
        }

        let version = packet[8];
        // Only the major version (high nibble) breaks compatibility
        if version >> 4 != 0 {
            return Err(Error::codec("opus", format!("unsupported version {version}")));
        }
        let channels = packet[9];
        if channels == 0 {
            return Err(Error::codec("opus", "zero channels"));
        }

        let mut head = OpusHead {
            version,
            channels,
            pre_skip: le_u16_at(packet, 10),
            input_sample_rate: le_u32_at(packet, 12),
            output_gain: le_u16_at(packet, 16) as i16,
            mapping_family: packet[18],
            stream_count: 1,
            coupled_count: (channels == 2) as u8,
            channel_mapping: Vec::new(),
        };

        if head.mapping_family == 0 {
            if channels > 2 {
                return Err(Error::codec("opus", format!("family 0 with {channels} channels")));
            }
        } else {
            let table_end = HEAD_LEN + 2 + channels as usize;
            if packet.len() < table_end {
                return Err(Error::codec("opus", "truncated channel mapping table"));
            }
            head.stream_count = packet[HEAD_LEN];
            head.coupled_count = packet[HEAD_LEN + 1];
            if head.stream_count == 0 || head.coupled_count > head.stream_count {
                return Err(Error::codec("opus", "bad stream counts"));
            }
            head.channel_mapping = packet[HEAD_LEN + 2..table_end].to_vec();
        }
        Ok(head)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEAD_LEN + 2 + self.channel_mapping.len());
        out.extend_from_slice(OPUS_SIGNATURE);
        out.push(self.version);
        out.push(self.channels);
        out.extend_from_slice(&self.pre_skip.to_le_bytes());
        out.extend_from_slice(&self.input_sample_rate.to_le_bytes());
        out.extend_from_slice(&self.output_gain.to_le_bytes());
        out.push(self.mapping_family);
        if self.mapping_family != 0 {
            out.push(self.stream_count);
            out.push(self.coupled_count);
            out.extend_from_slice(&self.channel_mapping);
        }
        out
    }
}

/// Parse an OpusTags packet. Bytes after the comment block are padding or
/// private data and are ignored.
pub fn parse_tags(packet: &[u8]) -> Result<VorbisComment> {
    if !is_tags(packet) {
        return Err(Error::codec("opus", "missing OpusTags signature"));
    }
    let (comment, _) = VorbisComment::parse(&packet[OPUS_TAGS.len()..])
        .map_err(|e| Error::codec("opus", e.to_string()))?;
    Ok(comment)
}

pub fn tags_packet(comment: &VorbisComment) -> Vec<u8> {
    let mut packet = OPUS_TAGS.to_vec();
    packet.extend_from_slice(&comment.to_bytes());
    packet
}
