// Vorbis comment block, shared by the Vorbis comment header and OpusTags

use std::io::{Cursor, Read};

use serde::Serialize;

use crate::utils::encoding::{decode_text, encode_text};
use crate::utils::io::{read_le_prefixed, read_le_u32};

/// Vendor string plus `FIELD=value` pairs, in stream order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VorbisComment {
    pub vendor_string: String,
    pub comments: Vec<(String, String)>,
}

impl VorbisComment {
    pub fn new(vendor: impl Into<String>) -> Self {
        VorbisComment { vendor_string: vendor.into(), comments: Vec::new() }
    }

    /// Read Vorbis comment from reader
    pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let vendor_string = decode_text(&read_le_prefixed(reader)?);

        let comment_count = read_le_u32(reader)? as usize;
        let mut comments = Vec::with_capacity(comment_count.min(256));
        for _ in 0..comment_count {
            let comment_string = decode_text(&read_le_prefixed(reader)?);

            // Parse comment (format: FIELD=value)
            if let Some((field, value)) = comment_string.split_once('=') {
                comments.push((field.to_string(), value.to_string()));
            }
        }

        Ok(VorbisComment { vendor_string, comments })
    }

    /// Parse a comment block at the start of `data`. Returns the block and the
    /// number of bytes it occupied.
    pub fn parse(data: &[u8]) -> std::io::Result<(Self, usize)> {
        let mut cursor = Cursor::new(data);
        let comment = Self::read(&mut cursor)?;
        Ok((comment, cursor.position() as usize))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let vendor = encode_text(&self.vendor_string);
        out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        out.extend_from_slice(&vendor);

        out.extend_from_slice(&(self.comments.len() as u32).to_le_bytes());
        for (field, value) in &self.comments {
            let entry = encode_text(&format!("{}={}", field, value));
            out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
            out.extend_from_slice(&entry);
        }
        out
    }

    /// Get a comment value by field name
    pub fn get(&self, field: &str) -> Option<&String> {
        self.comments
            .iter()
            .find(|(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.comments
            .iter()
            .filter(move |(f, _)| f.eq_ignore_ascii_case(field))
            .map(|(_, v)| v.as_str())
    }

    /// Replace every value of `field` with a single one
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.remove(field);
        self.comments.push((field.to_ascii_uppercase(), value.into()));
    }

    /// Add a value, keeping existing ones
    pub fn push(&mut self, field: &str, value: impl Into<String>) {
        self.comments.push((field.to_ascii_uppercase(), value.into()));
    }

    /// Remove every value of `field`. Returns how many were removed.
    pub fn remove(&mut self, field: &str) -> usize {
        let before = self.comments.len();
        self.comments.retain(|(f, _)| !f.eq_ignore_ascii_case(field));
        before - self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}
