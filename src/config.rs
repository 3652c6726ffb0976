// Demuxer configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::seek::SeekFlags;

/// What to do when page sequence numbers skip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageGapPolicy {
    /// Report a warning, drop the open packet and keep going
    #[default]
    Continue,
    /// Stop with `PageSequence`
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Check page CRCs while demuxing
    pub verify_crc: bool,
    /// Bytes to scan for a capture pattern before giving up; 0 means unlimited
    pub max_sync_search: u64,
    pub page_gap: PageGapPolicy,
    /// Seek to the end of a sized source to learn the total duration
    pub probe_duration: bool,
    pub force_binary_search: bool,
    pub max_seek_iterations: u32,
    /// Read size used by the driver
    pub read_chunk: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        DemuxConfig {
            verify_crc: true,
            max_sync_search: 0,
            page_gap: PageGapPolicy::Continue,
            probe_duration: true,
            force_binary_search: false,
            max_seek_iterations: 64,
            read_chunk: 8192,
        }
    }
}

impl DemuxConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Io(e.into()))
    }

    pub fn seek_flags(&self) -> SeekFlags {
        SeekFlags { force_binary_search: self.force_binary_search }
    }
}
