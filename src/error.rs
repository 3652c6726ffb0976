// Error taxonomy shared by the demuxer, the muxer and the seek engine

use std::fmt;

/// Coarse error classes. Every [`Error`] maps onto exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad capture pattern, version or flag bits (`EHDR`)
    Header,
    /// Page serial does not match the stream being assembled (`ESERIAL`)
    Serial,
    /// Gap in page sequence numbers (`EPAGENUM`), recoverable
    PageSequence,
    /// Checksum mismatch (`ECRC`)
    Crc,
    /// Packet too large to lace into one page (`EBIGPKT`)
    PacketTooBig,
    /// Continuation flag disagrees with the assembler state (`ECONTPKT`)
    Continuation,
    /// Malformed codec header packet
    Codec,
    /// Seek could not be started or did not converge
    Seek,
    /// Caller I/O or allocation failure (`ESYS`)
    Sys,
}

impl ErrorKind {
    /// Short code used in logs and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Header => "EHDR",
            ErrorKind::Serial => "ESERIAL",
            ErrorKind::PageSequence => "EPAGENUM",
            ErrorKind::Crc => "ECRC",
            ErrorKind::PacketTooBig => "EBIGPKT",
            ErrorKind::Continuation => "ECONTPKT",
            ErrorKind::Codec => "ECODEC",
            ErrorKind::Seek => "ESEEK",
            ErrorKind::Sys => "ESYS",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid capture pattern")]
    CapturePattern,

    #[error("unsupported stream structure version {0}")]
    Version(u8),

    #[error("reserved header flag bits set: {0:#04x}")]
    HeaderFlags(u8),

    #[error("page serial {found:#010x} does not match stream {expected:#010x}")]
    Serial { expected: u32, found: u32 },

    #[error("page sequence gap on stream {serial:#010x}: expected {expected}, found {found}")]
    PageSequence { serial: u32, expected: u32, found: u32 },

    #[error("CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Crc { stored: u32, computed: u32 },

    #[error("packet of {len} bytes needs {segments} lacing segments, a page holds at most 255")]
    PacketTooBig { len: usize, segments: usize },

    #[error("page continuation flag is {flag}, assembler pending continuation is {pending}")]
    Continuation { flag: bool, pending: bool },

    #[error("invalid {codec} header: {reason}")]
    Codec { codec: &'static str, reason: String },

    #[error("stream is not seekable: {0}")]
    Unseekable(&'static str),

    #[error("seek bounds collapsed at byte {offset} without reaching sample {target}")]
    SeekCollapsed { target: u64, offset: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CapturePattern | Error::Version(_) | Error::HeaderFlags(_) => ErrorKind::Header,
            Error::Serial { .. } => ErrorKind::Serial,
            Error::PageSequence { .. } => ErrorKind::PageSequence,
            Error::Crc { .. } => ErrorKind::Crc,
            Error::PacketTooBig { .. } => ErrorKind::PacketTooBig,
            Error::Continuation { .. } => ErrorKind::Continuation,
            Error::Codec { .. } => ErrorKind::Codec,
            Error::Unseekable(_) | Error::SeekCollapsed { .. } => ErrorKind::Seek,
            Error::Io(_) => ErrorKind::Sys,
        }
    }

    /// Errors that only invalidate the current page. The demuxer resumes
    /// capture scanning after them.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Header | ErrorKind::Crc | ErrorKind::Continuation | ErrorKind::Serial
        )
    }

    pub(crate) fn codec(codec: &'static str, reason: impl Into<String>) -> Self {
        Error::Codec { codec, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
