// The pull-parser contract every container reader implements, plus a small
// driver that services it from any `Read + Seek` source.
//
// A demuxer never performs I/O. The caller hands it whatever bytes it has;
// the demuxer consumes a prefix and reports one `Event`. Unconsumed bytes
// must be passed again, followed by new ones, on the next call. After
// `Event::Seek` the next call must start with bytes from exactly that
// absolute offset.
//
// Borrowed data in an event (packet payloads) is valid until the next call
// into the same demuxer. Copy it out to keep it.

use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// One call's worth of progress
#[derive(Debug)]
pub struct Fed<'a, H, T> {
    /// Bytes of the input the demuxer is done with
    pub consumed: usize,
    pub event: Event<'a, H, T>,
}

impl<'a, H, T> Fed<'a, H, T> {
    pub fn new(consumed: usize, event: Event<'a, H, T>) -> Self {
        Fed { consumed, event }
    }
}

#[derive(Debug)]
pub enum Event<'a, H, T> {
    /// Feed more bytes
    More,
    /// Reposition the source to this absolute offset, then feed from there
    Seek(u64),
    /// Stream configuration decoded from the codec identification header
    Header(H),
    /// Name/value metadata
    Tag(T),
    Data(Packet<'a>),
    /// Recoverable problem. Demuxing continues with the next call.
    Warning(Error),
    Done,
}

/// A packet borrowed from the caller's input or the demuxer's buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub data: &'a [u8],
    /// Codec position at the end of this packet, when the container says
    pub granule: Option<u64>,
    pub bos: bool,
    pub eos: bool,
    /// Zero-based position in the logical stream, header packets included
    pub index: u64,
    pub serial: u32,
}

/// What a demuxer knows about its position and the whole stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemuxStatus {
    /// Absolute offset of the next byte the demuxer expects
    pub offset: u64,
    pub total_size: Option<u64>,
    pub total_samples: Option<u64>,
    pub sample_rate: Option<u32>,
}

impl DemuxStatus {
    /// Stream duration in seconds, once both length and rate are known
    pub fn duration(&self) -> Option<f64> {
        match (self.total_samples, self.sample_rate) {
            (Some(samples), Some(rate)) if rate > 0 => Some(samples as f64 / rate as f64),
            _ => None,
        }
    }
}

pub trait Demuxer {
    type Header;
    type Tag;

    fn feed<'a>(&'a mut self, input: &'a [u8]) -> Result<Fed<'a, Self::Header, Self::Tag>>;

    fn status(&self) -> &DemuxStatus;

    /// Tell the demuxer how large the source is. Enables probing and seeking.
    fn set_total_size(&mut self, size: u64);

    /// The source ran dry at the current offset. A demuxer may return an
    /// offset to resume from; `None` ends demuxing.
    fn input_ended(&mut self) -> Option<u64> {
        None
    }
}

/// Whether the driver should keep going after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Feeds a demuxer from a seekable reader, servicing `More` and `Seek`.
pub struct Driver<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    chunk: usize,
    /// Absolute offset of `buf[start]`
    position: u64,
    size: u64,
}

impl<R: Read + Seek> Driver<R> {
    pub fn new(mut reader: R, chunk: usize) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        let chunk = chunk.max(1);
        Ok(Driver { reader, buf: vec![0; chunk], start: 0, end: 0, chunk, position: 0, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Run until the demuxer is done, the source ends, or `on_event` stops.
    ///
    /// `More` and `Seek` are handled here; every other event, `Done`
    /// included, goes to `on_event`.
    pub fn run<D, F>(&mut self, demuxer: &mut D, mut on_event: F) -> Result<()>
    where
        D: Demuxer,
        F: FnMut(Event<'_, D::Header, D::Tag>) -> Result<Flow>,
    {
        demuxer.set_total_size(self.size);
        loop {
            let step = {
                let fed = demuxer.feed(&self.buf[self.start..self.end])?;
                self.start += fed.consumed;
                self.position += fed.consumed as u64;
                match fed.event {
                    Event::More => Step::Fill,
                    Event::Seek(offset) => Step::Seek(offset),
                    Event::Done => {
                        on_event(Event::Done)?;
                        Step::Stop
                    }
                    event => match on_event(event)? {
                        Flow::Continue => Step::Next,
                        Flow::Stop => Step::Stop,
                    },
                }
            };

            match step {
                Step::Next => {}
                Step::Stop => return Ok(()),
                Step::Seek(offset) => self.seek(offset)?,
                Step::Fill => {
                    if self.fill()? == 0 {
                        match demuxer.input_ended() {
                            Some(offset) => self.seek(offset)?,
                            None => {
                                debug!(position = self.position, "source exhausted");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        trace!(from = self.position, to = offset, "driver seek");
        self.reader.seek(SeekFrom::Start(offset))?;
        self.start = 0;
        self.end = 0;
        self.position = offset;
        Ok(())
    }

    /// Append one chunk behind the unconsumed bytes. Returns bytes read.
    fn fill(&mut self) -> Result<usize> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.buf.len() < self.end + self.chunk {
            self.buf.resize(self.end + self.chunk, 0);
        }
        let n = loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        self.end += n;
        Ok(n)
    }
}

enum Step {
    Next,
    Fill,
    Seek(u64),
    Stop,
}
