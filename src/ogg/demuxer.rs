// Incremental Ogg demuxer for a single logical stream.
//
// Bytes flow through four states:
//
// - `Capture` looks for the next capture pattern and parses the header in
//   place. When the caller's input already holds the whole page, its CRC is
//   checked right there and packets are handed out of the input without a
//   copy.
// - `Body` gathers the rest of a page whose body was split across calls.
//   If its CRC fails, the bytes after the page's first byte were consumed
//   already; they are kept aside and scanned before any new input.
// - `Packets` walks the page with the `PacketAssembler`. The first packets
//   of the stream are codec headers and come out as `Header` and `Tag`
//   events; the rest are `Data`.
// - `Done` after the end-of-stream page.
//
// When the source size is known, the demuxer asks to seek near the end once
// the codec headers are read, finds the last granule position to learn the
// duration, and seeks back to the first audio page. `OggDemuxer::seek_sample`
// drives a `SeekEngine` over pages the same way.

use std::io;
use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{DemuxConfig, PageGapPolicy};
use crate::demux::{DemuxStatus, Demuxer, Event, Fed, Packet};
use crate::error::{Error, Result};
use crate::gather::{Gather, GatherBuffer};
use crate::ogg::assembler::{PacketAssembler, PacketSpan, Split};
use crate::ogg::page::{find_capture, PageHeader, Parse};
use crate::ogg::vorbis::{self, VorbisInfo};
use crate::ogg::{HEADER_MAX, MAX_PAGE_LEN};
use crate::opus::{self, OpusHead, OPUS_GRANULE_RATE};
use crate::seek::{Frame, SeekEngine, SeekPoint, SeekStep};
use crate::tags::VorbisComment;

/// Distance from the end of the source where duration probing starts
const PROBE_WINDOW: u64 = 2 * MAX_PAGE_LEN as u64;

/// Codec configuration decoded from the first packet of the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum StreamInfo {
    Vorbis(VorbisInfo),
    Opus(OpusHead),
    /// A codec this crate does not parse. Holds the first packet.
    Unknown { first_packet: Vec<u8> },
}

impl StreamInfo {
    fn detect(packet: &[u8]) -> Result<Self> {
        if vorbis::is_identification(packet) {
            VorbisInfo::parse(packet).map(StreamInfo::Vorbis)
        } else if opus::is_head(packet) {
            OpusHead::parse(packet).map(StreamInfo::Opus)
        } else {
            Ok(StreamInfo::Unknown { first_packet: packet.to_vec() })
        }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            StreamInfo::Vorbis(_) => "vorbis",
            StreamInfo::Opus(_) => "opus",
            StreamInfo::Unknown { .. } => "unknown",
        }
    }

    /// Rate of the granule position clock
    pub fn sample_rate(&self) -> Option<u32> {
        match self {
            StreamInfo::Vorbis(info) => Some(info.sample_rate),
            StreamInfo::Opus(_) => Some(OPUS_GRANULE_RATE),
            StreamInfo::Unknown { .. } => None,
        }
    }

    /// Packets at the start of the stream that carry headers, not audio
    pub fn header_packets(&self) -> u64 {
        match self {
            StreamInfo::Vorbis(_) => 3,
            StreamInfo::Opus(_) => 2,
            StreamInfo::Unknown { .. } => 1,
        }
    }

    /// Granule positions before the first output sample
    pub fn pre_skip(&self) -> u64 {
        match self {
            StreamInfo::Opus(head) => head.pre_skip as u64,
            _ => 0,
        }
    }

    /// The header declares distinct lower and upper bitrate bounds
    pub fn variable_bitrate(&self) -> bool {
        match self {
            StreamInfo::Vorbis(info) => {
                info.bitrate_minimum > 0 && info.bitrate_maximum > 0 && info.bitrate_minimum != info.bitrate_maximum
            }
            _ => false,
        }
    }

    fn parse_comment(&self, packet: &[u8]) -> Option<Result<VorbisComment>> {
        match self {
            StreamInfo::Vorbis(_) => Some(vorbis::parse_comment(packet)),
            StreamInfo::Opus(_) => Some(opus::parse_tags(packet)),
            StreamInfo::Unknown { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Capture,
    Body,
    Packets(Source),
    Done,
}

/// Where the current page body is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Still in the caller's input, consumed packet by packet
    Input,
    /// Copied into the gather buffer
    Gathered,
}

#[derive(Debug)]
enum Mode {
    Normal,
    /// Looking for the last granule position near the end of the source
    ProbeEnd,
    /// Reporting pages to a running seek
    SeekProbe(SeekEngine),
}

/// A data packet ready to be borrowed once the step loop is left
struct Delivery {
    span: PacketSpan,
    source: Source,
    window: Range<usize>,
    base: usize,
    index: u64,
}

enum Step {
    Again,
    Emit(Event<'static, StreamInfo, VorbisComment>),
    Packet(Delivery),
}

enum HeaderPacket {
    Info(StreamInfo),
    Tag(Result<VorbisComment>),
    Pass,
}

pub struct OggDemuxer {
    config: DemuxConfig,
    status: DemuxStatus,
    state: State,
    mode: Mode,

    gather: GatherBuffer,
    assembler: PacketAssembler,
    header: PageHeader,
    raw_header: [u8; HEADER_MAX],
    raw_header_len: usize,
    /// Absolute offset of the current page
    page_start: u64,
    /// Body bytes of the current page consumed from the caller's input
    body_taken: usize,
    /// Consumed bytes of a rejected page that still have to be scanned
    replay: Vec<u8>,
    replay_start: u64,

    serial: Option<u32>,
    expected_sequence: Option<u32>,
    packet_index: u64,
    info: Option<StreamInfo>,
    headers_done: bool,
    data_start: Option<u64>,

    in_sync: bool,
    sync_skipped: u64,
    probe_done: bool,
    end_granule: Option<u64>,
    pending_seek: Option<u64>,
    resolved_seek: Option<u64>,
    pending_warning: Option<Error>,
}

impl Default for OggDemuxer {
    fn default() -> Self {
        Self::new(DemuxConfig::default())
    }
}

impl OggDemuxer {
    pub fn new(config: DemuxConfig) -> Self {
        OggDemuxer {
            config,
            status: DemuxStatus::default(),
            state: State::Capture,
            mode: Mode::Normal,
            gather: GatherBuffer::with_capacity(MAX_PAGE_LEN),
            assembler: PacketAssembler::new(),
            header: PageHeader::new(0, 0, 0, 0),
            raw_header: [0; HEADER_MAX],
            raw_header_len: 0,
            page_start: 0,
            body_taken: 0,
            replay: Vec::new(),
            replay_start: 0,
            serial: None,
            expected_sequence: None,
            packet_index: 0,
            info: None,
            headers_done: false,
            data_start: None,
            in_sync: true,
            sync_skipped: 0,
            probe_done: false,
            end_granule: None,
            pending_seek: None,
            resolved_seek: None,
            pending_warning: None,
        }
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    /// Absolute offset of the first page after the codec headers
    pub fn data_start(&self) -> Option<u64> {
        self.data_start
    }

    /// Byte offset the last seek resolved to. `None` while it runs or after
    /// it failed.
    pub fn seek_offset(&self) -> Option<u64> {
        self.resolved_seek
    }

    /// Last granule position of the stream, once probed
    pub fn end_granule(&self) -> Option<u64> {
        self.end_granule
    }

    /// Start seeking to `sample` (in output samples). The next call to
    /// `feed` returns the first `Seek`; decoding resumes at the page where
    /// the sample lives once the search converges.
    ///
    /// Needs the codec headers, the source size and a probed duration.
    pub fn seek_sample(&mut self, sample: u64) -> Result<()> {
        if !matches!(self.mode, Mode::Normal) {
            return Err(Error::Unseekable("a probe is still running"));
        }
        let info = self.info.as_ref().ok_or(Error::Unseekable("codec headers not read yet"))?;
        let data_start = self.data_start.ok_or(Error::Unseekable("audio start unknown"))?;
        let end = self.end_granule.ok_or(Error::Unseekable("stream length unknown"))?;
        let size = self.status.total_size.ok_or(Error::Unseekable("source size unknown"))?;

        let target = sample + info.pre_skip();
        let mut engine = SeekEngine::new(
            target,
            SeekPoint::new(0, data_start),
            SeekPoint::new(end, size),
            self.config.seek_flags(),
        )?
        .with_max_iterations(self.config.max_seek_iterations);
        if info.variable_bitrate() {
            engine = engine.unreliable();
        }
        debug!(sample, granule = target, "seek requested");

        self.resolved_seek = None;
        let offset = match engine.start(None)? {
            SeekStep::Seek(offset) => {
                self.mode = Mode::SeekProbe(engine);
                offset
            }
            SeekStep::Resolved(offset) => {
                self.resolved_seek = Some(offset);
                offset
            }
        };
        self.pending_seek = Some(offset);
        Ok(())
    }

    fn step(&mut self, input: &[u8], used: &mut usize) -> Result<Step> {
        match self.state {
            State::Done => Ok(Step::Emit(Event::Done)),
            State::Capture if !self.replay.is_empty() => self.rescan(input, used),
            State::Capture => self.capture(input, used),
            State::Body => self.gather_body(input, used),
            State::Packets(source) => self.next_from_page(source, input, used),
        }
    }

    fn capture(&mut self, input: &[u8], used: &mut usize) -> Result<Step> {
        let rest = &input[*used..];
        let Some(pos) = find_capture(rest) else {
            self.skip_junk(rest.len())?;
            *used = input.len();
            return Ok(Step::Emit(Event::More));
        };
        self.skip_junk(pos)?;
        *used += pos;

        let candidate = &input[*used..];
        let header_len = match PageHeader::parse(candidate) {
            Ok(Parse::NeedMore(_)) => return Ok(Step::Emit(Event::More)),
            Ok(Parse::Complete(header, header_len)) => {
                self.header = header;
                header_len
            }
            Err(err) if err.is_page_local() => return self.reject_candidate(err, used),
            Err(err) => return Err(err),
        };
        self.raw_header[..header_len].copy_from_slice(&candidate[..header_len]);
        self.raw_header_len = header_len;
        self.page_start = self.status.offset + *used as u64;

        let page_len = self.header.page_len();
        if candidate.len() >= page_len {
            let body = &candidate[header_len..page_len];
            if let Err(err) = verify_page(self.config.verify_crc, &self.header, &self.raw_header[..header_len], body) {
                return self.reject_candidate(err, used);
            }
            *used += header_len;
            self.body_taken = 0;
            self.page_found();
            return self.page_verified(Source::Input, used);
        }

        *used += header_len;
        self.gather.begin(self.header.body_len());
        self.state = State::Body;
        Ok(Step::Again)
    }

    fn gather_body(&mut self, input: &[u8], used: &mut usize) -> Result<Step> {
        let raw = &self.raw_header[..self.raw_header_len];
        let (taken, gathered) = self.gather.gather(&input[*used..]);
        let (source, checked) = match gathered {
            Gather::Pending => {
                *used += taken;
                return Ok(Step::Emit(Event::More));
            }
            Gather::Borrowed(body) => (Source::Input, verify_page(self.config.verify_crc, &self.header, raw, body)),
            Gather::Buffered(body) => (Source::Gathered, verify_page(self.config.verify_crc, &self.header, raw, body)),
        };
        *used += taken;
        self.body_taken = 0;

        if let Err(err) = checked {
            // Everything after the first byte of the rejected page gets scanned again
            self.replay.clear();
            self.replay.extend_from_slice(&self.raw_header[1..self.raw_header_len]);
            if source == Source::Gathered {
                self.replay.extend_from_slice(self.gather.bytes());
            }
            self.replay_start = self.page_start + 1;
            self.state = State::Capture;
            if self.in_sync && matches!(self.mode, Mode::Normal) {
                self.in_sync = false;
                warn!(offset = self.page_start, %err, "dropping page");
                return Ok(Step::Emit(Event::Warning(err)));
            }
            self.in_sync = false;
            debug!(offset = self.page_start, %err, "false capture pattern");
            return Ok(Step::Again);
        }
        self.page_found();
        self.page_verified(source, used)
    }

    /// The candidate at `used` is not a page. Step past its first byte.
    fn reject_candidate(&mut self, err: Error, used: &mut usize) -> Result<Step> {
        *used += 1;
        let was_in_sync = self.in_sync;
        self.skip_junk(1)?;
        if was_in_sync && matches!(self.mode, Mode::Normal) {
            warn!(offset = self.status.offset + *used as u64 - 1, %err, "bad page, resyncing");
            return Ok(Step::Emit(Event::Warning(err)));
        }
        debug!(%err, "false capture pattern");
        Ok(Step::Again)
    }

    /// Capture over the replay buffer. Its bytes sit right before `input`
    /// and were consumed already, so pages found here are copied into the
    /// gather buffer.
    fn rescan(&mut self, input: &[u8], used: &mut usize) -> Result<Step> {
        let Some(pos) = find_capture(&self.replay) else {
            self.drop_replay(self.replay.len())?;
            return Ok(Step::Again);
        };
        self.drop_replay(pos)?;

        let header_len = match PageHeader::parse(&self.replay) {
            Ok(Parse::NeedMore(needed)) => {
                let take = (needed - self.replay.len()).min(input.len() - *used);
                if take == 0 {
                    return Ok(Step::Emit(Event::More));
                }
                self.replay.extend_from_slice(&input[*used..*used + take]);
                *used += take;
                return Ok(Step::Again);
            }
            Ok(Parse::Complete(header, header_len)) => {
                self.header = header;
                header_len
            }
            Err(err) if err.is_page_local() => {
                debug!(%err, "false capture pattern");
                self.drop_replay(1)?;
                return Ok(Step::Again);
            }
            Err(err) => return Err(err),
        };
        self.raw_header[..header_len].copy_from_slice(&self.replay[..header_len]);
        self.raw_header_len = header_len;
        self.page_start = self.replay_start;

        let page_len = self.header.page_len();
        let held = self.replay.len().min(page_len);
        self.gather.begin(self.header.body_len());
        self.gather.push(&self.replay[header_len..held]);
        if held < page_len {
            self.drop_replay_page(held);
            self.state = State::Body;
            return Ok(Step::Again);
        }

        let body = &self.replay[header_len..page_len];
        if let Err(err) = verify_page(self.config.verify_crc, &self.header, &self.raw_header[..header_len], body) {
            debug!(%err, "false capture pattern");
            self.drop_replay(1)?;
            return Ok(Step::Again);
        }
        self.drop_replay_page(page_len);
        self.body_taken = 0;
        self.page_found();
        self.page_verified(Source::Gathered, used)
    }

    /// Drop replay bytes that hold no page
    fn drop_replay(&mut self, n: usize) -> Result<()> {
        self.replay.drain(..n);
        self.replay_start += n as u64;
        self.skip_junk(n)
    }

    /// Drop replay bytes that were taken over by the current page
    fn drop_replay_page(&mut self, n: usize) {
        self.replay.drain(..n);
        self.replay_start += n as u64;
    }

    fn skip_junk(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.in_sync = false;
        self.sync_skipped += n as u64;
        let limit = self.config.max_sync_search;
        if limit > 0 && self.sync_skipped > limit && matches!(self.mode, Mode::Normal) {
            warn!(skipped = self.sync_skipped, "no page found within the sync search limit");
            return Err(Error::CapturePattern);
        }
        Ok(())
    }

    fn page_found(&mut self) {
        if self.sync_skipped > 0 && matches!(self.mode, Mode::Normal) {
            warn!(skipped = self.sync_skipped, offset = self.page_start, "skipped bytes before page");
        }
        self.sync_skipped = 0;
        self.in_sync = true;
    }

    fn page_verified(&mut self, source: Source, used: &mut usize) -> Result<Step> {
        let serial = self.header.bitstream_serial;
        let ours = *self.serial.get_or_insert(serial);
        if serial != ours {
            self.skip_body(source, used);
            if self.assembler.is_pending() && matches!(self.mode, Mode::Normal) {
                self.assembler.mark_hole();
                let err = Error::Serial { expected: ours, found: serial };
                warn!(%err, "foreign page inside a continued packet");
                return Ok(Step::Emit(Event::Warning(err)));
            }
            debug!(serial, "skipping page of another stream");
            return Ok(Step::Again);
        }

        match self.mode {
            Mode::ProbeEnd => return Ok(self.probe_page(source, used)),
            Mode::SeekProbe(_) => return Ok(self.seek_page(source, used)),
            Mode::Normal => {}
        }

        debug!(
            sequence = self.header.page_sequence,
            offset = self.page_start,
            segments = self.header.segment_count(),
            granule = ?self.header.granule(),
            "page"
        );

        let mut gap = None;
        if let Some(expected) = self.expected_sequence {
            let found = self.header.page_sequence;
            if found != expected {
                let err = Error::PageSequence { serial, expected, found };
                if self.config.page_gap == PageGapPolicy::Fail {
                    return Err(err);
                }
                warn!(%err, "page sequence gap");
                self.assembler.mark_hole();
                gap = Some(err);
            }
        }
        self.expected_sequence = Some(self.header.page_sequence.wrapping_add(1));

        if let Err(err) = self.assembler.load_page(&self.header) {
            self.skip_body(source, used);
            return Ok(Step::Emit(Event::Warning(err)));
        }

        if self.headers_done && self.data_start.is_none() && !self.header.is_continued() {
            self.data_start = Some(self.page_start);
            debug!(offset = self.page_start, "audio data starts");
            if let Some(offset) = self.start_probe() {
                return Ok(Step::Emit(Event::Seek(offset)));
            }
        }

        self.state = State::Packets(source);
        Ok(match gap {
            Some(err) => Step::Emit(Event::Warning(err)),
            None => Step::Again,
        })
    }

    fn next_from_page(&mut self, source: Source, input: &[u8], used: &mut usize) -> Result<Step> {
        let body_len = self.header.body_len();
        let cursor = self.assembler.body_cursor();

        let (split, window) = match source {
            Source::Input => {
                // Catch up with a fragment the assembler skipped on its own
                *used += cursor.saturating_sub(self.body_taken);
                self.body_taken = cursor;
                let window = *used..*used + (body_len - cursor);
                let Some(body) = input.get(window.clone()) else {
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "unconsumed page body was not fed again",
                    )));
                };
                let split = self.assembler.next_span(body, cursor);
                let advanced = self.assembler.body_cursor() - cursor;
                *used += advanced;
                self.body_taken += advanced;
                (split, window)
            }
            Source::Gathered => {
                let body = self.gather.bytes().get(cursor..).unwrap_or_default();
                (self.assembler.next_span(body, cursor), 0..0)
            }
        };

        match split {
            Split::NeedContinuation => Ok(Step::Again),
            Split::NoMorePackets => Ok(self.page_done(source, used)),
            Split::Packet(span) => {
                let base = match source {
                    Source::Input => cursor,
                    Source::Gathered => 0,
                };
                self.classify(Delivery { span, source, window, base, index: self.packet_index }, input)
            }
        }
    }

    fn page_done(&mut self, source: Source, used: &mut usize) -> Step {
        self.skip_body(source, used);
        if self.header.is_eos() {
            info!(packets = self.packet_index, "end of stream");
            self.state = State::Done;
            return Step::Emit(Event::Done);
        }
        Step::Again
    }

    /// Route a finished packet: codec headers become events, the rest is data
    fn classify(&mut self, delivery: Delivery, input: &[u8]) -> Result<Step> {
        self.packet_index += 1;
        if self.headers_done {
            return Ok(Step::Packet(delivery));
        }

        let body = match delivery.source {
            Source::Input => &input[delivery.window.clone()],
            Source::Gathered => self.gather.bytes(),
        };
        let data = self.assembler.span_data(&delivery.span, body, delivery.base);
        let packet = match &self.info {
            None => HeaderPacket::Info(StreamInfo::detect(data)?),
            Some(info) if delivery.index == 1 => match info.parse_comment(data) {
                Some(comment) => HeaderPacket::Tag(comment),
                None => HeaderPacket::Pass,
            },
            Some(_) => HeaderPacket::Pass,
        };

        let header_packets = match &packet {
            HeaderPacket::Info(info) => info.header_packets(),
            _ => self.info.as_ref().map_or(1, StreamInfo::header_packets),
        };
        if self.packet_index >= header_packets {
            self.headers_done = true;
        }

        Ok(match packet {
            HeaderPacket::Info(info) => {
                info!(codec = info.codec(), serial = ?self.serial, "stream header");
                self.status.sample_rate = info.sample_rate();
                self.info = Some(info.clone());
                Step::Emit(Event::Header(info))
            }
            HeaderPacket::Tag(Ok(comment)) => Step::Emit(Event::Tag(comment)),
            HeaderPacket::Tag(Err(err)) => {
                warn!(%err, "unreadable comment header");
                Step::Emit(Event::Warning(err))
            }
            HeaderPacket::Pass => Step::Packet(delivery),
        })
    }

    fn skip_body(&mut self, source: Source, used: &mut usize) {
        if source == Source::Input {
            let body_len = self.header.body_len();
            *used += body_len.saturating_sub(self.body_taken);
            self.body_taken = body_len;
        }
        self.state = State::Capture;
    }

    fn start_probe(&mut self) -> Option<u64> {
        if self.probe_done || !self.config.probe_duration {
            return None;
        }
        let size = self.status.total_size?;
        let data_start = self.data_start?;
        self.probe_done = true;
        self.mode = Mode::ProbeEnd;
        let offset = size.saturating_sub(PROBE_WINDOW).max(data_start);
        debug!(offset, size, "probing duration");
        Some(offset)
    }

    fn probe_page(&mut self, source: Source, used: &mut usize) -> Step {
        if let Some(granule) = self.header.granule() {
            self.end_granule = Some(self.end_granule.map_or(granule, |end| end.max(granule)));
        }
        self.skip_body(source, used);
        if self.header.is_eos() {
            return Step::Emit(Event::Seek(self.finish_probe()));
        }
        Step::Again
    }

    /// Record the probed duration and return where audio starts
    fn finish_probe(&mut self) -> u64 {
        self.mode = Mode::Normal;
        let pre_skip = self.info.as_ref().map_or(0, StreamInfo::pre_skip);
        self.status.total_samples = self.end_granule.map(|end| end.saturating_sub(pre_skip));
        info!(total_samples = ?self.status.total_samples, duration = ?self.status.duration(), "duration probed");
        self.data_start.unwrap_or(0)
    }

    fn seek_page(&mut self, source: Source, used: &mut usize) -> Step {
        let granule = self.header.granule();
        let frame_size = self.header.page_len() as u64;
        self.skip_body(source, used);
        let Some(end) = granule else {
            return Step::Again;
        };
        let Mode::SeekProbe(engine) = &mut self.mode else {
            return Step::Again;
        };
        let step = engine.on_frame(Frame { start: None, end, offset: self.page_start, size: frame_size });
        Step::Emit(Event::Seek(self.after_seek_step(step)))
    }

    fn after_seek_step(&mut self, step: Result<SeekStep>) -> u64 {
        match step {
            Ok(SeekStep::Seek(offset)) => offset,
            Ok(SeekStep::Resolved(offset)) => {
                debug!(offset, "seek resolved");
                self.mode = Mode::Normal;
                self.resolved_seek = Some(offset);
                offset
            }
            Err(err) => {
                warn!(%err, "seek failed, returning to the start of audio");
                self.mode = Mode::Normal;
                self.pending_warning = Some(err);
                self.data_start.unwrap_or(0)
            }
        }
    }

    /// Forget everything tied to the previous read position
    fn reposition(&mut self, offset: u64) {
        self.state = State::Capture;
        self.gather.reset();
        self.replay.clear();
        self.assembler.reset();
        self.expected_sequence = None;
        self.in_sync = false;
        self.sync_skipped = 0;
        self.body_taken = 0;
        self.status.offset = offset;
    }
}

impl Demuxer for OggDemuxer {
    type Header = StreamInfo;
    type Tag = VorbisComment;

    fn feed<'a>(&'a mut self, input: &'a [u8]) -> Result<Fed<'a, StreamInfo, VorbisComment>> {
        if let Some(warning) = self.pending_warning.take() {
            return Ok(Fed::new(0, Event::Warning(warning)));
        }
        if let Some(offset) = self.pending_seek.take() {
            self.reposition(offset);
            return Ok(Fed::new(0, Event::Seek(offset)));
        }

        let mut used = 0;
        let delivery = loop {
            let step = match self.step(input, &mut used) {
                Ok(step) => step,
                Err(err) => {
                    self.status.offset += used as u64;
                    self.state = State::Done;
                    return Err(err);
                }
            };
            match step {
                Step::Again => continue,
                Step::Packet(delivery) => break delivery,
                Step::Emit(event) => {
                    match &event {
                        Event::Seek(offset) => self.reposition(*offset),
                        _ => self.status.offset += used as u64,
                    }
                    return Ok(Fed::new(used, event));
                }
            }
        };
        self.status.offset += used as u64;

        let body = match delivery.source {
            Source::Input => &input[delivery.window.clone()],
            Source::Gathered => self.gather.bytes(),
        };
        let span = &delivery.span;
        let packet = Packet {
            data: self.assembler.span_data(span, body, delivery.base),
            granule: span.granule,
            bos: span.bos,
            eos: span.eos,
            index: delivery.index,
            serial: self.serial.unwrap_or_default(),
        };
        Ok(Fed::new(used, Event::Data(packet)))
    }

    fn status(&self) -> &DemuxStatus {
        &self.status
    }

    fn set_total_size(&mut self, size: u64) {
        self.status.total_size = Some(size);
    }

    fn input_ended(&mut self) -> Option<u64> {
        let offset = if matches!(self.mode, Mode::ProbeEnd) {
            self.finish_probe()
        } else if let Mode::SeekProbe(engine) = &mut self.mode {
            let step = engine.on_miss();
            self.after_seek_step(step)
        } else {
            if self.state != State::Done {
                debug!(offset = self.status.offset, pending = self.assembler.is_pending(), "input ended mid-stream");
            }
            return None;
        };
        self.reposition(offset);
        Some(offset)
    }
}

fn verify_page(enabled: bool, header: &PageHeader, raw_header: &[u8], body: &[u8]) -> Result<()> {
    if enabled {
        header.verify(raw_header, body)
    } else {
        Ok(())
    }
}
