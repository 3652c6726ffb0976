// CLI command implementations
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use oxidemux::ogg::page::{find_capture, PageHeader, Parse};
use oxidemux::ogg::{OggDemuxer, StreamInfo};
use oxidemux::{retag, DemuxConfig, DemuxStatus, Demuxer, Driver, ErrorKind, Event, Flow, VorbisComment};

use crate::cli::config::{parse_assignment, Commands, Config};
use crate::cli::{expand_files, OutputFormatter};

/// Run the parsed command line
pub fn run(config: &Config) -> Result<()> {
    let demux_config = match &config.config {
        Some(path) => DemuxConfig::from_json_file(path)
            .with_context(|| format!("loading demuxer settings from {}", path.display()))?,
        None => DemuxConfig::default(),
    };
    let formatter = OutputFormatter::new(config.format, config.quiet);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &config.command {
        Commands::Pages { files } => for_each_file(files, &formatter, |path| {
            let data = fs::read(path)?;
            Ok(json!({ "file": path, "pages": page_rows(&data) }))
        }, &mut out),
        Commands::Packets { files, data, limit } => for_each_file(files, &formatter, |path| {
            let packets = packet_rows(path, &demux_config, *data, *limit)?;
            Ok(json!({ "file": path, "packets": packets }))
        }, &mut out),
        Commands::Info { files } => for_each_file(files, &formatter, |path| {
            serde_json::to_value(file_info(path, &demux_config)?).context("serializing info")
        }, &mut out),
        Commands::Seek { file, sample } => {
            let landing = seek(file, &demux_config, *sample)?;
            formatter.output(&serde_json::to_value(landing)?, &mut out)?;
            Ok(())
        }
        Commands::Retag { file, set, remove, output } => {
            let target = output.as_deref().unwrap_or(file);
            let comment = command_retag(file, set, remove, target)?;
            formatter.print_success(&format!("Updated comments of {}", target.display()));
            formatter.output(&serde_json::to_value(comment)?, &mut out)?;
            Ok(())
        }
    }
}

/// Print one document per file. A failing file is reported and the rest
/// still run; the command fails if any did.
fn for_each_file<F>(patterns: &[String], formatter: &OutputFormatter, mut document: F, out: &mut impl Write) -> Result<()>
where
    F: FnMut(&Path) -> Result<Value>,
{
    let mut failed = 0;
    for path in expand_files(patterns)? {
        match document(&path) {
            Ok(value) => formatter.output(&value, out)?,
            Err(e) => {
                formatter.print_error(&format!("{}: {:#}", path.display(), e));
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} file(s) failed");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PageRow {
    pub offset: usize,
    pub serial: u32,
    pub sequence: u32,
    pub granule: Option<u64>,
    pub flags: String,
    pub segments: usize,
    pub body: usize,
    pub packets: usize,
    pub crc_ok: bool,
}

/// Every page in `data`, including ones with a bad checksum
pub fn page_rows(data: &[u8]) -> Vec<PageRow> {
    let mut rows = Vec::new();
    let mut pos = 0;
    while let Some(found) = find_capture(&data[pos..]) {
        let at = pos + found;
        let page = &data[at..];
        let Ok(Parse::Complete(header, header_len)) = PageHeader::parse(page) else {
            pos = at + 1;
            continue;
        };
        let page_len = header.page_len();
        if page.len() < page_len {
            warn!(offset = at, "truncated page at end of file");
            break;
        }
        let crc_ok = header.verify(&page[..header_len], &page[header_len..page_len]).is_ok();
        let flags = [(header.is_bos(), "bos"), (header.is_eos(), "eos"), (header.is_continued(), "cont")]
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",");
        rows.push(PageRow {
            offset: at,
            serial: header.bitstream_serial,
            sequence: header.page_sequence,
            granule: header.granule(),
            flags,
            segments: header.segment_count(),
            body: header.body_len(),
            packets: header.packets_in_page(),
            crc_ok,
        });
        // A page with a bad checksum may be a false capture; look inside it
        pos = if crc_ok { at + page_len } else { at + 1 };
    }
    rows
}

#[derive(Debug, Serialize)]
pub struct PacketRow {
    pub index: u64,
    pub size: usize,
    pub granule: Option<u64>,
    pub bos: bool,
    pub eos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

pub fn packet_rows(path: &Path, config: &DemuxConfig, with_data: bool, limit: Option<usize>) -> Result<Vec<PacketRow>> {
    let mut demuxer = OggDemuxer::new(config.clone());
    let mut driver = open(path, config)?;
    let mut rows = Vec::new();
    driver.run(&mut demuxer, |event| {
        match event {
            Event::Data(p) => {
                rows.push(PacketRow {
                    index: p.index,
                    size: p.data.len(),
                    granule: p.granule,
                    bos: p.bos,
                    eos: p.eos,
                    data: with_data.then(|| STANDARD.encode(p.data)),
                });
                if limit.is_some_and(|max| rows.len() >= max) {
                    return Ok(Flow::Stop);
                }
            }
            Event::Warning(err) => warn!(%err, code = err.kind().code(), "demux warning"),
            _ => {}
        }
        Ok(Flow::Continue)
    })?;
    Ok(rows)
}

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub file: PathBuf,
    pub size: u64,
    pub modified: Option<String>,
    pub serial: Option<u32>,
    pub stream: Option<StreamInfo>,
    pub tags: Option<VorbisComment>,
    pub status: DemuxStatus,
    pub duration: Option<f64>,
    pub warnings: Vec<String>,
}

pub fn file_info(path: &Path, config: &DemuxConfig) -> Result<FileInfo> {
    let metadata = fs::metadata(path).with_context(|| format!("reading metadata of {}", path.display()))?;
    let modified = metadata
        .modified()
        .ok()
        .map(|mtime| DateTime::<Utc>::from(mtime).format("%Y-%m-%d %H:%M:%S UTC").to_string());

    let mut demuxer = OggDemuxer::new(config.clone());
    let mut driver = open(path, config)?;
    let mut stream: Option<StreamInfo> = None;
    let mut tags: Option<VorbisComment> = None;
    let mut warnings = Vec::new();
    driver.run(&mut demuxer, |event| {
        match event {
            Event::Header(info) => stream = Some(info),
            Event::Tag(comment) => tags = Some(comment),
            // Duration is probed before the first audio packet comes out
            Event::Data(p) if stream.as_ref().is_some_and(|s| p.index >= s.header_packets()) => {
                return Ok(Flow::Stop);
            }
            Event::Warning(err) => warnings.push(format!("{}: {}", err.kind().code(), err)),
            _ => {}
        }
        Ok(Flow::Continue)
    })?;

    let status = demuxer.status().clone();
    Ok(FileInfo {
        file: path.to_path_buf(),
        size: metadata.len(),
        modified,
        serial: demuxer.serial(),
        stream,
        tags,
        duration: status.duration(),
        status,
        warnings,
    })
}

#[derive(Debug, Serialize)]
pub struct SeekLanding {
    pub sample: u64,
    /// Granule position of the page decoding resumes at
    pub granule: Option<u64>,
    pub offset: u64,
}

pub fn seek(path: &Path, config: &DemuxConfig, sample: u64) -> Result<SeekLanding> {
    let mut demuxer = OggDemuxer::new(config.clone());
    let mut driver = open(path, config)?;
    let mut header_packets: Option<u64> = None;
    driver.run(&mut demuxer, |event| match event {
        Event::Header(info) => {
            header_packets = Some(info.header_packets());
            Ok(Flow::Continue)
        }
        Event::Data(p) if header_packets.is_some_and(|n| p.index >= n) => Ok(Flow::Stop),
        _ => Ok(Flow::Continue),
    })?;

    demuxer
        .seek_sample(sample)
        .with_context(|| format!("seeking {} to sample {sample}", path.display()))?;
    let mut granule = None;
    let mut failure = None;
    driver.run(&mut demuxer, |event| match event {
        Event::Data(p) if p.granule.is_some() => {
            granule = p.granule;
            Ok(Flow::Stop)
        }
        Event::Warning(err) if err.kind() == ErrorKind::Seek => {
            failure = Some(err);
            Ok(Flow::Stop)
        }
        _ => Ok(Flow::Continue),
    })?;
    if let Some(err) = failure {
        return Err(err).with_context(|| format!("seeking {} to sample {sample}", path.display()));
    }
    let offset = demuxer.seek_offset().context("seek did not resolve")?;
    info!(sample, ?granule, offset, "seek finished");
    Ok(SeekLanding { sample, granule, offset })
}

/// Apply `--remove` then `--set`, rewrite, and write to `target`
pub fn command_retag(file: &Path, set: &[String], remove: &[String], target: &Path) -> Result<VorbisComment> {
    let data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let (info, existing) = retag::read_tags(&data).with_context(|| format!("reading tags of {}", file.display()))?;
    let mut comment = existing.unwrap_or_else(|| VorbisComment::new(env!("CARGO_PKG_NAME")));

    for key in remove {
        comment.remove(key);
    }
    for arg in set {
        let Some((key, value)) = parse_assignment(arg) else {
            bail!("expected KEY=VALUE, got {arg:?}");
        };
        comment.set(key, value);
    }

    let rewritten = retag::retag(&data, &comment)
        .with_context(|| format!("rewriting {} stream in {}", info.codec(), file.display()))?;
    let tmp = target.with_extension("oxidemux-tmp");
    fs::write(&tmp, &rewritten).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, target).with_context(|| format!("replacing {}", target.display()))?;
    Ok(comment)
}

fn open(path: &Path, config: &DemuxConfig) -> Result<Driver<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Driver::new(BufReader::new(file), config.read_chunk).with_context(|| format!("measuring {}", path.display()))
}
