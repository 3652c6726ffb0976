// CLI module for oxidemux
//
// The binary is the I/O layer around the library: it reads files, answers
// the demuxer's `More` and `Seek` requests through `Driver`, and prints what
// comes out.

pub mod commands;
pub mod config;
pub mod output;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use config::Config;
pub use output::OutputFormatter;

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Expand glob patterns. Arguments without wildcards are taken as paths.
pub fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        let before = files.len();
        for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern {pattern}"))? {
            let path = entry.context("reading glob match")?;
            if path.is_file() {
                files.push(path);
            }
        }
        if files.len() == before {
            bail!("no files match {pattern}");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn globs_expand_and_plain_paths_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.ogg", "a.ogg", "c.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let pattern = format!("{}/*.ogg", dir.path().display());
        let files = expand_files(&[pattern, "missing.opus".to_string()]).unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names, vec!["a.ogg", "b.ogg", "missing.opus"]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.ogg", dir.path().display());
        assert!(expand_files(&[pattern]).is_err());
    }
}
