// CLI binary entry point for oxidemux
//
// Inspect pages and packets, print stream info, resolve seeks and rewrite
// comment headers of Ogg Vorbis and Ogg Opus files.

mod cli;

use std::process;

use clap::Parser;

use cli::Config;

fn main() {
    let config = Config::parse();
    cli::init_logging(config.verbose, config.quiet);

    if let Err(e) = cli::commands::run(&config) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
