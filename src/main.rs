use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process::ExitCode;

use clap::Parser;
use pitchboard::config::ReplayConfig;
use pitchboard::replay::{self, ReplayError};
use pitchboard::session::Session;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only published frames.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let config = ReplayConfig::parse();
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "replay failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ReplayConfig) -> Result<(), ReplayError> {
    let script: Box<dyn BufRead> = match &config.script {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    tracing::info!(seed = config.seed, script = ?config.script, "replaying session");
    let mut session = Session::new(config.seed);
    let frames = replay::replay(&mut session, script, config.until())?;

    let mut stdout = io::stdout().lock();
    for frame in &frames {
        serde_json::to_writer(&mut stdout, frame).map_err(ReplayError::Encode)?;
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
