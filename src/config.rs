//! Replay configuration — CLI flags with environment fallbacks.
//!
//! Only the replay driver is configurable. Protocol timing lives in `consts`
//! and is identical on every replica.

use std::path::PathBuf;

use clap::Parser;

use crate::clock::LogicalTime;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pitchboard", about = "Replay a pitchboard session script and print every published frame")]
pub struct ReplayConfig {
    /// JSON-lines script of `{"at": <ms>, "frame": {...}}` entries. Reads
    /// stdin when omitted.
    #[arg(long, env = "PITCHBOARD_SCRIPT")]
    pub script: Option<PathBuf>,

    /// Keep running timers until this logical time (ms) after the last entry.
    #[arg(long, env = "PITCHBOARD_UNTIL")]
    pub until: Option<u64>,

    /// Namespace for published frame ids. Replicas of one session share it.
    #[arg(long, env = "PITCHBOARD_SESSION_SEED", default_value_t = 0)]
    pub seed: u64,
}

impl ReplayConfig {
    #[must_use]
    pub fn until(&self) -> Option<LogicalTime> {
        self.until.map(LogicalTime::from_millis)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
