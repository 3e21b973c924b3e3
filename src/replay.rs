//! Replay — drive a `Session` from a timestamped script.
//!
//! A script is JSON lines, one entry per line:
//!
//! ```text
//! {"at": 0, "frame": {"id": "...", "syscall": "view:join", "data": {"view_id": "..."}}}
//! {"at": 6000}
//! ```
//!
//! Each entry first advances the logical clock to `at` (running due timers),
//! then dispatches `frame` if present. An entry without a frame only moves
//! time. Entries must be in non-decreasing `at` order; the replicated runtime
//! never delivers out of order, so a script that does is rejected.

use std::io::BufRead;

use serde::Deserialize;
use tracing::info;

use crate::clock::LogicalTime;
use crate::frame::Frame;
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("script read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid entry: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: entry at {at} precedes current time {now}")]
    ClockRegression { line: usize, at: LogicalTime, now: LogicalTime },
    #[error("frame encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One script entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    pub at: LogicalTime,
    #[serde(default)]
    pub frame: Option<Frame>,
}

/// Replay every entry of `script` through `session`, then run timers up to
/// `until`. Returns every published frame in publish order.
///
/// # Errors
///
/// Fails on unreadable input, malformed entries, or out-of-order times. Frames
/// published before the failing line are discarded with the error.
pub fn replay<R: BufRead>(session: &mut Session, script: R, until: Option<LogicalTime>) -> Result<Vec<Frame>, ReplayError> {
    let mut out = Vec::new();
    let mut entries = 0usize;

    for (idx, line) in script.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let entry: ScriptEntry =
            serde_json::from_str(trimmed).map_err(|source| ReplayError::Json { line: line_no, source })?;
        if entry.at < session.now() {
            return Err(ReplayError::ClockRegression { line: line_no, at: entry.at, now: session.now() });
        }

        out.extend(session.advance_to(entry.at));
        if let Some(frame) = &entry.frame {
            out.extend(session.dispatch(frame));
        }
        entries += 1;
    }

    if let Some(until) = until.filter(|t| *t > session.now()) {
        out.extend(session.advance_to(until));
    }

    info!(entries, published = out.len(), now = %session.now(), "replay finished");
    Ok(out)
}

#[cfg(test)]
#[path = "replay_test.rs"]
mod tests;
