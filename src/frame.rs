//! Frame — the universal event envelope for a pitchboard session.
//!
//! ARCHITECTURE
//! ============
//! Every event crossing the session boundary is a Frame. Views publish
//! request frames (`view:viewport`, `interaction:request`, ...), the session
//! dispatches them by syscall prefix, and everything it publishes in response
//! (state-change notices, forwarded gesture updates, error replies) is a Frame
//! too.
//!
//! DESIGN
//! ======
//! - Flat data: payload is a `BTreeMap<String, Value>`, so serialization and
//!   iteration order are identical on every replica.
//! - `ts` is logical time, never wall-clock time.
//! - Published frames get their id and timestamp from the session (`Stamp`),
//!   so replicas replaying the same input publish identical frames.
//! - Error replies correlate to the request via `parent_id`.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::LogicalTime;

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = BTreeMap<String, serde_json::Value>;

/// Position of a frame in an exchange. Views and the session publish
/// `Request` frames; only malformed input earns an `Error` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Error,
}

/// Identity the session assigns to a frame it publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub id: Uuid,
    pub ts: LogicalTime,
}

/// The universal event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub ts: LogicalTime,
    /// Delivery scope of a forwarded gesture event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub syscall: String,
    #[serde(default = "default_status")]
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

fn default_status() -> Status {
    Status::Request
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Create a request frame as a view would publish it.
    #[cfg(test)]
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: LogicalTime::ZERO,
            scope: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create a frame published by the session.
    pub fn notice(stamp: Stamp, syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: stamp.id,
            parent_id: None,
            ts: stamp.ts,
            scope: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create a structured error reply from a typed error.
    #[must_use]
    pub fn error_from(&self, stamp: Stamp, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(FRAME_CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(FRAME_MESSAGE.into(), serde_json::Value::String(err.to_string()));
        data.insert(FRAME_RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        Self {
            id: stamp.id,
            parent_id: Some(self.id),
            ts: stamp.ts,
            scope: self.scope.clone(),
            from: None,
            syscall: self.syscall.clone(),
            status: Status::Error,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[cfg(test)]
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Extract the operation (everything after the first ':').
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }

    /// Decode the data map into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns the serde error if required fields are missing or mistyped.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let object: serde_json::Map<String, serde_json::Value> =
            self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        serde_json::from_value(serde_json::Value::Object(object))
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
