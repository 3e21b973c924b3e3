//! pitchboard — replicated presence, presenter, and interaction-lock core for
//! a collaborative pitch board.
//!
//! Every participant runs an identical replica of a `Session`. A replicated
//! runtime delivers the same inbound frames, in the same order, at the same
//! logical times, to every replica; each replica then computes the same state
//! and publishes the same frames without any further coordination.
//!
//! That total order is load-bearing. Lock arbitration in particular is a plain
//! sequential algorithm: outside such a runtime (several independent servers,
//! say) it needs a sequencer or a consensus layer in front of it.
//!
//! - `presence`: who is here, where they look and point, and who has gone idle.
//! - `presenter`: at most one presenter, and who follows their viewport.
//! - `lock`: per-object, per-property locks for drag and resize gestures.
//! - `session`: frame dispatch, timers, and published events.
//! - `replay`: drive a session from a timestamped script.

pub mod clock;
pub mod config;
pub mod consts;
pub mod frame;
pub mod lock;
pub mod presence;
pub mod presenter;
pub mod replay;
pub mod session;
pub mod types;
