//! Fixed protocol timing, in logical milliseconds.
//!
//! These values are shared by every replica. Changing one on a single replica
//! would make its sweeps and expiries diverge from its peers.

// ── Presence ────────────────────────────────────────────────────

/// Idle period after which an active participant is marked inactive.
pub const INACTIVITY_THRESHOLD_MS: u64 = 5_000;

/// Gap between presence sweeps.
pub const PRESENCE_SWEEP_INTERVAL_MS: u64 = 500;

// ── Locks ───────────────────────────────────────────────────────

/// Age at which an unrefreshed property lock is force-released.
pub const LOCK_TIMEOUT_MS: u64 = 5_000;

/// Gap between lock-expiry checks on each object.
pub const LOCK_CHECK_INTERVAL_MS: u64 = 500;
