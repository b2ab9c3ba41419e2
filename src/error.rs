//! Unified error types for the climate decision core.
//!
//! A single `Error` enum that every boundary check can convert into,
//! keeping the host runtime's error handling uniform. Variants are small
//! and `Copy` where possible so rejections can be passed around without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation at the core's boundary funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An inbound event was rejected before reaching the pipeline.
    Event(EventError),
    /// An operator command was rejected at the boundary.
    Command(CommandError),
    /// A persisted-state snapshot could not be encoded or decoded.
    Snapshot(SnapshotError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(e) => write!(f, "event: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Snapshot(e) => write!(f, "snapshot: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Event errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    /// A reading carried a non-finite number (NaN/inf from a flaky adapter).
    NonFiniteReading,
    /// Timestamp is non-finite or wildly out of range.
    InvalidTimestamp,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteReading => write!(f, "non-finite sensor reading"),
            Self::InvalidTimestamp => write!(f, "invalid timestamp"),
        }
    }
}

impl From<EventError> for Error {
    fn from(e: EventError) -> Self {
        Self::Event(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Manual-override and restore commands are validated synchronously; a
/// rejected command never enters the event pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandError {
    /// Requested time-to-live is zero or exceeds the configured maximum.
    InvalidTtl { requested_secs: u32, max_secs: u32 },
    /// HVAC setpoint outside the physically sensible range.
    SetpointOutOfRange(f32),
    /// No override is active for the named target.
    NoActiveOverride,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTtl {
                requested_secs,
                max_secs,
            } => write!(f, "ttl {requested_secs}s outside 1..={max_secs}s"),
            Self::SetpointOutOfRange(c) => write!(f, "setpoint {c:.1}°C out of range"),
            Self::NoActiveOverride => write!(f, "no active override for target"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// The stored blob failed to decode (truncated or from an old layout).
    Corrupted,
    /// Encoding failed (should not happen with in-memory buffers).
    EncodeFailed,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "snapshot corrupted"),
            Self::EncodeFailed => write!(f, "snapshot encode failed"),
        }
    }
}

impl From<SnapshotError> for Error {
    fn from(e: SnapshotError) -> Self {
        Self::Snapshot(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
