//! Device domain entities.
//!
//! Pure data and rules with no sockets and no clocks of their own: callers
//! pass in endpoints and `Instant`s, which keeps the staleness logic testable
//! without sleeping.

/// Hardware classes, known-device records, and send targets.
pub mod device;

/// The set of live devices and the staleness sweep.
pub mod directory;
