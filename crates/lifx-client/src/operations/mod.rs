//! Device operations.
//!
//! Each submodule adds methods to [`LifxClient`](crate::LifxClient) for one
//! family of messages.  They all follow the same pattern: lay out the request
//! arguments, then call the client's request helper with the reply type to
//! wait for.
//!
//! - Set-type operations send with `ack_required` and return once the
//!   device acknowledges.
//! - Get-type operations send with `res_required` and return the typed state.
//!
//! The argument layouts are plain functions so they can be tested without a
//! socket.

pub mod device;
pub mod light;
pub mod multizone;
pub mod relay;
pub mod tile;

use std::time::Duration;

use lifx_core::protocol::messages::{Hsbk, KELVIN_MAX, KELVIN_MIN};

use crate::client::ClientError;

pub use multizone::{ApplyMode, ZoneReply};

/// Transition time in milliseconds, saturating at `u32::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Rejects colors whose kelvin is outside what devices accept.
pub(crate) fn validate_color(color: &Hsbk) -> Result<(), ClientError> {
    if (KELVIN_MIN..=KELVIN_MAX).contains(&color.kelvin) {
        Ok(())
    } else {
        Err(ClientError::InvalidArgument(format!(
            "kelvin {} is outside {KELVIN_MIN}..={KELVIN_MAX}",
            color.kelvin
        )))
    }
}
