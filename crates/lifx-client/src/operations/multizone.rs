//! Multizone (strip) operations.

use std::time::Duration;

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::{Hsbk, MessageType};
use lifx_core::protocol::response::{
    Acknowledgement, StateExtendedColorZones, StateMultiZone, StateZone, EXTENDED_COLORS_MAX,
};
use lifx_core::{DeviceTarget, ExpectedResponse, Response, ResponseBody};
use serde::{Deserialize, Serialize};

use super::{duration_ms, validate_color};
use crate::client::{ClientError, LifxClient, ReplyMode};

/// When a zone change takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApplyMode {
    /// Buffer the change until a later request applies it.
    NoApply = 0,
    /// Apply this and any buffered changes now.
    #[default]
    Apply = 1,
    /// Apply buffered changes, ignoring this request's colors.
    ApplyOnly = 2,
}

/// Reply to `GetColorZones`: one zone or a block of up to eight.
///
/// A strip with more than eight zones answers a wide range with several
/// `StateMultiZone` packets; only the first one resolves the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneReply {
    Single(StateZone),
    Multi(StateMultiZone),
}

impl ExpectedResponse for ZoneReply {
    fn matches(response: &Response) -> bool {
        matches!(
            response.body,
            ResponseBody::StateZone(_) | ResponseBody::StateMultiZone(_)
        )
    }

    fn from_response(response: Response) -> Option<Self> {
        match response.body {
            ResponseBody::StateZone(zone) => Some(ZoneReply::Single(zone)),
            ResponseBody::StateMultiZone(zones) => Some(ZoneReply::Multi(zones)),
            _ => None,
        }
    }
}

/// `SetColorZones` layout: start u8, end u8, HSBK, duration u32, apply u8.
pub(crate) fn set_color_zones_args(
    start: u8,
    end: u8,
    color: Hsbk,
    transition: Duration,
    apply: ApplyMode,
) -> Vec<Arg> {
    vec![
        Arg::U8(start),
        Arg::U8(end),
        Arg::Color(color),
        Arg::U32(duration_ms(transition)),
        Arg::U8(apply as u8),
    ]
}

/// `SetExtendedColorZones` layout: duration u32, apply u8, index u16,
/// count u8, then always 82 colors (unused slots zeroed).
pub(crate) fn set_extended_color_zones_args(
    index: u16,
    colors: &[Hsbk],
    transition: Duration,
    apply: ApplyMode,
) -> Result<Vec<Arg>, ClientError> {
    if colors.len() > EXTENDED_COLORS_MAX {
        return Err(ClientError::InvalidArgument(format!(
            "{} colors exceeds the {EXTENDED_COLORS_MAX} zone limit",
            colors.len()
        )));
    }
    for color in colors {
        validate_color(color)?;
    }

    let mut args = Vec::with_capacity(4 + EXTENDED_COLORS_MAX);
    args.push(Arg::U32(duration_ms(transition)));
    args.push(Arg::U8(apply as u8));
    args.push(Arg::U16(index));
    // Bounded by EXTENDED_COLORS_MAX above.
    args.push(Arg::U8(colors.len() as u8));
    args.extend(colors.iter().copied().map(Arg::Color));
    args.push(Arg::Reserved(
        (EXTENDED_COLORS_MAX - colors.len()) * Hsbk::WIRE_SIZE,
    ));
    Ok(args)
}

impl LifxClient {
    /// Paints zones `start..=end` one color.
    pub async fn set_color_zones(
        &self,
        target: DeviceTarget,
        start: u8,
        end: u8,
        color: Hsbk,
        transition: Duration,
        apply: ApplyMode,
    ) -> Result<(), ClientError> {
        validate_color(&color)?;
        self.request::<Acknowledgement>(
            target,
            MessageType::SetColorZones,
            ReplyMode::Ack,
            &set_color_zones_args(start, end, color, transition, apply),
        )
        .await?;
        Ok(())
    }

    pub async fn get_color_zones(
        &self,
        target: DeviceTarget,
        start: u8,
        end: u8,
    ) -> Result<ZoneReply, ClientError> {
        self.request(
            target,
            MessageType::GetColorZones,
            ReplyMode::State,
            &[Arg::U8(start), Arg::U8(end)],
        )
        .await
    }

    /// Sets up to 82 consecutive zones starting at `index` in one packet.
    pub async fn set_extended_color_zones(
        &self,
        target: DeviceTarget,
        index: u16,
        colors: &[Hsbk],
        transition: Duration,
        apply: ApplyMode,
    ) -> Result<(), ClientError> {
        let args = set_extended_color_zones_args(index, colors, transition, apply)?;
        self.request::<Acknowledgement>(
            target,
            MessageType::SetExtendedColorZones,
            ReplyMode::Ack,
            &args,
        )
        .await?;
        Ok(())
    }

    pub async fn get_extended_color_zones(
        &self,
        target: DeviceTarget,
    ) -> Result<StateExtendedColorZones, ClientError> {
        self.request(target, MessageType::GetExtendedColorZones, ReplyMode::State, &[])
            .await
    }
}
