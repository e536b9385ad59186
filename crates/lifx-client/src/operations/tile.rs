//! Tile (matrix) operations.

use std::time::Duration;

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::{Hsbk, MessageType};
use lifx_core::protocol::response::{
    Acknowledgement, StateDeviceChain, StateTileState64, TILE_STATE_COLORS,
};
use lifx_core::DeviceTarget;
use serde::{Deserialize, Serialize};

use super::{duration_ms, validate_color};
use crate::client::{ClientError, LifxClient, ReplyMode};

/// Which part of a tile chain a 64-color state request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRegion {
    /// First tile in the chain.
    pub tile_index: u8,
    /// How many tiles, starting at `tile_index`.
    pub length: u8,
    pub x: u8,
    pub y: u8,
    /// Row width of the 64-color block.
    pub width: u8,
}

impl Default for TileRegion {
    /// One whole 8x8 tile at the head of the chain.
    fn default() -> Self {
        Self {
            tile_index: 0,
            length: 1,
            x: 0,
            y: 0,
            width: 8,
        }
    }
}

impl TileRegion {
    fn args(&self) -> [Arg; 6] {
        [
            Arg::U8(self.tile_index),
            Arg::U8(self.length),
            Arg::Reserved(1),
            Arg::U8(self.x),
            Arg::U8(self.y),
            Arg::U8(self.width),
        ]
    }
}

/// `SetTileState64` layout: region, duration u32, then exactly 64 colors.
pub(crate) fn set_tile_state_args(
    region: TileRegion,
    colors: &[Hsbk],
    transition: Duration,
) -> Result<Vec<Arg>, ClientError> {
    if colors.len() > TILE_STATE_COLORS {
        return Err(ClientError::InvalidArgument(format!(
            "{} colors exceeds the {TILE_STATE_COLORS} per-tile limit",
            colors.len()
        )));
    }
    for color in colors {
        validate_color(color)?;
    }

    let mut args = Vec::with_capacity(8 + TILE_STATE_COLORS);
    args.extend(region.args());
    args.push(Arg::U32(duration_ms(transition)));
    args.extend(colors.iter().copied().map(Arg::Color));
    args.push(Arg::Reserved(
        (TILE_STATE_COLORS - colors.len()) * Hsbk::WIRE_SIZE,
    ));
    Ok(args)
}

impl LifxClient {
    /// Every tile slot in the chain plus how many are attached.
    pub async fn get_device_chain(
        &self,
        target: DeviceTarget,
    ) -> Result<StateDeviceChain, ClientError> {
        self.request(target, MessageType::GetDeviceChain, ReplyMode::State, &[])
            .await
    }

    /// Records where a tile sits relative to the others.
    pub async fn set_user_position(
        &self,
        target: DeviceTarget,
        tile_index: u8,
        user_x: f32,
        user_y: f32,
    ) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::SetUserPosition,
            ReplyMode::Ack,
            &[
                Arg::U8(tile_index),
                Arg::Reserved(2),
                Arg::F32(user_x),
                Arg::F32(user_y),
            ],
        )
        .await?;
        Ok(())
    }

    pub async fn get_tile_state(
        &self,
        target: DeviceTarget,
        region: TileRegion,
    ) -> Result<StateTileState64, ClientError> {
        self.request(
            target,
            MessageType::GetTileState64,
            ReplyMode::State,
            &region.args(),
        )
        .await
    }

    /// Paints up to 64 colors into `region`.  Missing colors are sent as
    /// zero (off).
    pub async fn set_tile_state(
        &self,
        target: DeviceTarget,
        region: TileRegion,
        colors: &[Hsbk],
        transition: Duration,
    ) -> Result<(), ClientError> {
        let args = set_tile_state_args(region, colors, transition)?;
        self.request::<Acknowledgement>(target, MessageType::SetTileState64, ReplyMode::Ack, &args)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifx_core::protocol::args::encode_args;

    #[test]
    fn test_get_tile_state_payload_layout() {
        let region = TileRegion {
            tile_index: 2,
            length: 1,
            x: 0,
            y: 4,
            width: 8,
        };
        assert_eq!(encode_args(&region.args()), vec![2, 1, 0, 0, 4, 8]);
    }

    #[test]
    fn test_set_tile_state_payload_is_fixed_width() {
        // Arrange
        let colors = [Hsbk::new(1, 1, 1, 3500); 10];

        // Act
        let args = set_tile_state_args(TileRegion::default(), &colors, Duration::from_millis(1))
            .expect("valid args");
        let bytes = encode_args(&args);

        // Assert
        assert_eq!(bytes.len(), 10 + TILE_STATE_COLORS * Hsbk::WIRE_SIZE);
        assert_eq!(&bytes[6..10], &[1, 0, 0, 0]);
    }

    #[test]
    fn test_set_tile_state_rejects_bad_kelvin() {
        let colors = [Hsbk::new(0, 0, 0, 100)];
        let result = set_tile_state_args(TileRegion::default(), &colors, Duration::ZERO);
        assert!(matches!(result, Err(ClientError::InvalidArgument(_))));
    }
}
