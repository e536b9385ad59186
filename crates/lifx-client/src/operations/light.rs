//! Light operations: color, light power, and infrared.

use std::time::Duration;

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::{Hsbk, MessageType};
use lifx_core::protocol::response::{Acknowledgement, InfraredState, LightState, LightStatePower};
use lifx_core::DeviceTarget;

use super::device::power_level;
use super::{duration_ms, validate_color};
use crate::client::{ClientError, LifxClient, ReplyMode};

/// `SetColor` layout: reserved u8, HSBK, duration u32.
pub(crate) fn set_color_args(color: Hsbk, transition: Duration) -> Vec<Arg> {
    vec![
        Arg::Reserved(1),
        Arg::Color(color),
        Arg::U32(duration_ms(transition)),
    ]
}

/// Light `SetPower` layout: level u16, duration u32.
pub(crate) fn set_light_power_args(on: bool, transition: Duration) -> Vec<Arg> {
    vec![Arg::U16(power_level(on)), Arg::U32(duration_ms(transition))]
}

impl LifxClient {
    /// Sets the color, fading over `transition`.
    ///
    /// # Errors
    ///
    /// [`ClientError::InvalidArgument`] if `color.kelvin` is outside
    /// 2500..=9000; nothing is sent in that case.
    pub async fn set_color(
        &self,
        target: DeviceTarget,
        color: Hsbk,
        transition: Duration,
    ) -> Result<(), ClientError> {
        validate_color(&color)?;
        self.request::<Acknowledgement>(
            target,
            MessageType::LightSetColor,
            ReplyMode::Ack,
            &set_color_args(color, transition),
        )
        .await?;
        Ok(())
    }

    /// Switches the light on or off, fading over `transition`.
    pub async fn set_light_power(
        &self,
        target: DeviceTarget,
        on: bool,
        transition: Duration,
    ) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::LightSetPower,
            ReplyMode::Ack,
            &set_light_power_args(on, transition),
        )
        .await?;
        Ok(())
    }

    pub async fn get_light_power(
        &self,
        target: DeviceTarget,
    ) -> Result<LightStatePower, ClientError> {
        self.request(target, MessageType::LightGetPower, ReplyMode::State, &[])
            .await
    }

    /// Color, power, and label in one reply.
    pub async fn get_light_state(&self, target: DeviceTarget) -> Result<LightState, ClientError> {
        self.request(target, MessageType::LightGet, ReplyMode::State, &[])
            .await
    }

    pub async fn get_infrared(&self, target: DeviceTarget) -> Result<InfraredState, ClientError> {
        self.request(target, MessageType::InfraredGet, ReplyMode::State, &[])
            .await
    }

    pub async fn set_infrared(
        &self,
        target: DeviceTarget,
        brightness: u16,
    ) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::InfraredSet,
            ReplyMode::Ack,
            &[Arg::U16(brightness)],
        )
        .await?;
        Ok(())
    }
}
