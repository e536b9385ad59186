//! Relay operations for LIFX switches.

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::MessageType;
use lifx_core::protocol::response::{Acknowledgement, StateRelayPower};
use lifx_core::DeviceTarget;

use super::device::power_level;
use crate::client::{ClientError, LifxClient, ReplyMode};

impl LifxClient {
    pub async fn get_relay_power(
        &self,
        target: DeviceTarget,
        relay_index: u8,
    ) -> Result<StateRelayPower, ClientError> {
        self.request(
            target,
            MessageType::GetRelayPower,
            ReplyMode::State,
            &[Arg::U8(relay_index)],
        )
        .await
    }

    /// Switches one relay on or off.
    pub async fn set_relay_power(
        &self,
        target: DeviceTarget,
        relay_index: u8,
        on: bool,
    ) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::SetRelayPower,
            ReplyMode::Ack,
            &[Arg::U8(relay_index), Arg::U16(power_level(on))],
        )
        .await?;
        Ok(())
    }
}
