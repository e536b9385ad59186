//! Operations every LIFX device supports.

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::{MessageType, POWER_ON};
use lifx_core::protocol::response::{
    Acknowledgement, EchoResponse, StateGroup, StateHostFirmware, StateHostInfo, StateInfo,
    StateLabel, StateLocation, StatePower, StateVersion, StateWifiFirmware, StateWifiInfo,
};
use lifx_core::DeviceTarget;

use crate::client::{ClientError, LifxClient, ReplyMode};

/// Width of an echo request payload.
pub const ECHO_PAYLOAD_SIZE: usize = 64;

pub(crate) fn power_level(on: bool) -> u16 {
    if on {
        POWER_ON
    } else {
        0
    }
}

/// Echo payload truncated or zero-padded to its fixed width.
pub(crate) fn echo_args(payload: &[u8]) -> Vec<Arg> {
    let mut bytes = payload[..payload.len().min(ECHO_PAYLOAD_SIZE)].to_vec();
    bytes.resize(ECHO_PAYLOAD_SIZE, 0);
    vec![Arg::Bytes(bytes)]
}

impl LifxClient {
    /// Switches the device on or off.
    pub async fn set_device_power(&self, target: DeviceTarget, on: bool) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::DeviceSetPower,
            ReplyMode::Ack,
            &[Arg::U16(power_level(on))],
        )
        .await?;
        Ok(())
    }

    pub async fn get_device_power(&self, target: DeviceTarget) -> Result<StatePower, ClientError> {
        self.request(target, MessageType::DeviceGetPower, ReplyMode::State, &[])
            .await
    }

    pub async fn get_label(&self, target: DeviceTarget) -> Result<String, ClientError> {
        let state: StateLabel = self
            .request(target, MessageType::DeviceGetLabel, ReplyMode::State, &[])
            .await?;
        Ok(state.label)
    }

    /// Renames the device.  Labels longer than 32 bytes are truncated.
    pub async fn set_label(&self, target: DeviceTarget, label: &str) -> Result<(), ClientError> {
        self.request::<Acknowledgement>(
            target,
            MessageType::DeviceSetLabel,
            ReplyMode::Ack,
            &[Arg::from(label)],
        )
        .await?;
        Ok(())
    }

    pub async fn get_version(&self, target: DeviceTarget) -> Result<StateVersion, ClientError> {
        self.request(target, MessageType::DeviceGetVersion, ReplyMode::State, &[])
            .await
    }

    pub async fn get_host_firmware(
        &self,
        target: DeviceTarget,
    ) -> Result<StateHostFirmware, ClientError> {
        self.request(target, MessageType::DeviceGetHostFirmware, ReplyMode::State, &[])
            .await
    }

    pub async fn get_host_info(&self, target: DeviceTarget) -> Result<StateHostInfo, ClientError> {
        self.request(target, MessageType::DeviceGetHostInfo, ReplyMode::State, &[])
            .await
    }

    pub async fn get_wifi_info(&self, target: DeviceTarget) -> Result<StateWifiInfo, ClientError> {
        self.request(target, MessageType::DeviceGetWifiInfo, ReplyMode::State, &[])
            .await
    }

    pub async fn get_wifi_firmware(
        &self,
        target: DeviceTarget,
    ) -> Result<StateWifiFirmware, ClientError> {
        self.request(target, MessageType::DeviceGetWifiFirmware, ReplyMode::State, &[])
            .await
    }

    /// Device time, uptime and last downtime.
    pub async fn get_info(&self, target: DeviceTarget) -> Result<StateInfo, ClientError> {
        self.request(target, MessageType::DeviceGetInfo, ReplyMode::State, &[])
            .await
    }

    pub async fn get_location(&self, target: DeviceTarget) -> Result<StateLocation, ClientError> {
        self.request(target, MessageType::DeviceGetLocation, ReplyMode::State, &[])
            .await
    }

    pub async fn get_group(&self, target: DeviceTarget) -> Result<StateGroup, ClientError> {
        self.request(target, MessageType::DeviceGetGroup, ReplyMode::State, &[])
            .await
    }

    /// Sends up to 64 bytes and returns what the device echoes back.
    pub async fn echo(
        &self,
        target: DeviceTarget,
        payload: &[u8],
    ) -> Result<EchoResponse, ClientError> {
        self.request(
            target,
            MessageType::DeviceEchoRequest,
            ReplyMode::State,
            &echo_args(payload),
        )
        .await
    }
}
