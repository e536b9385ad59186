//! The `LifxClient` facade.
//!
//! Owns one [`Transport`] and one [`Discovery`] manager.  The device
//! operations in [`crate::operations`] are implemented as `impl LifxClient`
//! blocks on top of [`LifxClient::request`].

use std::sync::Arc;

use lifx_core::protocol::args::Arg;
use lifx_core::protocol::messages::{MacAddress, MessageType};
use lifx_core::{DeviceTarget, ExpectedResponse, KnownDevice};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::{ClientConfig, ConfigError};
use crate::discovery::{Discovery, DiscoveryEvent, ProductResolver, VersionQuery};
use crate::transport::{Transport, TransportError};

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An operation argument is outside the range the device accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Whether a request waits for an acknowledgement or a state reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplyMode {
    /// Set-type requests: `ack_required`.
    Ack,
    /// Get-type requests: `res_required`.
    State,
}

/// A LAN client for LIFX devices.
pub struct LifxClient {
    transport: Transport,
    discovery: Discovery,
}

impl LifxClient {
    /// Binds the transport and prepares (but does not start) discovery.
    ///
    /// Returns the client and the receiver for discovered/lost events.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the socket cannot be bound or an
    /// address in `config.network` is invalid.
    pub fn new(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<DiscoveryEvent>), ClientError> {
        let transport = Transport::bind(&config.network, &config.requests)?;
        let resolver: Option<Arc<dyn ProductResolver>> = if config.discovery.classify_devices {
            Some(Arc::new(VersionQuery::new(transport.clone())))
        } else {
            None
        };
        let (discovery, events) = Discovery::new(transport.clone(), &config.discovery, resolver);
        Ok((
            Self {
                transport,
                discovery,
            },
            events,
        ))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Starts broadcasting discovery probes.  No-op if already discovering.
    pub fn start_discovery(&self) {
        self.discovery.start();
    }

    /// Stops discovery.  Known devices are kept.  No-op if already idle.
    pub fn stop_discovery(&self) {
        self.discovery.stop();
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_discovering()
    }

    /// Devices currently known, ordered by hardware address.
    pub fn devices(&self) -> Vec<KnownDevice> {
        self.discovery.devices()
    }

    pub fn device(&self, mac: &MacAddress) -> Option<KnownDevice> {
        self.discovery.device(mac)
    }

    /// Stops discovery and closes the transport.  Pending requests fail with
    /// [`TransportError::Closed`].  Idempotent.
    pub fn shutdown(&self) {
        if self.transport.is_closed() {
            return;
        }
        self.discovery.stop();
        self.transport.shutdown();
        info!("LIFX client shut down");
    }

    /// Sends one request to `target` and waits for a reply of type `R`.
    pub(crate) async fn request<R: ExpectedResponse>(
        &self,
        target: DeviceTarget,
        message_type: MessageType,
        mode: ReplyMode,
        args: &[Arg],
    ) -> Result<R, ClientError> {
        let header = self.transport.request_header(
            target.mac,
            mode == ReplyMode::Ack,
            mode == ReplyMode::State,
        );
        Ok(self
            .transport
            .send_request(Some(target.endpoint), header, message_type, args)
            .await?)
    }
}

impl Drop for LifxClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for LifxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifxClient")
            .field("transport", &self.transport)
            .field("discovering", &self.is_discovering())
            .finish()
    }
}
