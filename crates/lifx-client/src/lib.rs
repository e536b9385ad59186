//! # lifx-client
//!
//! Async LAN client for LIFX devices, built on `lifx-core`.
//!
//! ```no_run
//! use lifx_client::{load_config, default_config_path, LifxClient, DiscoveryEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config(&default_config_path()?)?;
//! let (client, mut events) = LifxClient::new(config)?;
//! client.start_discovery();
//! while let Some(event) = events.recv().await {
//!     if let DiscoveryEvent::Discovered(device) = event {
//!         client.set_device_power(device.target(), true).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # How a request finds its reply (for beginners)
//!
//! Every request gets its own source id in the packet header.  Devices copy
//! that id into their reply, so when the background receive loop sees a
//! reply it can look the id up in a table of waiting requests and wake the
//! right caller.  Discovery probe replies are the exception: they are routed
//! to the discovery manager instead, because one broadcast probe gets a reply
//! from every device on the network.
//!
//! - **`transport`** – the UDP socket, the receive loop, and the table of
//!   waiting requests.
//! - **`discovery`** – periodic probes, the device directory, and
//!   discovered/lost notifications.
//! - **`operations`** – one method per device command on [`LifxClient`].
//! - **`config`** – the TOML configuration file.

pub mod client;
pub mod config;
pub mod discovery;
pub mod operations;
pub mod transport;

pub use client::{ClientError, LifxClient};
pub use config::{
    default_config_path, load_config, parse_config, save_config, ClientConfig, ConfigError,
    DiscoveryConfig, NetworkConfig, RequestConfig,
};
pub use discovery::{Discovery, DiscoveryEvent, ProductResolver, VersionQuery};
pub use operations::tile::TileRegion;
pub use operations::{ApplyMode, ZoneReply};
pub use transport::{ServiceAnnouncement, Transport, TransportError};
