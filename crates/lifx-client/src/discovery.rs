//! Device discovery and liveness tracking.
//!
//! While discovering, a probe task broadcasts `GetService` every probe
//! interval and a listener task consumes the `StateService` replies the
//! transport routes to it.  New hardware addresses are classified, added to
//! the directory, and reported as [`DiscoveryEvent::Discovered`]; devices
//! that stay silent longer than the staleness window are removed and reported
//! as [`DiscoveryEvent::Lost`].
//!
//! Classification runs in its own task per new device, so a device that
//! never answers `GetVersion` holds up only itself.
//!
//! # States
//!
//! ```text
//!   Idle ──start()──► Discovering ──stop()──► Idle
//! ```
//!
//! Both transitions are idempotent.  Each start opens a new session with its
//! own source id; only replies carrying that id are accepted, which keeps
//! other clients' probes on the same network from leaking in.  Stopping keeps
//! the directory as last-known state.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lifx_core::protocol::messages::{FrameHeader, MacAddress, MessageType};
use lifx_core::protocol::response::{ResponseBody, StateVersion};
use lifx_core::{DeviceDirectory, DeviceTarget, KnownDevice, NoReply};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::transport::{ServiceAnnouncement, Transport, TransportError};

/// Notifications raised by discovery.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    Discovered(KnownDevice),
    Lost(KnownDevice),
}

// ── Product resolver seam ─────────────────────────────────────────────────────

/// Looks up a device's product id so it can be classified.
///
/// Implemented by [`VersionQuery`] in production and by test doubles in tests.
#[async_trait]
pub trait ProductResolver: Send + Sync {
    /// Returns `None` if the product id could not be determined.
    async fn product_id(&self, target: DeviceTarget) -> Option<u32>;
}

/// Resolves product ids with a `GetVersion` request.
pub struct VersionQuery {
    transport: Transport,
}

impl VersionQuery {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ProductResolver for VersionQuery {
    async fn product_id(&self, target: DeviceTarget) -> Option<u32> {
        let header = self.transport.request_header(target.mac, false, true);
        match self
            .transport
            .send_request::<StateVersion>(
                Some(target.endpoint),
                header,
                MessageType::DeviceGetVersion,
                &[],
            )
            .await
        {
            Ok(version) => Some(version.product),
            Err(e) => {
                debug!(mac = %target.mac, "version query failed: {e}");
                None
            }
        }
    }
}

// ── Discovery manager ─────────────────────────────────────────────────────────

/// State shared by the manager and its session tasks.
struct Shared {
    transport: Transport,
    directory: Mutex<DeviceDirectory>,
    /// Devices with a classification query in flight.
    classifying: Mutex<HashSet<MacAddress>>,
    resolver: Option<Arc<dyn ProductResolver>>,
    events: mpsc::UnboundedSender<DiscoveryEvent>,
    probe_interval: Duration,
    stale_after: Duration,
}

impl Shared {
    fn lock_directory(&self) -> MutexGuard<'_, DeviceDirectory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_classifying(&self) -> MutexGuard<'_, HashSet<MacAddress>> {
        self.classifying.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Broadcasts one probe tagged with the session's source id.
    async fn send_probe(&self, source_id: u32) -> Result<(), TransportError> {
        let header = FrameHeader {
            source: source_id,
            target: MacAddress::BROADCAST,
            ack_required: false,
            res_required: false,
            sequence: self.transport.next_sequence(),
            at_time: 0,
        };
        self.transport
            .send_request::<NoReply>(None, header, MessageType::DeviceGetService, &[])
            .await
            .map(|_| ())
    }

    /// Removes devices past the staleness window and reports each once.
    fn sweep(&self, now: Instant) {
        let lost = self.lock_directory().sweep_stale(now, self.stale_after);
        for device in lost {
            info!(mac = %device.mac, endpoint = %device.endpoint, "device lost");
            let _ = self.events.send(DiscoveryEvent::Lost(device));
        }
    }

    /// Applies one probe reply to the directory.
    ///
    /// Known devices are refreshed in place.  A new device is admitted at
    /// once when there is no resolver, otherwise after a spawned
    /// classification task finishes.
    fn handle_announcement(
        self: &Arc<Self>,
        session_source: u32,
        announcement: ServiceAnnouncement,
    ) {
        let ServiceAnnouncement {
            from,
            response,
            received_at,
        } = announcement;

        if response.source != session_source {
            debug!(%from, source = response.source, "ignoring probe reply from another session");
            return;
        }
        let ResponseBody::StateService(service) = response.body else {
            return;
        };

        let mac = response.header.target;
        let endpoint = service_endpoint(from, service.port);
        if self.lock_directory().refresh(&mac, endpoint, received_at) {
            return;
        }

        let mut device = KnownDevice::new(mac, endpoint, received_at);
        device.service = service.service;
        device.service_port = service.port;

        let Some(resolver) = self.resolver.clone() else {
            self.admit(device);
            return;
        };
        if !self.lock_classifying().insert(mac) {
            return;
        }
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(product) = resolver.product_id(device.target()).await {
                device = device.with_product(product);
            }
            shared.lock_classifying().remove(&mac);
            shared.admit(device);
        });
    }

    /// Inserts a new device and reports it, unless it showed up meanwhile.
    fn admit(&self, device: KnownDevice) {
        {
            let mut directory = self.lock_directory();
            if directory.refresh(&device.mac, device.endpoint, device.last_seen) {
                return;
            }
            directory.insert(device.clone());
        }
        info!(
            mac = %device.mac,
            endpoint = %device.endpoint,
            class = %device.class,
            "device discovered"
        );
        let _ = self.events.send(DiscoveryEvent::Discovered(device));
    }
}

/// The endpoint to talk to: the reply's host with the advertised port.
fn service_endpoint(from: SocketAddr, port: u32) -> SocketAddr {
    match u16::try_from(port) {
        Ok(port) if port != 0 => SocketAddr::new(from.ip(), port),
        _ => from,
    }
}

struct Session {
    source_id: u32,
    stop: watch::Sender<bool>,
}

/// Maintains the set of live devices.
pub struct Discovery {
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl Discovery {
    /// Creates an idle discovery manager.
    ///
    /// Returns the manager and the receiver for its [`DiscoveryEvent`]s.
    /// Pass `None` as `resolver` to skip classification; every device is then
    /// reported as a basic light.
    pub fn new(
        transport: Transport,
        config: &DiscoveryConfig,
        resolver: Option<Arc<dyn ProductResolver>>,
    ) -> (Self, mpsc::UnboundedReceiver<DiscoveryEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            transport,
            directory: Mutex::new(DeviceDirectory::new()),
            classifying: Mutex::new(HashSet::new()),
            resolver,
            events,
            probe_interval: config.probe_interval(),
            stale_after: config.stale_after(),
        });
        (
            Self {
                shared,
                session: Mutex::new(None),
            },
            rx,
        )
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts probing.  Returns `false` if already discovering.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut session = self.lock_session();
        if session.is_some() {
            return false;
        }

        let source_id = self.shared.transport.allocate_source_id();
        let (stop, stop_rx) = watch::channel(false);
        // Subscribe before the first probe goes out so no reply is missed.
        let announcements = self.shared.transport.announcements();

        tokio::spawn(listen(
            Arc::clone(&self.shared),
            source_id,
            announcements,
            stop_rx.clone(),
        ));
        tokio::spawn(probe_loop(Arc::clone(&self.shared), source_id, stop_rx));

        info!(source_id, interval = ?self.shared.probe_interval, "discovery started");
        *session = Some(Session { source_id, stop });
        true
    }

    /// Stops probing.  Returns `false` if already idle.
    pub fn stop(&self) -> bool {
        let Some(session) = self.lock_session().take() else {
            return false;
        };
        let _ = session.stop.send(true);
        info!(source_id = session.source_id, "discovery stopped");
        true
    }

    pub fn is_discovering(&self) -> bool {
        self.lock_session().is_some()
    }

    /// Source id tagging the current session's probes.
    pub fn session_source(&self) -> Option<u32> {
        self.lock_session().as_ref().map(|s| s.source_id)
    }

    /// Snapshot of known devices, ordered by hardware address.
    pub fn devices(&self) -> Vec<KnownDevice> {
        self.shared.lock_directory().devices()
    }

    pub fn device(&self, mac: &MacAddress) -> Option<KnownDevice> {
        self.shared.lock_directory().get(mac).cloned()
    }
}

impl Drop for Discovery {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Session tasks ─────────────────────────────────────────────────────────────

async fn probe_loop(shared: Arc<Shared>, source_id: u32, mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            break;
        }
        if !probe_round(&shared, source_id, &stop).await {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(shared.probe_interval) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
    debug!(source_id, "probe loop finished");
}

/// Sends one probe, then sweeps stale devices.
///
/// Returns `false` when the loop should end: the transport is closed or the
/// session was stopped while the probe was being sent.
async fn probe_round(shared: &Shared, source_id: u32, stop: &watch::Receiver<bool>) -> bool {
    match shared.send_probe(source_id).await {
        Ok(()) => debug!(source_id, "probe sent"),
        Err(TransportError::Closed) => return false,
        Err(e) => warn!(source_id, "probe failed: {e}"),
    }
    if *stop.borrow() {
        return false;
    }
    shared.sweep(Instant::now());
    true
}

async fn listen(
    shared: Arc<Shared>,
    source_id: u32,
    mut announcements: broadcast::Receiver<ServiceAnnouncement>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            received = announcements.recv() => match received {
                Ok(announcement) => {
                    if *stop.borrow() {
                        break;
                    }
                    shared.handle_announcement(source_id, announcement);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "discovery fell behind, probe replies dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(source_id, "discovery listener finished");
}

// ── Tests ─────────────────────────────────────────────────────────────────────
