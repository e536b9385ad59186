//! UDP transport and request/response correlation.
//!
//! One socket is shared by every sender and by a single background receive
//! loop.  Each outgoing request that expects a reply carries a unique source
//! id; the device echoes it back, and the receive loop uses it to find the
//! waiting caller.
//!
//! ```text
//!  send_request ──► pending.insert(source) ──► socket.send_to
//!                                                  │
//!  receive loop ◄── socket.recv_from ◄─────────────┘ (device reply)
//!       │
//!       ├─ StateService ─────────► announcements (broadcast channel)
//!       └─ pending[source] match ─► oneshot ─► send_request returns
//! ```
//!
//! # Why a oneshot per request? (for beginners)
//!
//! UDP replies arrive in any order.  Giving every request its own
//! single-use channel (`tokio::sync::oneshot`) lets the receive loop hand each
//! reply straight to the task that asked for it, so many requests can be in
//! flight at once over one socket without waiting on each other.
//!
//! Malformed datagrams, replies nobody is waiting for, and replies of the
//! wrong type are dropped.  None of them disturb the loop or other requests.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lifx_core::protocol::{
    args::{encode_args, Arg},
    codec::{decode_packet, encode_packet, FrameError},
    messages::{FrameHeader, MacAddress, MessageType},
    response::{ExpectedResponse, Response},
    sequence::{SequenceCounter, SourceIdAllocator},
};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, RequestConfig};

/// Large enough for the biggest LIFX packet.
const RECV_BUFFER_SIZE: usize = 4096;

/// Buffered service announcements per subscriber.
const ANNOUNCEMENT_CAPACITY: usize = 256;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The UDP socket could not be bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A socket send failed.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be framed.
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// No matching reply arrived in time.
    #[error("no reply to message type {message_type} (source {source_id:#010x}) within {waited:?}")]
    Timeout {
        source_id: u32,
        message_type: u16,
        waited: Duration,
    },

    /// Another request with the same source id is still waiting.
    #[error("a request with source id {0:#010x} is already pending")]
    DuplicateCorrelationKey(u32),

    /// A reply was requested but the header's source id is zero.
    #[error("message type {message_type} was sent with source id 0 and cannot be awaited")]
    Uncorrelated { message_type: u16 },

    /// The matched reply could not be converted to the awaited type.
    #[error("reply of message type {message_type} does not fit the awaited type")]
    UnexpectedReply { message_type: u16 },

    /// The transport has been shut down.
    #[error("transport is closed")]
    Closed,

    /// An address in the configuration could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// A discovery probe reply, routed outside the pending-request table.
#[derive(Debug, Clone)]
pub struct ServiceAnnouncement {
    /// Where the datagram came from.
    pub from: SocketAddr,
    pub response: Response,
    pub received_at: Instant,
}

// ── Pending requests ──────────────────────────────────────────────────────────

/// A request waiting for its reply.
struct Pending {
    /// `ExpectedResponse::matches` of the awaited type.
    accepts: fn(&Response) -> bool,
    tx: oneshot::Sender<Response>,
}

/// State shared between callers and the receive loop.
struct Router {
    pending: Mutex<HashMap<u32, Pending>>,
    announcements: broadcast::Sender<ServiceAnnouncement>,
    closed: AtomicBool,
}

impl Router {
    fn new() -> Self {
        let (announcements, _) = broadcast::channel(ANNOUNCEMENT_CAPACITY);
        Self {
            pending: Mutex::new(HashMap::new()),
            announcements,
            closed: AtomicBool::new(false),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u32, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles one received datagram.
    fn dispatch(&self, datagram: &[u8], from: SocketAddr) {
        let packet = match decode_packet(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(%from, len = datagram.len(), "dropping malformed datagram: {e}");
                return;
            }
        };
        let response = Response::from_packet(packet);
        if response.partial {
            debug!(%from, message_type = response.message_type, "reply payload shorter than expected");
        }

        if response.is_service_announcement() {
            // No subscribers is fine; discovery may not be running.
            let _ = self.announcements.send(ServiceAnnouncement {
                from,
                response,
                received_at: Instant::now(),
            });
            return;
        }

        let mut pending = self.lock_pending();
        let accepted = pending
            .get(&response.source)
            .map(|p| (p.accepts)(&response));
        match accepted {
            Some(true) => {
                if let Some(waiter) = pending.remove(&response.source) {
                    let _ = waiter.tx.send(response);
                }
            }
            Some(false) => debug!(
                %from,
                source = response.source,
                message_type = response.message_type,
                "reply type does not match pending request, dropping"
            ),
            None => debug!(
                %from,
                source = response.source,
                message_type = response.message_type,
                "no pending request for reply, dropping"
            ),
        }
    }

    /// Marks the router closed and fails every waiting request.
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let failed: Vec<Pending> = self.lock_pending().drain().map(|(_, p)| p).collect();
        if !failed.is_empty() {
            debug!(count = failed.len(), "failing pending requests on close");
        }
        // Dropping each sender wakes its waiter with an error.
        drop(failed);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Removes a pending entry when the request finishes, however it finishes.
struct PendingGuard<'a> {
    router: &'a Router,
    key: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.router.lock_pending().remove(&self.key);
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

struct Inner {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    timeout: Duration,
    router: Arc<Router>,
    shutdown: watch::Sender<bool>,
    source_ids: SourceIdAllocator,
    sequence: SequenceCounter,
}

/// Owns the UDP socket and the receive loop.
///
/// Cloning is cheap; all clones share one socket.  The receive loop stops
/// when [`shutdown`](Self::shutdown) is called or the last clone is dropped.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

impl Transport {
    /// Binds the socket and starts the receive loop.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidAddress`] if an address in `network` does
    ///   not parse.
    /// - [`TransportError::Bind`] if the socket cannot be bound or configured.
    pub fn bind(network: &NetworkConfig, requests: &RequestConfig) -> Result<Self, TransportError> {
        let bind_addr = parse_endpoint(&network.bind_address, network.listen_port)?;
        let broadcast_addr = parse_endpoint(&network.broadcast_address, network.device_port)?;

        let socket = bind_broadcast_socket(bind_addr)?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| TransportError::Bind {
                addr: bind_addr,
                source,
            })?;
        let socket = Arc::new(socket);

        let router = Arc::new(Router::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&router),
            shutdown_rx,
        ));

        info!(%local_addr, %broadcast_addr, "LIFX transport bound");

        Ok(Self {
            inner: Arc::new(Inner {
                socket,
                local_addr,
                broadcast_addr,
                timeout: requests.timeout(),
                router,
                shutdown,
                source_ids: SourceIdAllocator::starting_at(rand::random()),
                sequence: SequenceCounter::new(),
            }),
        })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Where requests without a target endpoint are sent.
    pub fn broadcast_addr(&self) -> SocketAddr {
        self.inner.broadcast_addr
    }

    /// Draws a fresh non-zero source id.
    pub fn allocate_source_id(&self) -> u32 {
        self.inner.source_ids.next()
    }

    /// Next value of the shared sequence counter.
    pub fn next_sequence(&self) -> u8 {
        self.inner.sequence.next()
    }

    /// A header for one request: fresh source id and next sequence number.
    pub fn request_header(&self, target: MacAddress, ack_required: bool, res_required: bool) -> FrameHeader {
        FrameHeader {
            source: self.allocate_source_id(),
            target,
            ack_required,
            res_required,
            sequence: self.inner.sequence.next(),
            at_time: 0,
        }
    }

    /// Subscribes to discovery probe replies.
    pub fn announcements(&self) -> broadcast::Receiver<ServiceAnnouncement> {
        self.inner.router.announcements.subscribe()
    }

    /// Number of requests currently waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.router.lock_pending().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.router.is_closed()
    }

    /// Encodes `args`, sends the packet, and waits for a reply of type `R`.
    ///
    /// `target` of `None` sends to the configured broadcast address.  The
    /// request is not awaited when `R` is [`NoReply`](lifx_core::NoReply) or
    /// the header's source id is zero.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Closed`] after shutdown, or if shutdown happens
    ///   while waiting.
    /// - [`TransportError::DuplicateCorrelationKey`] if the header's source id
    ///   is already waiting.
    /// - [`TransportError::Timeout`] if no matching reply arrives in time.
    /// - [`TransportError::Uncorrelated`] if `R` expects a reply but the
    ///   source id is zero (the packet is still sent).
    /// - [`TransportError::Io`] or [`TransportError::Frame`] on send failure.
    pub async fn send_request<R: ExpectedResponse>(
        &self,
        target: Option<SocketAddr>,
        header: FrameHeader,
        message_type: MessageType,
        args: &[Arg],
    ) -> Result<R, TransportError> {
        let router: &Router = &self.inner.router;
        if router.is_closed() {
            return Err(TransportError::Closed);
        }

        let code = message_type.code();
        let dest = target.unwrap_or(self.inner.broadcast_addr);
        let packet = encode_packet(&header, code, &encode_args(args))?;
        let key = header.source;

        if key == 0 || !R::AWAITS_REPLY {
            self.send_packet(&packet, dest, message_type).await?;
            return R::without_reply().ok_or(TransportError::Uncorrelated { message_type: code });
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = router.lock_pending();
            if router.is_closed() {
                return Err(TransportError::Closed);
            }
            if pending.contains_key(&key) {
                return Err(TransportError::DuplicateCorrelationKey(key));
            }
            pending.insert(
                key,
                Pending {
                    accepts: R::matches,
                    tx,
                },
            );
        }
        let _guard = PendingGuard { router, key };

        self.send_packet(&packet, dest, message_type).await?;

        let waited = self.inner.timeout;
        match tokio::time::timeout(waited, rx).await {
            Ok(Ok(response)) => R::from_response(response)
                .ok_or(TransportError::UnexpectedReply { message_type: code }),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                debug!(source = key, ?message_type, %dest, "request timed out");
                Err(TransportError::Timeout {
                    source_id: key,
                    message_type: code,
                    waited,
                })
            }
        }
    }

    async fn send_packet(
        &self,
        packet: &[u8],
        dest: SocketAddr,
        message_type: MessageType,
    ) -> Result<(), TransportError> {
        debug!(%dest, ?message_type, len = packet.len(), "sending packet");
        self.inner
            .socket
            .send_to(packet, dest)
            .await
            .map(|_| ())
            .map_err(|e| {
                warn!(%dest, ?message_type, "send failed: {e}");
                TransportError::Io(e)
            })
    }

    /// Stops the receive loop and fails every pending request with
    /// [`TransportError::Closed`].  Idempotent.
    pub fn shutdown(&self) {
        if self.inner.router.is_closed() {
            return;
        }
        info!(local_addr = %self.inner.local_addr, "LIFX transport shutting down");
        let _ = self.inner.shutdown.send(true);
        self.inner.router.close();
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("local_addr", &self.inner.local_addr)
            .field("broadcast_addr", &self.inner.broadcast_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Socket setup ──────────────────────────────────────────────────────────────

fn parse_endpoint(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    host.parse::<std::net::IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .map_err(|_| TransportError::InvalidAddress(host.to_string()))
}

fn bind_broadcast_socket(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    let bind_err = |source| TransportError::Bind { addr, source };
    let socket = StdUdpSocket::bind(addr).map_err(bind_err)?;
    socket.set_broadcast(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    UdpSocket::from_std(socket).map_err(bind_err)
}

// ── Receive loop ──────────────────────────────────────────────────────────────

async fn receive_loop(
    socket: Arc<UdpSocket>,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => router.dispatch(&buf[..len], from),
                Err(e) => warn!("UDP receive error: {e}"),
            },
        }
    }

    router.close();
    info!("LIFX receive loop stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lifx_core::protocol::payload::Payload;
    use lifx_core::protocol::response::{Acknowledgement, StateLabel};
    use lifx_core::NoReply;

    fn loopback_config() -> (NetworkConfig, RequestConfig) {
        let network = NetworkConfig {
            bind_address: "127.0.0.1".to_string(),
            listen_port: 0,
            device_port: 9,
            broadcast_address: "127.0.0.1".to_string(),
        };
        let requests = RequestConfig { timeout_ms: 100 };
        (network, requests)
    }

    fn datagram(ty: MessageType, source: u32, payload: &[u8]) -> Vec<u8> {
        encode_packet(&FrameHeader::with_source(source), ty.code(), payload).unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:56700".parse().unwrap()
    }

    #[test]
    fn test_parse_endpoint_rejects_hostnames() {
        assert!(matches!(
            parse_endpoint("not-an-ip", 56700),
            Err(TransportError::InvalidAddress(s)) if s == "not-an-ip"
        ));
        assert_eq!(
            parse_endpoint("255.255.255.255", 56700).unwrap(),
            "255.255.255.255:56700".parse().unwrap()
        );
    }

    #[test]
    fn test_dispatch_routes_state_service_to_announcements() {
        // Arrange
        let router = Router::new();
        let mut rx = router.announcements.subscribe();
        let mut p = Payload::new();
        p.write(1u8);
        p.write(56700u32);

        // Act
        router.dispatch(&datagram(MessageType::DeviceStateService, 5, p.as_bytes()), peer());

        // Assert
        let announcement = rx.try_recv().expect("announcement routed");
        assert_eq!(announcement.from, peer());
        assert_eq!(announcement.response.source, 5);
    }

    #[test]
    fn test_dispatch_resolves_matching_pending_request() {
        // Arrange
        let router = Router::new();
        let (tx, mut rx) = oneshot::channel();
        router.lock_pending().insert(
            42,
            Pending {
                accepts: <Acknowledgement as ExpectedResponse>::matches,
                tx,
            },
        );

        // Act
        router.dispatch(&datagram(MessageType::DeviceAcknowledgement, 42, &[]), peer());

        // Assert
        let response = rx.try_recv().expect("waiter resolved");
        assert_eq!(response.source, 42);
        assert!(router.lock_pending().is_empty());
    }

    #[test]
    fn test_dispatch_keeps_pending_on_type_mismatch() {
        // Arrange
        let router = Router::new();
        let (tx, mut rx) = oneshot::channel();
        router.lock_pending().insert(
            42,
            Pending {
                accepts: <StateLabel as ExpectedResponse>::matches,
                tx,
            },
        );

        // Act
        router.dispatch(&datagram(MessageType::DeviceAcknowledgement, 42, &[]), peer());

        // Assert
        assert!(rx.try_recv().is_err());
        assert_eq!(router.lock_pending().len(), 1);
    }

    #[test]
    fn test_dispatch_ignores_malformed_datagram() {
        let router = Router::new();
        router.dispatch(&[1, 2, 3], peer());
        let mut bad = datagram(MessageType::DeviceAcknowledgement, 1, &[]);
        bad[0] = 99;
        router.dispatch(&bad, peer());
        assert!(router.lock_pending().is_empty());
    }

    #[test]
    fn test_close_fails_pending_requests() {
        // Arrange
        let router = Router::new();
        let (tx, mut rx) = oneshot::channel();
        router.lock_pending().insert(
            7,
            Pending {
                accepts: <Acknowledgement as ExpectedResponse>::matches,
                tx,
            },
        );

        // Act
        router.close();

        // Assert
        assert!(router.is_closed());
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
    }

    #[tokio::test]
    async fn test_request_header_draws_unique_sources() {
        // Arrange
        let (network, requests) = loopback_config();
        let transport = Transport::bind(&network, &requests).expect("bind");

        // Act
        let a = transport.request_header(MacAddress::BROADCAST, true, false);
        let b = transport.request_header(MacAddress::BROADCAST, false, true);

        // Assert
        assert_ne!(a.source, 0);
        assert_ne!(b.source, 0);
        assert_ne!(a.source, b.source);
        assert_eq!(b.sequence, a.sequence.wrapping_add(1));
        assert!(a.ack_required && !a.res_required);
        assert!(!b.ack_required && b.res_required);
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_broadcast_address() {
        let (mut network, requests) = loopback_config();
        network.broadcast_address = "everyone".to_string();
        let result = Transport::bind(&network, &requests);
        assert!(matches!(result, Err(TransportError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_fire_and_forget_returns_immediately() {
        // Arrange
        let (network, requests) = loopback_config();
        let transport = Transport::bind(&network, &requests).expect("bind");
        let header = transport.request_header(MacAddress::BROADCAST, false, false);

        // Act
        let result: Result<NoReply, _> = transport
            .send_request(None, header, MessageType::DeviceGetService, &[])
            .await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_source_is_not_awaited() {
        let (network, requests) = loopback_config();
        let transport = Transport::bind(&network, &requests).expect("bind");
        let result: Result<Acknowledgement, _> = transport
            .send_request(None, FrameHeader::default(), MessageType::DeviceGetService, &[])
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Uncorrelated { message_type: 2 })
        ));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_send_after_shutdown_is_closed() {
        // Arrange
        let (network, requests) = loopback_config();
        let transport = Transport::bind(&network, &requests).expect("bind");

        // Act
        transport.shutdown();
        transport.shutdown();
        let header = transport.request_header(MacAddress::BROADCAST, true, false);
        let result: Result<Acknowledgement, _> = transport
            .send_request(None, header, MessageType::DeviceSetPower, &[Arg::U16(0)])
            .await;

        // Assert
        assert!(transport.is_closed());
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected_while_first_waits() {
        // Arrange
        let (network, requests) = loopback_config();
        let transport = Transport::bind(&network, &requests).expect("bind");
        let header = transport.request_header(MacAddress::BROADCAST, true, false);
        let first = {
            let transport = transport.clone();
            let header = header.clone();
            tokio::spawn(async move {
                transport
                    .send_request::<Acknowledgement>(None, header, MessageType::DeviceGetPower, &[])
                    .await
            })
        };
        while transport.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        // Act
        let second: Result<Acknowledgement, _> = transport
            .send_request(None, header.clone(), MessageType::DeviceGetPower, &[])
            .await;

        // Assert
        assert!(matches!(
            second,
            Err(TransportError::DuplicateCorrelationKey(k)) if k == header.source
        ));
        assert!(matches!(
            first.await.unwrap(),
            Err(TransportError::Timeout { .. })
        ));
    }
}
