//! In-process fake LIFX device for integration tests.
//!
//! The fake binds a loopback UDP socket and answers each request through a
//! handler closure.  Clients under test are configured so their "broadcast"
//! address is the fake's loopback port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lifx_client::{ClientConfig, DiscoveryConfig, NetworkConfig, RequestConfig};
use lifx_core::protocol::codec::{decode_packet, encode_packet};
use lifx_core::protocol::payload::Payload;
use lifx_core::{DecodedPacket, DeviceTarget, FrameHeader, MacAddress, MessageType};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// One datagram the fake sends back.
pub enum Outgoing {
    /// A well-formed reply echoing the request's source and sequence.
    Reply {
        message_type: MessageType,
        payload: Vec<u8>,
        delay: Duration,
    },
    /// A reply with the source id replaced.
    ReplyWithSource {
        message_type: MessageType,
        payload: Vec<u8>,
        source: u32,
    },
    /// Bytes sent verbatim.
    Raw(Vec<u8>),
}

impl Outgoing {
    pub fn reply(message_type: MessageType, payload: Vec<u8>) -> Self {
        Outgoing::Reply {
            message_type,
            payload,
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(message_type: MessageType, payload: Vec<u8>, delay: Duration) -> Self {
        Outgoing::Reply {
            message_type,
            payload,
            delay,
        }
    }
}

pub type Handler = Arc<dyn Fn(&DecodedPacket) -> Vec<Outgoing> + Send + Sync>;

pub fn respond_with(
    handler: impl Fn(&DecodedPacket) -> Vec<Outgoing> + Send + Sync + 'static,
) -> Handler {
    Arc::new(handler)
}

/// A fake device on `127.0.0.1`.
pub struct FakeDevice {
    pub addr: SocketAddr,
    pub mac: MacAddress,
    received: Arc<Mutex<Vec<(usize, DecodedPacket)>>>,
    silent: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn spawn(mac: MacAddress, handler: Handler) -> Self {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.expect("bind fake"));
        let addr = socket.local_addr().expect("fake addr");
        let received = Arc::new(Mutex::new(Vec::new()));
        let silent = Arc::new(AtomicBool::new(false));

        let task = {
            let received = Arc::clone(&received);
            let silent = Arc::clone(&silent);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                loop {
                    let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                        continue;
                    };
                    let Ok(request) = decode_packet(&buf[..len]) else {
                        continue;
                    };
                    received.lock().unwrap().push((len, request.clone()));
                    if silent.load(Ordering::SeqCst) {
                        continue;
                    }
                    for outgoing in handler(&request) {
                        let socket = Arc::clone(&socket);
                        let (bytes, delay) = render(&request.header, mac, outgoing);
                        tokio::spawn(async move {
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            let _ = socket.send_to(&bytes, from).await;
                        });
                    }
                }
            })
        };

        Self {
            addr,
            mac,
            received,
            silent,
            task,
        }
    }

    /// Every decoded request so far, with its datagram length.
    pub fn received(&self) -> Vec<(usize, DecodedPacket)> {
        self.received.lock().unwrap().clone()
    }

    pub fn received_of(&self, message_type: MessageType) -> Vec<(usize, DecodedPacket)> {
        self.received()
            .into_iter()
            .filter(|(_, p)| p.message_type == message_type.code())
            .collect()
    }

    /// While silent, requests are recorded but not answered.
    pub fn set_silent(&self, silent: bool) {
        self.silent.store(silent, Ordering::SeqCst);
    }

    pub fn target(&self) -> DeviceTarget {
        DeviceTarget::new(self.addr, self.mac)
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn render(request: &FrameHeader, mac: MacAddress, outgoing: Outgoing) -> (Vec<u8>, Duration) {
    let header = |source| FrameHeader {
        source,
        target: mac,
        ack_required: false,
        res_required: false,
        sequence: request.sequence,
        at_time: 0,
    };
    match outgoing {
        Outgoing::Reply {
            message_type,
            payload,
            delay,
        } => (
            encode_packet(&header(request.source), message_type.code(), &payload).unwrap(),
            delay,
        ),
        Outgoing::ReplyWithSource {
            message_type,
            payload,
            source,
        } => (
            encode_packet(&header(source), message_type.code(), &payload).unwrap(),
            Duration::ZERO,
        ),
        Outgoing::Raw(bytes) => (bytes, Duration::ZERO),
    }
}

// ── Payload helpers ───────────────────────────────────────────────────────────

pub fn state_service(port: u16) -> Vec<u8> {
    let mut p = Payload::new();
    p.write(1u8);
    p.write(u32::from(port));
    p.into_bytes()
}

pub fn state_version(product: u32) -> Vec<u8> {
    let mut p = Payload::new();
    p.write(1u32);
    p.write(product);
    p.write(0u32);
    p.into_bytes()
}

pub fn state_power(level: u16) -> Vec<u8> {
    let mut p = Payload::new();
    p.write(level);
    p.into_bytes()
}

pub fn state_label(label: &str) -> Vec<u8> {
    let mut p = Payload::new();
    p.write_fixed_string(label, 32);
    p.into_bytes()
}

pub fn test_mac(last: u8) -> MacAddress {
    MacAddress([0xD0, 0x73, 0xD5, 0x00, 0x00, last])
}

/// A client config whose broadcasts reach the fake on `device_port`.
pub fn loopback_config(device_port: u16, timeout_ms: u64) -> ClientConfig {
    ClientConfig {
        network: NetworkConfig {
            bind_address: "127.0.0.1".to_string(),
            listen_port: 0,
            device_port,
            broadcast_address: "127.0.0.1".to_string(),
        },
        requests: RequestConfig { timeout_ms },
        discovery: DiscoveryConfig {
            probe_interval_ms: 100,
            stale_after_secs: 1,
            classify_devices: true,
        },
    }
}
