//! UDP OSC sender
//!
//! Queues typed messages and sends them on flush, either as one immediate
//! bundle or as individual datagrams. Sending never blocks the tick loop:
//! the socket is non-blocking and every failure is logged, not returned.

use rosc::{encoder, OscBundle, OscPacket, OscTime};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{build_message, OscArgType, OscSink, OscValue};
use crate::config::OscSettings;

/// OSC timetag meaning "immediately"
const IMMEDIATE: OscTime = OscTime { seconds: 0, fractional: 1 };

#[derive(Debug, Error)]
pub enum OscError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve OSC target {target}")]
    Resolve { target: String },

    #[error("failed to configure UDP socket: {0}")]
    Configure(#[source] std::io::Error),

    #[error("failed to encode OSC packet: {0}")]
    Encode(String),

    #[error("failed to send to {target}: {source}")]
    Send {
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Fire-and-forget UDP sink
#[derive(Debug)]
pub struct UdpOscSender {
    socket: UdpSocket,
    target: SocketAddr,
    use_bundles: bool,
    queue: Vec<OscPacket>,
}

impl UdpOscSender {
    /// Open a socket for the configured target
    ///
    /// # Arguments
    /// * `settings` - Target address, bind address, broadcast and bundle flags
    pub fn new(settings: &OscSettings) -> Result<Self, OscError> {
        let target_text = format!("{}:{}", settings.ip.trim(), settings.port);
        let target = target_text
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| OscError::Resolve { target: target_text.clone() })?;

        let bind_addr = format!("{}:0", settings.bind_ip().unwrap_or("0.0.0.0"));
        let socket = UdpSocket::bind(&bind_addr).map_err(|source| OscError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;
        socket.set_nonblocking(true).map_err(OscError::Configure)?;
        if settings.broadcast_enabled() {
            socket.set_broadcast(true).map_err(OscError::Configure)?;
        }

        info!(
            "✅ OSC sender ready: {} (bind {}, bundles: {})",
            target, bind_addr, settings.use_bundles
        );

        Ok(Self {
            socket,
            target,
            use_bundles: settings.use_bundles,
            queue: Vec::new(),
        })
    }

    fn send_packet(&self, packet: &OscPacket) -> Result<(), OscError> {
        let bytes = encoder::encode(packet).map_err(|e| OscError::Encode(format!("{:?}", e)))?;
        self.socket
            .send_to(&bytes, self.target)
            .map_err(|source| OscError::Send { target: self.target, source })?;
        Ok(())
    }
}

impl OscSink for UdpOscSender {
    fn queue(&mut self, address: &str, value: OscValue, hint: OscArgType) {
        self.queue.push(OscPacket::Message(build_message(address, &value, hint)));
    }

    fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let packets = std::mem::take(&mut self.queue);
        let count = packets.len();

        if self.use_bundles {
            let bundle = OscPacket::Bundle(OscBundle {
                timetag: IMMEDIATE,
                content: packets,
            });
            if let Err(e) = self.send_packet(&bundle) {
                warn!("OSC bundle of {} message(s) dropped: {}", count, e);
            }
        } else {
            let failures = packets.iter().filter_map(|p| self.send_packet(p).err()).count();
            if failures > 0 {
                warn!("OSC flush: {} of {} message(s) failed to send", failures, count);
            }
        }
        debug!("OSC flush: {} message(s) to {}", count, self.target);
    }
}
