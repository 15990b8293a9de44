//! # Packet Model
//!
//! The queuing discipline never parses headers itself. Filters read packet
//! attributes through the [`Packet`] trait, so any host representation can be
//! queued as long as it can report its size and, optionally, its IPv4/transport
//! header fields.

use std::net::Ipv4Addr;

use bytes::Bytes;

/// Well-known IP protocol numbers.
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Accessors the classifier and schedulers need from a queued packet.
///
/// Header accessors return `None` when the field is not present (for
/// example a non-IP frame, or a protocol without ports). A filter element
/// whose field is absent never matches.
pub trait Packet {
    /// Size on the wire in bytes. DRR charges this against the class deficit.
    fn size(&self) -> u32;

    fn source_addr(&self) -> Option<Ipv4Addr> {
        None
    }

    fn destination_addr(&self) -> Option<Ipv4Addr> {
        None
    }

    fn source_port(&self) -> Option<u16> {
        None
    }

    fn destination_port(&self) -> Option<u16> {
        None
    }

    fn protocol(&self) -> Option<u8> {
        None
    }
}

impl<P: Packet + ?Sized> Packet for Box<P> {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn source_addr(&self) -> Option<Ipv4Addr> {
        (**self).source_addr()
    }

    fn destination_addr(&self) -> Option<Ipv4Addr> {
        (**self).destination_addr()
    }

    fn source_port(&self) -> Option<u16> {
        (**self).source_port()
    }

    fn destination_port(&self) -> Option<u16> {
        (**self).destination_port()
    }

    fn protocol(&self) -> Option<u8> {
        (**self).protocol()
    }
}

// ─── Header fields ──────────────────────────────────────────────────────────

/// IPv4 + transport header fields already extracted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowHeaders {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub protocol: u8,
    /// Transport ports, if the protocol carries them.
    pub ports: Option<(u16, u16)>,
}

impl FlowHeaders {
    pub fn udp(source: Ipv4Addr, src_port: u16, destination: Ipv4Addr, dst_port: u16) -> Self {
        FlowHeaders {
            source,
            destination,
            protocol: PROTO_UDP,
            ports: Some((src_port, dst_port)),
        }
    }

    pub fn tcp(source: Ipv4Addr, src_port: u16, destination: Ipv4Addr, dst_port: u16) -> Self {
        FlowHeaders {
            protocol: PROTO_TCP,
            ..Self::udp(source, src_port, destination, dst_port)
        }
    }
}

// ─── PacketMeta ─────────────────────────────────────────────────────────────

/// A concrete packet: identity, size, optional headers and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketMeta {
    /// Unique id assigned by the producer.
    pub uid: u64,
    /// Producer-defined flow tag, carried through untouched.
    pub flow: u32,
    /// Size on the wire in bytes.
    pub size: u32,
    pub headers: Option<FlowHeaders>,
    pub payload: Bytes,
}

impl PacketMeta {
    /// A header-less packet of `size` bytes.
    pub fn new(uid: u64, size: u32) -> Self {
        PacketMeta {
            uid,
            flow: 0,
            size,
            headers: None,
            payload: Bytes::new(),
        }
    }

    pub fn with_flow(mut self, flow: u32) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_headers(mut self, headers: FlowHeaders) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Attach a payload; the wire size becomes the payload length.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.size = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        self.payload = payload;
        self
    }
}

impl Packet for PacketMeta {
    fn size(&self) -> u32 {
        self.size
    }

    fn source_addr(&self) -> Option<Ipv4Addr> {
        self.headers.map(|h| h.source)
    }

    fn destination_addr(&self) -> Option<Ipv4Addr> {
        self.headers.map(|h| h.destination)
    }

    fn source_port(&self) -> Option<u16> {
        self.headers.and_then(|h| h.ports).map(|(src, _)| src)
    }

    fn destination_port(&self) -> Option<u16> {
        self.headers.and_then(|h| h.ports).map(|(_, dst)| dst)
    }

    fn protocol(&self) -> Option<u8> {
        self.headers.map(|h| h.protocol)
    }
}
