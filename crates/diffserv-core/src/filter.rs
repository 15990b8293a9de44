//! # Packet Filters
//!
//! A [`FilterElement`] is one predicate over one header field. A [`Filter`]
//! is the conjunction of its elements. Traffic classes hold several filters
//! and match when any of them does.

use std::net::Ipv4Addr;

use crate::packet::Packet;

/// Compute an IPv4 netmask from a prefix length. Lengths above 32 saturate.
pub fn ipv4_mask(prefix_len: u8) -> Ipv4Addr {
    if prefix_len == 0 {
        return Ipv4Addr::new(0, 0, 0, 0);
    }
    let prefix_len = prefix_len.min(32);
    let mask_u32 = u32::MAX << (32 - u32::from(prefix_len));
    Ipv4Addr::from(mask_u32)
}

fn same_subnet(candidate: Ipv4Addr, network: Ipv4Addr, prefix_len: u8) -> bool {
    let mask = u32::from(ipv4_mask(prefix_len));
    u32::from(candidate) & mask == u32::from(network) & mask
}

/// Atomic match on a single packet attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterElement {
    SourceIpAddress(Ipv4Addr),
    DestinationIpAddress(Ipv4Addr),
    /// Source address inside `addr/prefix_len`.
    SourceMask { addr: Ipv4Addr, prefix_len: u8 },
    /// Destination address inside `addr/prefix_len`.
    DestinationMask { addr: Ipv4Addr, prefix_len: u8 },
    SourcePortNumber(u16),
    DestinationPortNumber(u16),
    ProtocolNumber(u8),
}

impl FilterElement {
    pub fn matches<P: Packet + ?Sized>(&self, packet: &P) -> bool {
        match *self {
            FilterElement::SourceIpAddress(addr) => packet.source_addr() == Some(addr),
            FilterElement::DestinationIpAddress(addr) => packet.destination_addr() == Some(addr),
            FilterElement::SourceMask { addr, prefix_len } => packet
                .source_addr()
                .is_some_and(|src| same_subnet(src, addr, prefix_len)),
            FilterElement::DestinationMask { addr, prefix_len } => packet
                .destination_addr()
                .is_some_and(|dst| same_subnet(dst, addr, prefix_len)),
            FilterElement::SourcePortNumber(port) => packet.source_port() == Some(port),
            FilterElement::DestinationPortNumber(port) => packet.destination_port() == Some(port),
            FilterElement::ProtocolNumber(proto) => packet.protocol() == Some(proto),
        }
    }
}

/// Conjunction of filter elements.
///
/// An empty filter matches nothing; a class that should catch everything
/// is expressed with `is_default` rather than an empty filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    elements: Vec<FilterElement>,
}

impl Filter {
    pub fn new(elements: Vec<FilterElement>) -> Self {
        Filter { elements }
    }

    pub fn elements(&self) -> &[FilterElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn matches<P: Packet + ?Sized>(&self, packet: &P) -> bool {
        !self.elements.is_empty() && self.elements.iter().all(|e| e.matches(packet))
    }
}

impl FromIterator<FilterElement> for Filter {
    fn from_iter<I: IntoIterator<Item = FilterElement>>(iter: I) -> Self {
        Filter::new(iter.into_iter().collect())
    }
}
