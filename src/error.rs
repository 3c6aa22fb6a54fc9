use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WakeError {
    /// The MAC address is not six colon or hyphen separated hex octets.
    #[error("{0} is not a IEEE 802 MAC-48 address")]
    InvalidAddressFormat(String),

    #[error("cannot resolve destination '{input}': {reason}")]
    Resolution {
        input: String,
        reason: ResolutionFault,
    },

    #[error("cannot use interface '{interface}': {reason}")]
    InterfaceResolution {
        interface: String,
        reason: InterfaceFault,
    },

    #[error("unable to {action} udp socket")]
    Socket {
        action: &'static str,
        #[source]
        source: io::Error,
    },

    /// The transport accepted fewer (or more) bytes than the whole packet.
    #[error("magic packet sent was {actual} bytes (expected {expected} bytes sent), it may not have been delivered")]
    ShortWrite { actual: usize, expected: usize },
}

#[derive(Error, Debug)]
pub enum ResolutionFault {
    #[error("lookup failed")]
    Lookup(#[source] io::Error),

    #[error("IPv6 destinations are not supported")]
    Ipv6Unsupported,

    #[error("no IPv4 address found")]
    NoIpv4Address,
}

#[derive(Error, Debug)]
pub enum InterfaceFault {
    #[error("no such interface")]
    NotFound,

    #[error("no address associated with interface")]
    NoAddresses,

    #[error("no non-loopback IPv4 address associated with interface")]
    NoUsableAddress,

    #[error("unable to read the interface table")]
    Lookup(#[source] nix::Error),
}
