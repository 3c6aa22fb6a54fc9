//! Delivers an encoded magic packet as a single UDP datagram.
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, ToSocketAddrs, UdpSocket};

use nix::ifaddrs::getifaddrs;
use tracing::{debug, info};

use crate::error::{InterfaceFault, ResolutionFault, WakeError};
use crate::wol::MAGIC_PACKET_LEN;

/// The discard protocol port wake-on-LAN listeners conventionally watch.
pub const WOL_PORT: u16 = 9;
pub const DEFAULT_DESTINATION: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Anything a whole datagram can be handed to in one call.
pub trait Datagram {
    fn send(&self, buf: &[u8]) -> io::Result<usize>;
}

impl Datagram for UdpSocket {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf)
    }
}

/// Resolves an optional host (an IPv4 literal or a name) into the endpoint to
/// send to. A missing or blank host means the limited broadcast address.
pub fn resolve_destination(host: Option<&str>) -> Result<SocketAddrV4, WakeError> {
    let host = match host.map(str::trim).filter(|host| !host.is_empty()) {
        None => return Ok(SocketAddrV4::new(DEFAULT_DESTINATION, WOL_PORT)),
        Some(host) => host,
    };
    let fault = |reason| WakeError::Resolution {
        input: host.to_owned(),
        reason,
    };

    if let Ok(IpAddr::V6(_)) = host.parse::<IpAddr>() {
        return Err(fault(ResolutionFault::Ipv6Unsupported));
    }

    let destination = (host, WOL_PORT)
        .to_socket_addrs()
        .map_err(|err| fault(ResolutionFault::Lookup(err)))?
        .find_map(|addr| match addr {
            SocketAddr::V4(addr) => Some(addr),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| fault(ResolutionFault::NoIpv4Address))?;

    debug!(host, %destination, "resolved destination");
    Ok(destination)
}

/// Picks the local endpoint to bind to so the packet leaves through
/// `interface`. The port is left to the OS.
pub fn resolve_source(interface: &str) -> Result<SocketAddrV4, WakeError> {
    let table = getifaddrs().map_err(|errno| WakeError::InterfaceResolution {
        interface: interface.to_owned(),
        reason: InterfaceFault::Lookup(errno),
    })?;

    let entries = table.map(|ifaddr| {
        let ip = ifaddr.address.as_ref().and_then(|addr| {
            if let Some(sin) = addr.as_sockaddr_in() {
                Some(IpAddr::V4(Ipv4Addr::from(sin.ip())))
            } else {
                addr.as_sockaddr_in6().map(|sin6| IpAddr::V6(Ipv6Addr::from(sin6.ip())))
            }
        });
        (ifaddr.interface_name, ip)
    });

    let ip = select_source(interface, entries)?;
    debug!(interface, %ip, "selected source address");
    Ok(SocketAddrV4::new(ip, 0))
}

/// First non-loopback IPv4 address listed for `interface`.
pub(crate) fn select_source<I>(interface: &str, table: I) -> Result<Ipv4Addr, WakeError>
where
    I: IntoIterator<Item = (String, Option<IpAddr>)>,
{
    let fault = |reason| WakeError::InterfaceResolution {
        interface: interface.to_owned(),
        reason,
    };

    let mut found = false;
    let mut addresses = Vec::new();
    for (name, ip) in table {
        if name != interface {
            continue;
        }
        found = true;
        addresses.extend(ip);
    }

    if !found {
        return Err(fault(InterfaceFault::NotFound));
    }
    if addresses.is_empty() {
        return Err(fault(InterfaceFault::NoAddresses));
    }

    addresses
        .into_iter()
        .find_map(|ip| match ip {
            IpAddr::V4(ip) if !ip.is_loopback() => Some(ip),
            _ => None,
        })
        .ok_or_else(|| fault(InterfaceFault::NoUsableAddress))
}

/// Sends `packet` to `destination` in one datagram, optionally from a fixed
/// local address. The socket is closed before this returns.
pub fn send(
    packet: &[u8; MAGIC_PACKET_LEN],
    destination: SocketAddrV4,
    source: Option<SocketAddrV4>,
) -> Result<(), WakeError> {
    let local = source.unwrap_or(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
    let socket = open_socket(local, destination)?;
    deliver(&socket, packet)
}

fn open_socket(local: SocketAddrV4, destination: SocketAddrV4) -> Result<UdpSocket, WakeError> {
    let socket = UdpSocket::bind(local).map_err(socket_error("bind"))?;
    socket.set_broadcast(true).map_err(socket_error("configure"))?;
    socket.connect(destination).map_err(socket_error("connect"))?;
    debug!(%local, %destination, "udp socket ready");

    Ok(socket)
}

fn socket_error(action: &'static str) -> impl FnOnce(io::Error) -> WakeError {
    move |source| WakeError::Socket { action, source }
}

/// Writes the whole packet with a single send and checks nothing was lost.
pub(crate) fn deliver<D: Datagram>(socket: &D, packet: &[u8]) -> Result<(), WakeError> {
    let written = socket.send(packet).map_err(socket_error("send on"))?;

    if written != packet.len() {
        return Err(WakeError::ShortWrite {
            actual: written,
            expected: packet.len(),
        });
    }

    info!(bytes = written, "magic packet written");
    Ok(())
}

#[cfg(test)]
struct Truncating(usize);

#[cfg(test)]
impl Datagram for Truncating {
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len().min(self.0))
    }
}

#[cfg(test)]
fn table(entries: &[(&str, Option<&str>)]) -> Vec<(String, Option<IpAddr>)> {
    entries
        .iter()
        .map(|(name, ip)| (name.to_string(), ip.map(|ip| ip.parse().unwrap())))
        .collect()
}

#[test]
fn test_destination_default() {
    let expected = SocketAddrV4::new(Ipv4Addr::new(255, 255, 255, 255), 9);
    assert_eq!(resolve_destination(None).unwrap(), expected);
    assert_eq!(resolve_destination(Some("")).unwrap(), expected);
    assert_eq!(resolve_destination(Some("  ")).unwrap(), expected);
}

#[test]
fn test_destination_override() {
    let dst = resolve_destination(Some("192.168.1.255")).unwrap();
    assert_eq!(dst, SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 255), WOL_PORT));
}

#[test]
fn test_destination_hostname() {
    let dst = resolve_destination(Some("localhost")).unwrap();
    assert!(dst.ip().is_loopback());
    assert_eq!(dst.port(), WOL_PORT);
}

#[test]
fn test_destination_unresolvable() {
    // .invalid never resolves
    match resolve_destination(Some("no-such-host.invalid")) {
        Err(WakeError::Resolution {
            input,
            reason: ResolutionFault::Lookup(_),
        }) => assert_eq!(input, "no-such-host.invalid"),
        other => panic!("expected a failed lookup, got {:?}", other),
    }
}

#[test]
fn test_destination_ipv6_rejected() {
    for input in ["::1", "fe80::1"] {
        match resolve_destination(Some(input)) {
            Err(WakeError::Resolution {
                input: got,
                reason: ResolutionFault::Ipv6Unsupported,
            }) => assert_eq!(got, input),
            other => panic!("expected Ipv6Unsupported for {}, got {:?}", input, other),
        }
    }
}

#[test]
fn test_select_first_non_loopback_ipv4() {
    let entries = table(&[
        ("lo", Some("127.0.0.1")),
        ("eth0", None),
        ("eth0", Some("fe80::1")),
        ("eth0", Some("10.0.0.7")),
        ("eth0", Some("10.0.0.8")),
        ("eth1", Some("192.168.1.2")),
    ]);
    assert_eq!(
        select_source("eth0", entries).unwrap(),
        Ipv4Addr::new(10, 0, 0, 7)
    );
}

#[test]
fn test_select_missing_interface() {
    let entries = table(&[("eth0", Some("10.0.0.7"))]);
    assert!(matches!(
        select_source("wlan0", entries),
        Err(WakeError::InterfaceResolution {
            reason: InterfaceFault::NotFound,
            ..
        })
    ));
}

#[test]
fn test_select_no_addresses() {
    let entries = table(&[("eth0", None)]);
    assert!(matches!(
        select_source("eth0", entries),
        Err(WakeError::InterfaceResolution {
            reason: InterfaceFault::NoAddresses,
            ..
        })
    ));
}

#[test]
fn test_select_only_loopback_or_ipv6() {
    let entries = table(&[("lo", Some("127.0.0.1")), ("lo", Some("::1"))]);
    assert!(matches!(
        select_source("lo", entries),
        Err(WakeError::InterfaceResolution {
            reason: InterfaceFault::NoUsableAddress,
            ..
        })
    ));
}

#[test]
fn test_resolve_unknown_interface() {
    // reads the host's interface table; no real NIC is expected to carry this name
    assert!(matches!(
        resolve_source("no-such-nic0"),
        Err(WakeError::InterfaceResolution {
            reason: InterfaceFault::NotFound,
            ..
        })
    ));
}

#[test]
fn test_short_write() {
    let packet = [0xFFu8; MAGIC_PACKET_LEN];
    match deliver(&Truncating(50), &packet) {
        Err(WakeError::ShortWrite { actual, expected }) => {
            assert_eq!(actual, 50);
            assert_eq!(expected, 102);
        }
        other => panic!("expected ShortWrite, got {:?}", other),
    }
    assert!(deliver(&Truncating(usize::MAX), &packet).is_ok());
}

#[test]
fn test_send_over_loopback() {
    let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let destination = match receiver.local_addr().unwrap() {
        std::net::SocketAddr::V4(addr) => addr,
        other => panic!("unexpected address {}", other),
    };

    let packet = crate::wol::create_magic_packet("01:02:03:04:05:06")
        .unwrap()
        .to_bytes();
    let source = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
    send(&packet, destination, Some(source)).unwrap();

    let mut buf = [0u8; 512];
    let (len, from) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(len, MAGIC_PACKET_LEN);
    assert_eq!(&buf[..len], &packet[..]);
    assert_eq!(from.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
}
