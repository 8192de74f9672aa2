use crate::error::{HandshakeError, ProtocolError};
use crate::protocol::AddressType;
use crate::reader::ExactReader;
use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::{io::AsyncRead, net::TcpStream};

/// AddressSpec is a destination address as carried in a SOCKS5 request
#[derive(Debug, Clone, PartialEq)]
pub enum AddressSpec {
    IPv4([u8; 4]),
    DomainName(String),
    IPv6([u8; 16]),
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::IPv4(octets) => write!(f, "{}", Ipv4Addr::from(*octets)),
            AddressSpec::DomainName(domain) => f.write_str(domain),
            AddressSpec::IPv6(octets) => write!(f, "[{}]", Ipv6Addr::from(*octets)),
        }
    }
}

/// Target is the destination a client asked to be connected to
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub address: AddressSpec,
    pub port: u16,
}

/// Target implementation block
impl Target {
    /// connect dials the target. Domain names go through the system
    /// resolver and only the first resolved address is dialed
    pub async fn connect(&self) -> io::Result<TcpStream> {
        match &self.address {
            AddressSpec::IPv4(octets) => {
                TcpStream::connect(SocketAddr::from((Ipv4Addr::from(*octets), self.port))).await
            }
            AddressSpec::IPv6(octets) => {
                TcpStream::connect(SocketAddr::from((Ipv6Addr::from(*octets), self.port))).await
            }
            AddressSpec::DomainName(domain) => {
                let addr = tokio::net::lookup_host((domain.as_str(), self.port))
                    .await?
                    .next()
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("no IP address found for '{domain}'"),
                        )
                    })?;
                TcpStream::connect(addr).await
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// parse_target reads DST.ADDR and DST.PORT for the given ATYP byte.
///
/// Stream failures surface as `HandshakeError::Stream`, malformed input as
/// `HandshakeError::Protocol`.
pub async fn parse_target<S: AsyncRead + Unpin>(
    reader: &mut ExactReader<S>,
    atyp: u8,
) -> Result<Target, HandshakeError> {
    let address = match AddressType::from_byte(atyp) {
        Some(AddressType::IPv4) => AddressSpec::IPv4(reader.read_array::<4>().await?),
        Some(AddressType::DomainName) => {
            // First octet in DomainName contains the number of
            // octets to follow
            let len = reader.read_u8().await?;
            let domain = reader.read_exact(len as usize).await?;
            let domain = String::from_utf8(domain).map_err(|_| ProtocolError::InvalidDomain)?;
            AddressSpec::DomainName(domain)
        }
        Some(AddressType::IPv6) => AddressSpec::IPv6(reader.read_array::<16>().await?),
        None => return Err(ProtocolError::AddressType(atyp).into()),
    };

    // Port is always BigEndian (network order)
    let port = reader.read_u16().await?;

    Ok(Target { address, port })
}
