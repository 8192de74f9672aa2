//! Error types for the proxy

use thiserror::Error;

/// Transport failure while reading or writing the client stream
#[derive(Error, Debug)]
pub enum StreamError {
    /// Peer closed the stream before the expected bytes arrived
    #[error("stream closed")]
    Closed,

    /// I/O error on the underlying transport
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
}

/// Malformed or unsupported handshake input
#[derive(Error, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("unsupported SOCKS version {0:#04x}")]
    Version(u8),

    #[error("invalid username/password sub-negotiation version {0:#04x}")]
    AuthVersion(u8),

    #[error("unsupported command {0:#04x}")]
    Command(u8),

    #[error("unsupported atyp {0:#04x}")]
    AddressType(u8),

    #[error("domain name is not valid UTF-8")]
    InvalidDomain,
}

/// Reason a handshake ended without producing a target
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("handshake aborted: {0}")]
    Stream(#[from] StreamError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("no acceptable authentication method offered")]
    NoAcceptableMethod,

    #[error("authentication failed")]
    AuthFailed,
}

/// Terminal outcome of a single client session other than a clean close
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("failed to connect to {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("relay error: {0}")]
    Relay(#[source] std::io::Error),
}
