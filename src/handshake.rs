//! SOCKS5 handshake: greeting, method selection, username/password
//! sub-negotiation and the CONNECT request.
//!
//! Every terminal state writes its reply (if it has one) before the
//! negotiation returns, so the caller only has to act on the
//! [`HandshakeResult`].

use crate::address::{Target, parse_target};
use crate::auth::{UserPass, authenticate_userpass, select_auth_method};
use crate::error::{HandshakeError, ProtocolError, StreamError};
use crate::protocol::{self, AuthMethod, Command, ReplyCode, Version};
use crate::reader::ExactReader;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// HandshakeResult is the single observable outcome of a negotiation
#[derive(Debug)]
pub enum HandshakeResult {
    /// Client did not offer username/password; `[5, 0xFF]` was sent
    NoAcceptableMethod,
    /// Credentials did not match; `[1, 1]` was sent
    AuthFailed,
    /// Client is authenticated and asked to CONNECT to this target
    Ready(Target),
    /// Malformed or unsupported input
    ProtocolError(ProtocolError),
    /// Stream closed or failed mid-handshake
    Aborted(StreamError),
}

/// HandshakeResult implementation block
impl HandshakeResult {
    /// into_target turns every outcome but Ready into its error
    pub fn into_target(self) -> Result<Target, HandshakeError> {
        match self {
            HandshakeResult::Ready(target) => Ok(target),
            HandshakeResult::NoAcceptableMethod => Err(HandshakeError::NoAcceptableMethod),
            HandshakeResult::AuthFailed => Err(HandshakeError::AuthFailed),
            HandshakeResult::ProtocolError(e) => Err(HandshakeError::Protocol(e)),
            HandshakeResult::Aborted(e) => Err(HandshakeError::Stream(e)),
        }
    }
}

impl From<Result<Target, HandshakeError>> for HandshakeResult {
    fn from(result: Result<Target, HandshakeError>) -> Self {
        match result {
            Ok(target) => HandshakeResult::Ready(target),
            Err(HandshakeError::NoAcceptableMethod) => HandshakeResult::NoAcceptableMethod,
            Err(HandshakeError::AuthFailed) => HandshakeResult::AuthFailed,
            Err(HandshakeError::Protocol(e)) => HandshakeResult::ProtocolError(e),
            Err(HandshakeError::Stream(e)) => HandshakeResult::Aborted(e),
        }
    }
}

/// negotiate runs the full handshake on a client stream
pub async fn negotiate<S>(reader: &mut ExactReader<S>, creds: &UserPass) -> HandshakeResult
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    run(reader, creds).await.into()
}

async fn run<S>(reader: &mut ExactReader<S>, creds: &UserPass) -> Result<Target, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_method(reader).await?;
    authenticate_userpass(reader, creds).await?;
    read_request(reader).await
}

/// negotiate_method handles the greeting and method selection
async fn negotiate_method<S>(reader: &mut ExactReader<S>) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // ClientHello format
    // +----+----------+----------+
    // |VER | NMETHODS | METHODS  |
    // +----+----------+----------+
    // | 1  |    1     | 1 to 255 |
    // +----+----------+----------+
    let [version, n_methods] = reader.read_array::<2>().await?;

    // Ensure version is 0x05 -> SOCKS5
    if version != Version::SOCKS5 as u8 {
        return Err(ProtocolError::Version(version).into());
    }

    let methods = reader.read_exact(n_methods as usize).await?;
    let method = select_auth_method(&methods);
    debug!("client offered methods {:?}, selected {:?}", methods, method);

    // ServerChoice method selection reply format
    // +----+--------+
    // |VER | METHOD |
    // +----+--------+
    // | 1  |   1    |
    // +----+--------+
    reader.reply(&[Version::SOCKS5 as u8, method as u8]).await?;

    match method {
        AuthMethod::UserPass => Ok(()),
        _ => Err(HandshakeError::NoAcceptableMethod),
    }
}

/// read_request parses the CONNECT request that follows authentication
async fn read_request<S>(reader: &mut ExactReader<S>) -> Result<Target, HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // SOCKS5 request format
    // +----+-----+-------+------+----------+----------+
    // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    // +----+-----+-------+------+----------+----------+
    // | 1  |  1  | X'00' |  1   | Variable |    2     |
    // +----+-----+-------+------+----------+----------+
    // RSV is not checked
    let [version, command, _rsv, atyp] = reader.read_array::<4>().await?;

    if version != Version::SOCKS5 as u8 {
        return Err(ProtocolError::Version(version).into());
    }

    if Command::from_byte(command) != Some(Command::Connect) {
        reader
            .reply(&protocol::reply(ReplyCode::CommandNotSupported))
            .await?;
        return Err(ProtocolError::Command(command).into());
    }

    parse_target(reader, atyp).await
}
