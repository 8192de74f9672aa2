use crate::{
    auth::UserPass,
    config::ProxyConfig,
    error::{HandshakeError, SessionError},
    handshake::negotiate,
    protocol::{ReplyCode, reply},
    reader::ExactReader,
    relay::{RelaySession, RelayStats},
};
use anyhow::{Result, bail};
use std::{net::SocketAddr, sync::Arc};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
};
use tracing::{debug, error, info, warn};

/// Socks5Server represents a SOCKS5 server and houses related
/// configuration data
pub struct Socks5Server {
    pub listen_addr: String,
    credentials: Arc<UserPass>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(listen_addr: impl Into<String>, credentials: UserPass) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            // Arc allows shared ownership of UserPass across connections
            credentials: Arc::new(credentials),
            listener: None,
        }
    }

    /// from_config builds a server listening on every interface at the
    /// configured port
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.listen_addr(), config.credentials())
    }

    /// bind to the listen address. Can only be called once
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("[ERR] listener already bound");
        }

        let listener = TcpListener::bind(&self.listen_addr).await?;
        let addr = listener.local_addr()?;

        info!("SOCKS5 server listening on {}", addr);

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run accepts connections forever, one task per client
    pub async fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let Some(listener) = self.listener.take() else {
            bail!("[ERR] listener not bound");
        };

        loop {
            let (inbound, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // One failed accept must not take the listener down
                    error!("accept error: {}", e);
                    continue;
                }
            };

            let credentials = Arc::clone(&self.credentials);

            tokio::spawn(async move {
                debug!("new client: {}", peer_addr);

                match handle_connection(inbound, peer_addr, &credentials).await {
                    Ok(stats) => info!(
                        "connection from {} closed: {} bytes from client, {} bytes from server",
                        peer_addr, stats.from_client, stats.from_outbound
                    ),
                    Err(
                        e @ SessionError::Handshake(
                            HandshakeError::AuthFailed | HandshakeError::NoAcceptableMethod,
                        ),
                    ) => warn!("client {} rejected: {}", peer_addr, e),
                    Err(e) => error!("connection error from {}: {}", peer_addr, e),
                }
            });
        }
    }
}

/// handle_connection runs one client session: handshake, dial, relay.
/// The client stream is closed on every exit path
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    credentials: &UserPass,
) -> Result<RelayStats, SessionError> {
    let mut reader = ExactReader::new(stream);

    let target = match negotiate(&mut reader, credentials).await.into_target() {
        Ok(target) => target,
        Err(e) => {
            close(reader.get_mut()).await;
            return Err(e.into());
        }
    };

    info!("CONNECT from {} -> {}", peer_addr, target);

    // No timeout: relies on the OS connect behaviour
    let outbound = match target.connect().await {
        Ok(outbound) => outbound,
        Err(source) => {
            // Client may already be gone; the dial error is what matters
            let _ = reader.reply(&reply(ReplyCode::HostUnreachable)).await;
            close(reader.get_mut()).await;
            return Err(SessionError::Dial {
                target: target.to_string(),
                source,
            });
        }
    };

    reader
        .reply(&reply(ReplyCode::Succeeded))
        .await
        .map_err(HandshakeError::from)?;

    let (client, pending) = reader.into_parts();
    RelaySession::new(client, outbound)
        .with_pending(pending)
        .run()
        .await
        .map_err(SessionError::Relay)
}

/// close shuts the stream down; safe to call on an already closed stream
async fn close(stream: &mut TcpStream) {
    let _ = stream.shutdown().await;
}
