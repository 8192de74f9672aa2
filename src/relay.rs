use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, split};
use tracing::{debug, trace};

/// Size of the per-direction copy buffer
const BUF_SIZE: usize = 8192;

/// Side identifies which end of a relay stopped first
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Side {
    Client,
    Outbound,
}

/// RelayStats summarises a finished relay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayStats {
    pub from_client: u64,
    pub from_outbound: u64,
    pub closed_by: Side,
}

/// RelaySession couples an accepted client stream with its outbound
/// stream. When either direction stops the whole session is torn down
/// and both streams are dropped together
pub struct RelaySession<C, O> {
    client: C,
    outbound: O,
    pending: Vec<u8>,
}

/// RelaySession implementation block
impl<C, O> RelaySession<C, O>
where
    C: AsyncRead + AsyncWrite + Unpin,
    O: AsyncRead + AsyncWrite + Unpin,
{
    /// new is a constructor for the RelaySession type
    pub fn new(client: C, outbound: O) -> Self {
        Self {
            client,
            outbound,
            pending: Vec::new(),
        }
    }

    /// with_pending queues client bytes that were read ahead during the
    /// handshake; they are forwarded before anything else
    pub fn with_pending(mut self, pending: Vec<u8>) -> Self {
        self.pending = pending;
        self
    }

    /// run relays bytes in both directions until one side closes or errors
    pub async fn run(self) -> io::Result<RelayStats> {
        let (mut client_read, mut client_write) = split(self.client);
        let (mut outbound_read, mut outbound_write) = split(self.outbound);

        let from_client = AtomicU64::new(0);
        let from_outbound = AtomicU64::new(0);

        if !self.pending.is_empty() {
            outbound_write.write_all(&self.pending).await?;
            from_client.fetch_add(self.pending.len() as u64, Ordering::Relaxed);
        }

        let closed_by = tokio::select! {
            result = copy_half(&mut client_read, &mut outbound_write, &from_client, "client->outbound") => {
                result?;
                Side::Client
            }
            result = copy_half(&mut outbound_read, &mut client_write, &from_outbound, "outbound->client") => {
                result?;
                Side::Outbound
            }
        };

        Ok(RelayStats {
            from_client: from_client.load(Ordering::Relaxed),
            from_outbound: from_outbound.load(Ordering::Relaxed),
            closed_by,
        })
    }
}

/// copy_half copies one direction until EOF, then shuts down the write
/// side so the peer sees the close
async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    counter: &AtomicU64,
    direction: &'static str,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUF_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            debug!(
                "{}: EOF after {} bytes",
                direction,
                counter.load(Ordering::Relaxed)
            );
            break;
        }

        trace!("{}: {} bytes", direction, n);
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    // Errors here mean the peer is already gone
    let _ = writer.shutdown().await;

    Ok(())
}
