//! Client <-> backend byte relay
//!
//! Client packets are decoded one frame at a time and handed to the filter
//! session; backend bytes are handed over exactly as they were read, so
//! the resultset parser sees the same fragmentation the socket produced.

use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Encoder, FramedRead};
use tracing::{debug, info, warn};

use crate::config::BackendConfig;
use crate::filter::{FilterInstance, FilterSession};
use crate::protocol::capabilities::UNSUPPORTED_CAPABILITIES;
use crate::protocol::packet::PACKET_HEADER_SIZE;
use crate::protocol::{mask_server_capabilities, PacketCodec, PacketHeader, ServerGreeting};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Relay errors
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend connection failed: {0}")]
    BackendConnect(String),
}

/// Open the TCP connection to the backend
pub async fn connect_backend(config: &BackendConfig) -> Result<TcpStream, RelayError> {
    let addr = config.addr();
    debug!(addr = %addr, "Connecting to backend");

    let timeout = Duration::from_millis(config.connect_timeout_ms);
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| RelayError::BackendConnect(format!("{}: timed out after {:?}", addr, timeout)))?
        .map_err(|e| RelayError::BackendConnect(format!("{}: {}", addr, e)))?;

    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Holds back the server greeting until it is complete and strips the
/// capabilities the filter cannot follow
struct GreetingRewriter {
    pending: Option<BytesMut>,
}

impl GreetingRewriter {
    fn new() -> Self {
        Self {
            pending: Some(BytesMut::new()),
        }
    }

    /// Bytes ready for the client, None while the greeting is incomplete
    fn rewrite(&mut self, session_id: u32, chunk: Bytes) -> Option<Bytes> {
        let pending = match self.pending.as_mut() {
            Some(pending) => pending,
            None => return Some(chunk),
        };
        pending.extend_from_slice(&chunk);

        let packet_len = PacketHeader::parse(pending)
            .map(|header| header.packet_len())
            .filter(|&len| pending.len() >= len)?;

        let mut data = self.pending.take().unwrap_or_default();
        let payload = &mut data[PACKET_HEADER_SIZE..packet_len];

        match mask_server_capabilities(payload, UNSUPPORTED_CAPABILITIES) {
            Some(_) => {
                if let Some(greeting) = ServerGreeting::parse(payload) {
                    info!(
                        session_id = session_id,
                        protocol_version = greeting.protocol_version,
                        server_version = %greeting.server_version,
                        connection_id = greeting.connection_id,
                        capabilities = %format!("{:#010x}", greeting.capability_flags),
                        "Backend greeting"
                    );
                }
            }
            None => warn!(
                session_id = session_id,
                "First backend packet is not a handshake, forwarding unchanged"
            ),
        }

        Some(data.freeze())
    }
}

/// Relay one client connection through a filter session until either side closes
pub async fn run_session<C, B>(
    id: u32,
    instance: Arc<FilterInstance>,
    client: C,
    backend: B,
) -> Result<(), RelayError>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let mut client_packets = FramedRead::new(client_read, PacketCodec);
    let mut session = FilterSession::new(id, instance, Vec::new(), Vec::new());
    let mut greeting = GreetingRewriter::new();
    let mut read_buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
    let mut write_buf = BytesMut::new();

    loop {
        read_buf.reserve(READ_BUFFER_SIZE);

        tokio::select! {
            packet = client_packets.next() => {
                let packet = match packet {
                    Some(packet) => packet?,
                    None => {
                        info!(session_id = id, "Client disconnected");
                        let _ = backend_write.shutdown().await;
                        return Ok(());
                    }
                };

                session.route_query(packet);
                for packet in session.downstream_mut().drain(..) {
                    PacketCodec.encode(packet, &mut write_buf)?;
                }
                backend_write.write_all(&write_buf).await?;
                write_buf.clear();
            }
            read = backend_read.read_buf(&mut read_buf) => {
                if read? == 0 {
                    info!(session_id = id, diagnostics = %session.diagnostics(), "Backend disconnected");
                    let _ = client_write.shutdown().await;
                    return Ok(());
                }

                let chunk = match greeting.rewrite(id, read_buf.split().freeze()) {
                    Some(chunk) => chunk,
                    None => continue,
                };

                session.client_reply(chunk);
                for data in session.upstream_mut().drain(..) {
                    client_write.write_all(&data).await?;
                }
            }
        }
    }
}
