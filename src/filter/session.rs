use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::instance::FilterInstance;
use super::sink::{Downstream, Upstream};
use super::state::{ResultsetParser, State};
use crate::metrics::metrics;
use crate::protocol::{ClientCommand, Packet};

/// Filter state for one client connection
///
/// Both the request path (`route_query`) and the reply path
/// (`client_reply`) take `&mut self`, so a session is only ever driven
/// from the task that owns it.
pub struct FilterSession<D, U> {
    id: u32,
    parser: ResultsetParser,
    downstream: D,
    upstream: U,
}

impl<D: Downstream, U: Upstream> FilterSession<D, U> {
    pub fn new(id: u32, instance: Arc<FilterInstance>, downstream: D, upstream: U) -> Self {
        Self {
            id,
            parser: ResultsetParser::new(id, instance),
            downstream,
            upstream,
        }
    }

    /// Client packet on its way to the backend
    pub fn route_query(&mut self, packet: Packet) {
        let command = ClientCommand::classify(&packet);
        if command.starts_command() {
            metrics().record_command(command.is_counted());
            self.parser.arm(command);
        }
        self.downstream.route_query(packet);
    }

    /// Backend bytes on their way to the client
    pub fn client_reply(&mut self, chunk: Bytes) {
        let mut replies = Vec::new();
        self.parser.on_reply(chunk, &mut replies);
        for reply in replies {
            self.upstream.client_reply(reply.into_bytes());
        }
    }

    pub fn downstream_mut(&mut self) -> &mut D {
        &mut self.downstream
    }

    pub fn upstream_mut(&mut self) -> &mut U {
        &mut self.upstream
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        let response = self.parser.response();
        SessionDiagnostics {
            session_id: self.id,
            state: self.parser.state(),
            fields_total: response.fields_total,
            fields_seen: response.fields_seen,
            rows_seen: response.rows_seen,
            bytes_seen: response.bytes_seen,
            buffered: response.buffer.len(),
            large_frame_pending: self.parser.large_frame_pending(),
            discard: self.parser.is_discarding(),
        }
    }
}

/// Snapshot of a session's parse state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDiagnostics {
    pub session_id: u32,
    pub state: State,
    pub fields_total: u64,
    pub fields_seen: u64,
    pub rows_seen: u64,
    pub bytes_seen: u64,
    pub buffered: usize,
    pub large_frame_pending: bool,
    pub discard: bool,
}

impl fmt::Display for SessionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "session {}: state={} fields={}/{} rows={} bytes={} buffered={}",
            self.session_id,
            self.state,
            self.fields_seen,
            self.fields_total,
            self.rows_seen,
            self.bytes_seen,
            self.buffered
        )?;
        if self.large_frame_pending {
            f.write_str(" [large packet]")?;
        }
        if self.discard {
            f.write_str(" [discarding]")?;
        }
        Ok(())
    }
}
