//! Resultset state machine
//!
//! Reply bytes are appended to a [`ReplyBuffer`] and parsed from the saved
//! cursor every time a delivery arrives. Each state has one handler that
//! either pauses (`Step::NeedMore`) or names the next state, in which case
//! the driver loop runs that state's handler on the same delivery.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::buffer::ReplyBuffer;
use super::instance::FilterInstance;
use super::limits::LimitExceeded;
use crate::metrics::metrics;
use crate::protocol::lenenc::read_lenenc_int;
use crate::protocol::packet::{
    status, EOF_MARKER, EOF_PACKET_LEN, EOF_STATUS_FLAGS_OFFSET, ERR_MARKER, LOCAL_INFILE_MARKER,
    OK_MARKER,
};
use crate::protocol::{ClientCommand, OkPacket};

/// Log at info when the instance's debug mask asks for it, at debug otherwise
macro_rules! notice {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// A query was sent, waiting for the first packet of the reply
    ExpectingResponse,
    /// Column definitions follow, terminated by EOF
    ExpectingFields,
    /// Rows follow, terminated by EOF or ERR
    ExpectingRows,
    /// The reply is complete; nothing should arrive until the next command
    ExpectingNothing,
    /// Reply is forwarded as-is without counting
    IgnoringResponse,
}

impl State {
    /// Whether limits are being enforced in this state
    pub fn is_counting(&self) -> bool {
        matches!(
            self,
            State::ExpectingResponse | State::ExpectingFields | State::ExpectingRows
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::ExpectingResponse => "expecting_response",
            State::ExpectingFields => "expecting_fields",
            State::ExpectingRows => "expecting_rows",
            State::ExpectingNothing => "expecting_nothing",
            State::IgnoringResponse => "ignoring_response",
        };
        f.write_str(name)
    }
}

/// Outcome of running one state handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Not enough buffered bytes; resume from the cursor on the next delivery
    NeedMore,
    /// Switch state and keep parsing the same delivery
    Next(State),
}

/// Bytes handed to the client side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A completed resultset, byte-for-byte as received
    Resultset(Bytes),
    /// The empty OK standing in for a discarded resultset
    Replacement(Bytes),
    /// Bytes forwarded without being counted
    Forwarded(Bytes),
}

impl Reply {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Reply::Resultset(bytes) | Reply::Replacement(bytes) | Reply::Forwarded(bytes) => bytes,
        }
    }
}

/// Reply buffer plus structural counters
#[derive(Debug, Default)]
pub struct Response {
    pub buffer: ReplyBuffer,
    /// Column count announced by the current resultset header
    pub fields_total: u64,
    /// Column definitions consumed so far
    pub fields_seen: u64,
    /// Logical rows across every resultset of the reply
    pub rows_seen: u64,
    /// Reply bytes received since arming, including released ones
    pub bytes_seen: u64,
}

impl Response {
    fn reset(&mut self) {
        self.buffer.clear();
        self.fields_total = 0;
        self.fields_seen = 0;
        self.rows_seen = 0;
        self.bytes_seen = 0;
    }
}

/// Per-session parse state; the session owns exactly one
#[derive(Debug)]
pub struct ResultsetParser {
    session_id: u32,
    instance: Arc<FilterInstance>,
    state: State,
    response: Response,
    large_frame_pending: bool,
    discard: bool,
}

impl ResultsetParser {
    /// Start out forwarding, so the greeting and authentication exchange
    /// that precede the first command pass straight through
    pub fn new(session_id: u32, instance: Arc<FilterInstance>) -> Self {
        Self {
            session_id,
            instance,
            state: State::IgnoringResponse,
            response: Response::default(),
            large_frame_pending: false,
            discard: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn is_discarding(&self) -> bool {
        self.discard
    }

    pub fn large_frame_pending(&self) -> bool {
        self.large_frame_pending
    }

    /// Prepare for the reply to a new command
    pub fn arm(&mut self, command: ClientCommand) {
        if !self.response.buffer.is_empty() {
            warn!(
                filter = self.instance.name(),
                session_id = self.session_id,
                state = %self.state,
                buffered = self.response.buffer.len(),
                "New command while a reply was still buffered, dropping it"
            );
        }

        self.response.reset();
        self.large_frame_pending = false;
        self.discard = false;
        self.state = if command.is_counted() {
            State::ExpectingResponse
        } else {
            State::IgnoringResponse
        };

        debug!(
            filter = self.instance.name(),
            session_id = self.session_id,
            command = ?command,
            state = %self.state,
            "Armed"
        );
    }

    /// Process one reply delivery, appending whatever should reach the client to `out`
    pub fn on_reply(&mut self, chunk: Bytes, out: &mut Vec<Reply>) {
        if chunk.is_empty() {
            return;
        }

        // Nothing to parse and nothing held back: hand the delivery over as-is
        if !self.state.is_counting() && self.response.buffer.is_empty() {
            if self.state == State::ExpectingNothing {
                self.unexpected_data(chunk.len());
            }
            out.push(Reply::Forwarded(chunk));
            return;
        }

        self.response.buffer.append(&chunk);
        self.response.bytes_seen += chunk.len() as u64;

        if self.state.is_counting() && !self.discard {
            if let Some(exceeded) = self
                .instance
                .limits()
                .check_bytes(self.response.buffer.len())
            {
                self.start_discarding(exceeded);
            }
        }

        self.drive(out);

        // A discarded reply is never emitted, so parsed bytes can go now
        if self.discard && self.state.is_counting() {
            self.response.buffer.release_consumed();
        }
    }

    fn drive(&mut self, out: &mut Vec<Reply>) {
        loop {
            let step = match self.state {
                State::ExpectingResponse => self.handle_expecting_response(out),
                State::ExpectingFields => self.handle_expecting_fields(out),
                State::ExpectingRows => self.handle_rows(out),
                State::ExpectingNothing => self.handle_expecting_nothing(out),
                State::IgnoringResponse => self.handle_ignoring_response(out),
            };

            match step {
                Step::NeedMore => return,
                Step::Next(state) => self.state = state,
            }
        }
    }

    fn handle_expecting_response(&mut self, out: &mut Vec<Reply>) -> Step {
        let (kind, len, field_count) = match self.response.buffer.peek_frame() {
            Ok(frame) => (
                frame.kind(),
                frame.len(),
                read_lenenc_int(frame.payload()),
            ),
            Err(_) => return Step::NeedMore,
        };

        match kind {
            Some(OK_MARKER) | Some(ERR_MARKER) => {
                self.response.buffer.advance(len);

                notice!(
                    self.instance.logs_decisions(),
                    filter = self.instance.name(),
                    session_id = self.session_id,
                    rows = self.response.rows_seen,
                    discarded = self.discard,
                    "OK or ERR seen"
                );

                if self.discard {
                    self.emit_replacement(out);
                    Step::Next(State::ExpectingNothing)
                } else {
                    self.emit_resultset(out);
                    Step::Next(State::IgnoringResponse)
                }
            }
            Some(LOCAL_INFILE_MARKER) => {
                notice!(
                    self.instance.logs_decisions(),
                    filter = self.instance.name(),
                    session_id = self.session_id,
                    "LOCAL INFILE request, forwarding reply"
                );
                self.forward_buffered(out);
                Step::Next(State::IgnoringResponse)
            }
            _ => match field_count {
                Ok((fields, _)) => {
                    self.response.buffer.advance(len);
                    self.response.fields_total = fields;
                    self.response.fields_seen = 0;

                    notice!(
                        self.instance.logs_decisions(),
                        filter = self.instance.name(),
                        session_id = self.session_id,
                        fields = fields,
                        "Resultset header seen"
                    );
                    Step::Next(State::ExpectingFields)
                }
                Err(e) => {
                    error!(
                        filter = self.instance.name(),
                        session_id = self.session_id,
                        error = %e,
                        "Malformed resultset header, forwarding reply unparsed"
                    );
                    metrics().record_protocol_error("malformed_length");
                    self.abandon(out);
                    Step::Next(State::IgnoringResponse)
                }
            },
        }
    }

    fn handle_expecting_fields(&mut self, out: &mut Vec<Reply>) -> Step {
        loop {
            let (kind, len, flags) = match self.response.buffer.peek_frame() {
                Ok(frame) => (frame.kind(), frame.len(), eof_status_flags(frame.bytes)),
                Err(_) => return Step::NeedMore,
            };

            self.response.buffer.advance(len);

            if kind == Some(EOF_MARKER) {
                // A cursor was opened: rows only follow a COM_STMT_FETCH
                if flags.unwrap_or(0) & status::SERVER_STATUS_CURSOR_EXISTS != 0 {
                    notice!(
                        self.instance.logs_decisions(),
                        filter = self.instance.name(),
                        session_id = self.session_id,
                        fields = self.response.fields_seen,
                        "Cursor opened, returning column definitions"
                    );
                    return Step::Next(self.finish(out));
                }
                return Step::Next(State::ExpectingRows);
            }

            self.response.fields_seen += 1;
            if self.response.fields_seen > self.response.fields_total {
                warn!(
                    filter = self.instance.name(),
                    session_id = self.session_id,
                    fields_seen = self.response.fields_seen,
                    fields_total = self.response.fields_total,
                    "More column definitions than announced"
                );
            }
        }
    }

    fn handle_rows(&mut self, out: &mut Vec<Reply>) -> Step {
        loop {
            let (header, kind, flags) = match self.response.buffer.peek_frame() {
                Ok(frame) => (frame.header, frame.kind(), eof_status_flags(frame.bytes)),
                Err(_) => return Step::NeedMore,
            };

            self.response.buffer.advance(header.packet_len());

            // Inside a row split over maximal frames the payload is opaque
            if self.large_frame_pending {
                if !header.is_max_size() {
                    self.large_frame_pending = false;
                    self.count_row();
                }
                continue;
            }

            if header.is_max_size() {
                self.large_frame_pending = true;
                continue;
            }

            match kind {
                Some(ERR_MARKER) => {
                    notice!(
                        self.instance.logs_decisions(),
                        filter = self.instance.name(),
                        session_id = self.session_id,
                        rows = self.response.rows_seen,
                        discarded = self.discard,
                        "Error packet seen while handling resultset"
                    );
                    return Step::Next(self.finish(out));
                }
                Some(EOF_MARKER) => {
                    let flags = match flags {
                        Some(flags) if header.packet_len() >= EOF_PACKET_LEN => flags,
                        _ => {
                            error!(
                                filter = self.instance.name(),
                                session_id = self.session_id,
                                size = header.packet_len(),
                                expected = EOF_PACKET_LEN,
                                "Truncated EOF packet, replacing reply with OK"
                            );
                            metrics().record_protocol_error("truncated_eof");
                            self.emit_replacement(out);
                            return Step::Next(State::ExpectingNothing);
                        }
                    };

                    if flags & status::SERVER_MORE_RESULTS_EXIST != 0 {
                        notice!(
                            self.instance.logs_decisions(),
                            filter = self.instance.name(),
                            session_id = self.session_id,
                            rows = self.response.rows_seen,
                            "EOF with more results, waiting for next resultset"
                        );
                        self.response.fields_total = 0;
                        self.response.fields_seen = 0;
                        return Step::Next(State::ExpectingResponse);
                    }

                    notice!(
                        self.instance.logs_decisions(),
                        filter = self.instance.name(),
                        session_id = self.session_id,
                        rows = self.response.rows_seen,
                        discarded = self.discard,
                        "Final EOF seen"
                    );
                    return Step::Next(self.finish(out));
                }
                _ => self.count_row(),
            }
        }
    }

    fn handle_expecting_nothing(&mut self, out: &mut Vec<Reply>) -> Step {
        if !self.response.buffer.is_empty() {
            self.unexpected_data(self.response.buffer.len());
            self.forward_buffered(out);
        }
        Step::NeedMore
    }

    fn handle_ignoring_response(&mut self, out: &mut Vec<Reply>) -> Step {
        if !self.response.buffer.is_empty() {
            self.forward_buffered(out);
        }
        Step::NeedMore
    }

    fn count_row(&mut self) {
        self.response.rows_seen += 1;

        if !self.discard {
            if let Some(exceeded) = self.instance.limits().check_rows(self.response.rows_seen) {
                self.start_discarding(exceeded);
            }
        }
    }

    fn start_discarding(&mut self, exceeded: LimitExceeded) {
        self.discard = true;
        metrics().record_discard(exceeded.reason());

        notice!(
            self.instance.logs_discarding(),
            filter = self.instance.name(),
            session_id = self.session_id,
            reason = %exceeded,
            "Resultset limit reached, not returning the resultset"
        );
    }

    /// Emit the decision for a completed reply
    fn finish(&mut self, out: &mut Vec<Reply>) -> State {
        if self.discard {
            self.emit_replacement(out);
        } else {
            self.emit_resultset(out);
        }
        State::ExpectingNothing
    }

    fn emit_resultset(&mut self, out: &mut Vec<Reply>) {
        let bytes = self.response.buffer.take_consumed();
        metrics().record_decision("passed", self.response.rows_seen);
        out.push(Reply::Resultset(bytes));
    }

    fn emit_replacement(&mut self, out: &mut Vec<Reply>) {
        self.response.buffer.take_consumed();
        metrics().record_decision("discarded", self.response.rows_seen);
        out.push(Reply::Replacement(OkPacket::replacement()));
    }

    fn forward_buffered(&mut self, out: &mut Vec<Reply>) {
        out.push(Reply::Forwarded(self.response.buffer.take_all()));
    }

    /// Give up on parsing this reply
    fn abandon(&mut self, out: &mut Vec<Reply>) {
        if self.discard {
            // Part of the reply may already be released; an OK keeps the
            // client in step
            self.response.buffer.clear();
            out.push(Reply::Replacement(OkPacket::replacement()));
        } else {
            self.forward_buffered(out);
        }
        self.large_frame_pending = false;
    }

    fn unexpected_data(&self, len: usize) {
        error!(
            filter = self.instance.name(),
            session_id = self.session_id,
            bytes = len,
            "Received data from the backend although none was expected, forwarding it"
        );
        metrics().record_protocol_error("unexpected_data");
    }
}

/// Status flags of an EOF packet, None if the frame is too short to carry them
fn eof_status_flags(frame: &[u8]) -> Option<u16> {
    frame
        .get(EOF_STATUS_FLAGS_OFFSET..EOF_STATUS_FLAGS_OFFSET + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
}
