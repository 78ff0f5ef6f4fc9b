//! Resultset limiting filter
//!
//! One [`FilterSession`] sits between a client and its backend. Replies to
//! COM_QUERY and COM_STMT_EXECUTE are buffered until the resultset is
//! complete and then either forwarded unchanged or, when a row or byte
//! ceiling was crossed, replaced by an empty OK packet.

mod buffer;
mod instance;
mod limits;
mod session;
mod sink;
mod state;

#[cfg(test)]
mod testing;

pub use instance::{debug, FilterInstance};
pub use session::FilterSession;
