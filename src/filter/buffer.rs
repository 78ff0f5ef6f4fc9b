//! Reassembly buffer for the reply of the in-flight command
//!
//! Holds every reply byte received since the session was armed, plus a
//! cursor marking how much has been structurally consumed. All reads are
//! bounds-checked and report how many more bytes are needed instead of
//! reading past the end.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use crate::protocol::packet::{PacketHeader, PACKET_HEADER_SIZE};

/// Not enough bytes buffered for the next structural unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Need {needed} more bytes")]
pub struct Incomplete {
    pub needed: usize,
}

/// A complete packet at the cursor, borrowed from the buffer
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub header: PacketHeader,
    /// Header and payload
    pub bytes: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[PACKET_HEADER_SIZE..]
    }

    /// First payload byte, if the payload is not empty
    pub fn kind(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[derive(Debug, Default)]
pub struct ReplyBuffer {
    data: BytesMut,
    cursor: usize,
}

impl ReplyBuffer {
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Bytes currently held, consumed or not
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes after the cursor
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// `n` bytes starting `at` bytes past the cursor
    pub fn peek(&self, at: usize, n: usize) -> Result<&[u8], Incomplete> {
        let start = self.cursor + at;
        let end = start + n;
        if end > self.data.len() {
            return Err(Incomplete {
                needed: end - self.data.len(),
            });
        }
        Ok(&self.data[start..end])
    }

    /// Header of the packet at the cursor
    pub fn peek_header(&self) -> Result<PacketHeader, Incomplete> {
        let raw = self.peek(0, PACKET_HEADER_SIZE)?;
        PacketHeader::parse(raw).ok_or(Incomplete {
            needed: PACKET_HEADER_SIZE,
        })
    }

    /// The packet at the cursor, only if it is completely buffered
    pub fn peek_frame(&self) -> Result<FrameView<'_>, Incomplete> {
        let header = self.peek_header()?;
        let bytes = self.peek(0, header.packet_len())?;
        Ok(FrameView { header, bytes })
    }

    /// Move the cursor forward, never past the buffered bytes
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining(), "cursor advanced past buffered data");
        self.cursor = (self.cursor + n).min(self.data.len());
    }

    /// Split off everything before the cursor
    pub fn take_consumed(&mut self) -> Bytes {
        let consumed = self.data.split_to(self.cursor).freeze();
        self.cursor = 0;
        consumed
    }

    /// Split off the whole buffer, consumed or not
    pub fn take_all(&mut self) -> Bytes {
        self.cursor = 0;
        self.data.split().freeze()
    }

    /// Drop the consumed prefix without handing it to anyone
    pub fn release_consumed(&mut self) -> usize {
        let released = self.cursor;
        self.data.advance(released);
        self.cursor = 0;
        released
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.cursor = 0;
    }
}
