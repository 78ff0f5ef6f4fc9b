use bytes::{BufMut, Bytes, BytesMut};

use super::lenenc::write_lenenc_int;
use super::packet::{status, Packet, OK_MARKER};

/// OK packet
#[derive(Debug, Clone)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
}

impl OkPacket {
    pub fn new() -> Self {
        Self {
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: status::SERVER_STATUS_AUTOCOMMIT,
            warnings: 0,
        }
    }

    /// Encode as a protocol 4.1 OK packet
    pub fn encode(&self, sequence_id: u8) -> Packet {
        let mut buf = BytesMut::with_capacity(7);

        buf.put_u8(OK_MARKER);
        write_lenenc_int(&mut buf, self.affected_rows);
        write_lenenc_int(&mut buf, self.last_insert_id);
        buf.put_u16_le(self.status_flags);
        buf.put_u16_le(self.warnings);

        Packet::new(sequence_id, buf.freeze())
    }

    /// The empty OK sent in place of a discarded resultset.
    ///
    /// Sequence id 1 is what a client expects for the first reply packet
    /// to a command.
    pub fn replacement() -> Bytes {
        Self::new().encode(1).to_bytes()
    }
}

impl Default for OkPacket {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replacement_wire_bytes() {
        let ok = OkPacket::replacement();
        assert_eq!(
            &ok[..],
            &[0x07, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_encode_wide_affected_rows() {
        let ok = OkPacket {
            affected_rows: 300,
            ..OkPacket::new()
        };
        let packet = ok.encode(5);
        assert_eq!(packet.sequence_id, 5);
        assert_eq!(&packet.payload[..4], &[0x00, 0xFC, 0x2C, 0x01]);
        assert_eq!(packet.payload.len(), 9);
    }
}
