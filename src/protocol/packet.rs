use bytes::{Buf, BufMut, Bytes, BytesMut};

/// MySQL packet header size: 3 bytes length + 1 byte sequence
pub const PACKET_HEADER_SIZE: usize = 4;
/// Maximum packet payload size (16MB - 1)
pub const MAX_PACKET_SIZE: usize = 0xFF_FF_FF;

/// Packet type markers (first payload byte)
pub const OK_MARKER: u8 = 0x00;
pub const LOCAL_INFILE_MARKER: u8 = 0xFB;
pub const EOF_MARKER: u8 = 0xFE;
pub const ERR_MARKER: u8 = 0xFF;

/// Full size of an EOF packet including header: 0xFE, warnings(2), status(2)
pub const EOF_PACKET_LEN: usize = PACKET_HEADER_SIZE + 5;
/// Offset of the status flags inside an EOF packet, header included
pub const EOF_STATUS_FLAGS_OFFSET: usize = PACKET_HEADER_SIZE + 3;

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub payload_len: usize,
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Parse the 4 header bytes at the start of `buf`, None if fewer are available
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < PACKET_HEADER_SIZE {
            return None;
        }

        let payload_len = buf[0] as usize | ((buf[1] as usize) << 8) | ((buf[2] as usize) << 16);

        Some(Self {
            payload_len,
            sequence_id: buf[3],
        })
    }

    /// Header plus payload
    pub fn packet_len(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload_len
    }

    /// Whether the payload fills a whole frame and continues in the next one
    pub fn is_max_size(&self) -> bool {
        self.payload_len == MAX_PACKET_SIZE
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        let len = self.payload_len;
        dst.put_u8((len & 0xFF) as u8);
        dst.put_u8(((len >> 8) & 0xFF) as u8);
        dst.put_u8(((len >> 16) & 0xFF) as u8);
        dst.put_u8(self.sequence_id);
    }
}

/// MySQL wire protocol packet
#[derive(Debug, Clone)]
pub struct Packet {
    pub sequence_id: u8,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(sequence_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Encode packet to bytes (header + payload)
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(PACKET_HEADER_SIZE + self.payload.len());
        PacketHeader {
            payload_len: self.payload.len(),
            sequence_id: self.sequence_id,
        }
        .encode(dst);
        dst.extend_from_slice(&self.payload);
    }

    /// Encode into a standalone buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(PACKET_HEADER_SIZE + self.payload.len());
        self.encode(&mut dst);
        dst.freeze()
    }

    /// Try to decode packet from bytes, returns None if not enough data
    pub fn decode(src: &mut BytesMut) -> Option<Self> {
        let header = PacketHeader::parse(src)?;
        if src.len() < header.packet_len() {
            src.reserve(header.packet_len() - src.len());
            return None;
        }

        src.advance(PACKET_HEADER_SIZE);
        let payload = src.split_to(header.payload_len).freeze();

        Some(Self {
            sequence_id: header.sequence_id,
            payload,
        })
    }

    /// First payload byte, which identifies commands and response types
    pub fn kind(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

/// MySQL capability flags
#[allow(dead_code)]
pub mod capabilities {
    pub const CLIENT_LONG_PASSWORD: u32 = 1;
    pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
    pub const CLIENT_COMPRESS: u32 = 1 << 5;
    pub const CLIENT_LOCAL_FILES: u32 = 1 << 7;
    pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
    pub const CLIENT_SSL: u32 = 1 << 11;
    pub const CLIENT_TRANSACTIONS: u32 = 1 << 14;
    pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
    pub const CLIENT_MULTI_STATEMENTS: u32 = 1 << 16;
    pub const CLIENT_MULTI_RESULTS: u32 = 1 << 17;
    pub const CLIENT_PS_MULTI_RESULTS: u32 = 1 << 18;
    pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;
    pub const CLIENT_DEPRECATE_EOF: u32 = 1 << 24;

    /// Capabilities the relay hides from clients.
    ///
    /// The resultset parser depends on EOF terminators and on seeing
    /// uncompressed plaintext frames.
    pub const UNSUPPORTED_CAPABILITIES: u32 = CLIENT_DEPRECATE_EOF | CLIENT_SSL | CLIENT_COMPRESS;
}

/// Server status flags carried by OK and EOF packets
#[allow(dead_code)]
pub mod status {
    pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    pub const SERVER_MORE_RESULTS_EXIST: u16 = 0x0008;
    pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
}

/// MySQL command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Sleep = 0x00,
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    CreateDb = 0x05,
    DropDb = 0x06,
    Refresh = 0x07,
    Shutdown = 0x08,
    Statistics = 0x09,
    ProcessInfo = 0x0a,
    Connect = 0x0b,
    ProcessKill = 0x0c,
    Debug = 0x0d,
    Ping = 0x0e,
    Time = 0x0f,
    DelayedInsert = 0x10,
    ChangeUser = 0x11,
    BinlogDump = 0x12,
    TableDump = 0x13,
    ConnectOut = 0x14,
    RegisterSlave = 0x15,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtSendLongData = 0x18,
    StmtClose = 0x19,
    StmtReset = 0x1a,
    SetOption = 0x1b,
    StmtFetch = 0x1c,
    Daemon = 0x1d,
    BinlogDumpGtid = 0x1e,
    ResetConnection = 0x1f,
    Unknown = 0xff,
}

impl From<u8> for Command {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Command::Sleep,
            0x01 => Command::Quit,
            0x02 => Command::InitDb,
            0x03 => Command::Query,
            0x04 => Command::FieldList,
            0x05 => Command::CreateDb,
            0x06 => Command::DropDb,
            0x07 => Command::Refresh,
            0x08 => Command::Shutdown,
            0x09 => Command::Statistics,
            0x0a => Command::ProcessInfo,
            0x0b => Command::Connect,
            0x0c => Command::ProcessKill,
            0x0d => Command::Debug,
            0x0e => Command::Ping,
            0x0f => Command::Time,
            0x10 => Command::DelayedInsert,
            0x11 => Command::ChangeUser,
            0x12 => Command::BinlogDump,
            0x13 => Command::TableDump,
            0x14 => Command::ConnectOut,
            0x15 => Command::RegisterSlave,
            0x16 => Command::StmtPrepare,
            0x17 => Command::StmtExecute,
            0x18 => Command::StmtSendLongData,
            0x19 => Command::StmtClose,
            0x1a => Command::StmtReset,
            0x1b => Command::SetOption,
            0x1c => Command::StmtFetch,
            0x1d => Command::Daemon,
            0x1e => Command::BinlogDumpGtid,
            0x1f => Command::ResetConnection,
            _ => Command::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let header = PacketHeader::parse(&[0x05, 0x01, 0x00, 0x07, 0xAA]).unwrap();
        assert_eq!(header.payload_len, 0x0105);
        assert_eq!(header.sequence_id, 7);
        assert_eq!(header.packet_len(), 0x0109);
        assert!(!header.is_max_size());
    }

    #[test]
    fn test_header_needs_four_bytes() {
        assert!(PacketHeader::parse(&[0x01, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_header_max_size() {
        let header = PacketHeader::parse(&[0xFF, 0xFF, 0xFF, 0x02]).unwrap();
        assert_eq!(header.payload_len, MAX_PACKET_SIZE);
        assert!(header.is_max_size());
    }

    #[test]
    fn test_decode_waits_for_full_payload() {
        let mut buf = BytesMut::from(&[0x03, 0x00, 0x00, 0x00, 0x03, b'a'][..]);
        assert!(Packet::decode(&mut buf).is_none());
        assert_eq!(buf.len(), 6);

        buf.extend_from_slice(b"b");
        let packet = Packet::decode(&mut buf).unwrap();
        assert_eq!(packet.sequence_id, 0);
        assert_eq!(&packet.payload[..], &[0x03, b'a', b'b']);
        assert_eq!(packet.kind(), Some(0x03));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_matches_wire_bytes() {
        let raw = [0x02, 0x00, 0x00, 0x04, 0x0e, 0x01];
        let mut buf = BytesMut::from(&raw[..]);
        let packet = Packet::decode(&mut buf).unwrap();
        assert_eq!(&packet.to_bytes()[..], &raw[..]);
    }

    #[test]
    fn test_command_from_byte() {
        assert_eq!(Command::from(0x03), Command::Query);
        assert_eq!(Command::from(0x17), Command::StmtExecute);
        assert_eq!(Command::from(0x42), Command::Unknown);
    }
}
