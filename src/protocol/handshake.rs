use bytes::Buf;

/// Fields of the server's initial handshake the relay cares about
#[derive(Debug, Clone)]
pub struct ServerGreeting {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub capability_flags: u32,
}

/// Byte offsets of the two capability halves inside a greeting payload
#[derive(Debug, Clone, Copy)]
struct CapabilityOffsets {
    lower: usize,
    upper: Option<usize>,
}

/// The only handshake version the relay rewrites
const PROTOCOL_VERSION: u8 = 10;

fn capability_offsets(payload: &[u8]) -> Option<CapabilityOffsets> {
    if payload.first() != Some(&PROTOCOL_VERSION) {
        return None;
    }
    // protocol version, then null-terminated server version
    let null_pos = payload.get(1..)?.iter().position(|&b| b == 0)?;
    // connection id (4), auth data part 1 (8), filler (1)
    let lower = 1 + null_pos + 1 + 4 + 8 + 1;
    if payload.len() < lower + 2 {
        return None;
    }

    // charset (1), status flags (2)
    let upper = lower + 2 + 1 + 2;
    let upper = (payload.len() >= upper + 2).then_some(upper);

    Some(CapabilityOffsets { lower, upper })
}

impl ServerGreeting {
    /// Parse from packet payload
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let offsets = capability_offsets(payload)?;

        let mut buf = payload;
        let protocol_version = buf.get_u8();

        let null_pos = buf.iter().position(|&b| b == 0)?;
        let server_version = String::from_utf8_lossy(&buf[..null_pos]).to_string();
        buf.advance(null_pos + 1);

        let connection_id = buf.get_u32_le();

        let lower = u16::from_le_bytes([payload[offsets.lower], payload[offsets.lower + 1]]) as u32;
        let upper = offsets
            .upper
            .map(|at| u16::from_le_bytes([payload[at], payload[at + 1]]) as u32)
            .unwrap_or(0);

        Some(Self {
            protocol_version,
            server_version,
            connection_id,
            capability_flags: lower | (upper << 16),
        })
    }
}

/// Clear `mask` from the capability flags of a greeting payload in place.
///
/// Returns the resulting flags, or None if the payload is not a greeting
/// this function understands (left untouched in that case).
pub fn mask_server_capabilities(payload: &mut [u8], mask: u32) -> Option<u32> {
    let offsets = capability_offsets(payload)?;

    let lower_at = offsets.lower;
    let lower = u16::from_le_bytes([payload[lower_at], payload[lower_at + 1]]) & !(mask as u16);
    payload[lower_at..lower_at + 2].copy_from_slice(&lower.to_le_bytes());

    let mut flags = lower as u32;
    if let Some(upper_at) = offsets.upper {
        let upper =
            u16::from_le_bytes([payload[upper_at], payload[upper_at + 1]]) & !((mask >> 16) as u16);
        payload[upper_at..upper_at + 2].copy_from_slice(&upper.to_le_bytes());
        flags |= (upper as u32) << 16;
    }

    Some(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::capabilities::*;
    use bytes::BufMut;

    fn greeting_payload(capabilities: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.put_u8(10);
        buf.extend_from_slice(b"8.0.36\0");
        buf.put_u32_le(42);
        buf.extend_from_slice(&[1u8; 8]);
        buf.put_u8(0);
        buf.put_u16_le((capabilities & 0xFFFF) as u16);
        buf.put_u8(0x21);
        buf.put_u16_le(0x0002);
        buf.put_u16_le((capabilities >> 16) as u16);
        buf.put_u8(21);
        buf.extend_from_slice(&[0u8; 10]);
        buf.extend_from_slice(&[2u8; 12]);
        buf.put_u8(0);
        buf.extend_from_slice(b"mysql_native_password\0");
        buf
    }

    #[test]
    fn test_parse_greeting() {
        let caps = CLIENT_PROTOCOL_41 | CLIENT_DEPRECATE_EOF | CLIENT_PLUGIN_AUTH;
        let greeting = ServerGreeting::parse(&greeting_payload(caps)).unwrap();
        assert_eq!(greeting.protocol_version, 10);
        assert_eq!(greeting.server_version, "8.0.36");
        assert_eq!(greeting.connection_id, 42);
        assert_eq!(greeting.capability_flags, caps);
    }

    #[test]
    fn test_mask_clears_only_requested_bits() {
        let caps = CLIENT_PROTOCOL_41 | CLIENT_SSL | CLIENT_DEPRECATE_EOF | CLIENT_MULTI_RESULTS;
        let mut payload = greeting_payload(caps);
        let original = payload.clone();

        let masked = mask_server_capabilities(&mut payload, UNSUPPORTED_CAPABILITIES).unwrap();
        assert_eq!(masked, CLIENT_PROTOCOL_41 | CLIENT_MULTI_RESULTS);
        assert_eq!(ServerGreeting::parse(&payload).unwrap().capability_flags, masked);

        // Everything except the two capability words is preserved
        let diffs = payload
            .iter()
            .zip(original.iter())
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(diffs, 2);
        assert_eq!(payload.len(), original.len());
    }

    #[test]
    fn test_mask_rejects_garbage() {
        let mut payload = vec![0xFF, 0x15, 0x04];
        assert!(mask_server_capabilities(&mut payload, UNSUPPORTED_CAPABILITIES).is_none());
        assert_eq!(payload, vec![0xFF, 0x15, 0x04]);
    }
}
