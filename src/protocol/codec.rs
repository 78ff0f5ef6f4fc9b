use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use super::packet::Packet;

/// MySQL packet codec for use with tokio Framed
///
/// Frames are decoded one physical packet at a time; a command larger than
/// the maximum frame size arrives as several packets with increasing
/// sequence ids.
#[derive(Debug, Default)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Packet::decode(src))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_packets_from_one_read() {
        let mut codec = PacketCodec;
        let mut src = BytesMut::from(
            &[0x01, 0x00, 0x00, 0x00, 0x0e, 0x02, 0x00, 0x00, 0x00, 0x03, b'x'][..],
        );

        let ping = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(ping.kind(), Some(0x0e));

        let query = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(&query.payload[..], &[0x03, b'x']);

        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_encode_writes_header() {
        let mut codec = PacketCodec;
        let mut dst = BytesMut::new();
        codec.encode(Packet::new(3, vec![0x0e]), &mut dst).unwrap();
        assert_eq!(&dst[..], &[0x01, 0x00, 0x00, 0x03, 0x0e]);
    }
}
