use bytes::Bytes;

use crate::protocol::Packet;

/// Backend-facing side of a filter session
pub trait Downstream {
    fn route_query(&mut self, packet: Packet);
}

/// Client-facing side of a filter session
pub trait Upstream {
    fn client_reply(&mut self, data: Bytes);
}

/// Outbox collecting packets until the owner writes them out
impl Downstream for Vec<Packet> {
    fn route_query(&mut self, packet: Packet) {
        self.push(packet);
    }
}

impl Upstream for Vec<Bytes> {
    fn client_reply(&mut self, data: Bytes) {
        self.push(data);
    }
}
