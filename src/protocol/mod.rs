pub mod codec;
pub mod command;
pub mod handshake;
pub mod lenenc;
pub mod packet;
pub mod response;

pub use codec::PacketCodec;
pub use command::ClientCommand;
pub use handshake::{mask_server_capabilities, ServerGreeting};
pub use packet::{capabilities, Packet, PacketHeader};
pub use response::OkPacket;
