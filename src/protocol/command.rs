use super::packet::{Command, Packet};

/// How the filter treats the reply to a client packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// COM_QUERY or COM_STMT_EXECUTE: the reply may be a resultset worth counting
    Counted(Command),
    /// Any other command; its reply is forwarded without inspection
    Uncounted(Command),
    /// Not the start of a command (sequence id > 0): LOCAL INFILE data or the
    /// tail of a command split over several frames
    Continuation,
}

impl ClientCommand {
    /// Classify a packet sent by the client
    pub fn classify(packet: &Packet) -> Self {
        if packet.sequence_id != 0 {
            return ClientCommand::Continuation;
        }

        let cmd = match packet.kind() {
            Some(byte) => Command::from(byte),
            None => return ClientCommand::Continuation,
        };

        match cmd {
            Command::Query | Command::StmtExecute => ClientCommand::Counted(cmd),
            _ => ClientCommand::Uncounted(cmd),
        }
    }

    /// Whether this packet arms the session for a new reply
    pub fn starts_command(&self) -> bool {
        !matches!(self, ClientCommand::Continuation)
    }

    pub fn is_counted(&self) -> bool {
        matches!(self, ClientCommand::Counted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_and_execute_are_counted() {
        let query = Packet::new(0, &b"\x03SELECT 1"[..]);
        assert_eq!(ClientCommand::classify(&query), ClientCommand::Counted(Command::Query));

        let execute = Packet::new(0, vec![0x17, 1, 0, 0, 0, 0, 1, 0, 0, 0]);
        assert!(ClientCommand::classify(&execute).is_counted());
    }

    #[test]
    fn test_other_commands_are_uncounted() {
        for byte in [0x0e, 0x02, 0x16, 0x04] {
            let cmd = ClientCommand::classify(&Packet::new(0, vec![byte]));
            assert!(cmd.starts_command());
            assert!(!cmd.is_counted());
        }
    }

    #[test]
    fn test_non_zero_sequence_is_continuation() {
        let infile_data = Packet::new(2, &b"\x03not a query"[..]);
        assert_eq!(ClientCommand::classify(&infile_data), ClientCommand::Continuation);

        let empty = Packet::new(0, Vec::new());
        assert!(!ClientCommand::classify(&empty).starts_command());
    }
}
