use std::net::SocketAddr;

/// Delivery discipline requested for an outgoing packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendMode {
    ReliableOrdered,
    UnreliableSequenced,
}

/// Outgoing half of the datagram transport the engine is layered on.
///
/// The engine shares the peer with other subsystems, so every send names the
/// channel it was configured with; the transport owns reliability, fragmenting
/// and congestion.
pub trait PacketSender {
    fn send(&mut self, address: &SocketAddr, channel: u8, mode: SendMode, payload: &[u8]);
}

/// Targeting for a command: a single participant, every participant, or every
/// participant except one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recipients {
    To(SocketAddr),
    Broadcast,
    BroadcastExcept(SocketAddr),
}

impl Recipients {
    pub(crate) fn includes(&self, address: &SocketAddr) -> bool {
        match self {
            Recipients::To(target) => target == address,
            Recipients::Broadcast => true,
            Recipients::BroadcastExcept(excluded) => excluded != address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{}", port).parse().unwrap()
    }

    #[test]
    fn recipients_targeting() {
        let a = addr(9000);
        let b = addr(9001);

        assert!(Recipients::To(a).includes(&a));
        assert!(!Recipients::To(a).includes(&b));

        assert!(Recipients::Broadcast.includes(&a));
        assert!(Recipients::Broadcast.includes(&b));

        assert!(!Recipients::BroadcastExcept(a).includes(&a));
        assert!(Recipients::BroadcastExcept(a).includes(&b));
    }
}
