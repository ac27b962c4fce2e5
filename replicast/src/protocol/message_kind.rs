/// The five wire message kinds, carried as a one-byte tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// An object exists on the sender and should exist on the receiver
    Construction,
    /// The sender tore the object down
    Destruction,
    /// The object's per-participant visibility flipped
    ScopeChange,
    /// A whole-object state snapshot
    Serialize,
    /// End of the sender's initial construction burst
    DownloadComplete,
}

impl MessageKind {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            MessageKind::Construction => 0,
            MessageKind::Destruction => 1,
            MessageKind::ScopeChange => 2,
            MessageKind::Serialize => 3,
            MessageKind::DownloadComplete => 4,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MessageKind::Construction),
            1 => Some(MessageKind::Destruction),
            2 => Some(MessageKind::ScopeChange),
            3 => Some(MessageKind::Serialize),
            4 => Some(MessageKind::DownloadComplete),
            _ => None,
        }
    }
}
