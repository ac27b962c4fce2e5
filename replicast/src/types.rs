use replicast_serde::{BitReader, BitWrite, Serde, SerdeErr};

/// Application-assigned identifier naming a replica across peers.
///
/// The engine never generates these; assignment order is the application's
/// concern, and commands issued against a replica before its identifier
/// exists are simply deferred until one does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(u32);

impl NetworkId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Serde for NetworkId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self(u32::de(reader)?))
    }
}
