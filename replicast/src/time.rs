use replicast_serde::{BitReader, BitWrite, Serde, SerdeErr};

/// Millisecond clock value as carried on the wire: four bytes, wrapping.
///
/// The engine never reads a system clock itself; the application supplies the
/// current instant to [`tick`](crate::ReplicaManager::tick) and to the
/// immediate operations that stamp wire timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WireInstant {
    millis: u32,
}

impl WireInstant {
    pub const ZERO: WireInstant = WireInstant { millis: 0 };

    pub fn from_millis(millis: u32) -> Self {
        Self { millis }
    }

    pub fn as_millis(&self) -> u32 {
        self.millis
    }

    pub fn add_millis(&self, millis: u32) -> Self {
        Self {
            millis: self.millis.wrapping_add(millis),
        }
    }

    /// Signed millisecond distance from `earlier` to `self`, shortest way
    /// around the wrap.
    pub fn offset_from(&self, earlier: &Self) -> i32 {
        self.millis.wrapping_sub(earlier.millis) as i32
    }
}

impl Serde for WireInstant {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.millis.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            millis: u32::de(reader)?,
        })
    }
}
