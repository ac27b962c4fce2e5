//! # Replicast Serde
//! Bit-level stream serialization shared by every replicast peer.

mod bit_reader;
mod bit_writer;
mod error;
mod impls;
mod serde;

pub use bit_reader::{BitReader, OwnedBitReader};
pub use bit_writer::{BitWrite, BitWriter};
pub use error::SerdeErr;
pub use serde::Serde;
