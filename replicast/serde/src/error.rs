use thiserror::Error;

/// Errors that can occur while reading from a bit stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Attempted to read past the end of the buffer
    #[error("Bit stream exhausted: attempted to read past the end of the buffer")]
    BufferOverrun,

    /// The bits read do not form a valid value of the requested type
    #[error("Invalid encoded value for {type_name}")]
    InvalidValue { type_name: &'static str },
}
