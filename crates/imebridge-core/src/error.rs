use crate::types::{Capability, PayloadKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImeError {
    /// A raw native payload did not have the expected layout.
    #[error("cannot decode {kind:?} payload: {reason}")]
    Decode { kind: PayloadKind, reason: String },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The native source could not hand out an input context.
    #[error("native IME unavailable: {0}")]
    NativeUnavailable(String),

    #[error("{0:?} is not supported by this IME source")]
    Unsupported(Capability),
}

impl ImeError {
    pub(crate) fn decode(kind: impl Into<PayloadKind>, reason: impl Into<String>) -> Self {
        ImeError::Decode {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}
