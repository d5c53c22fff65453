pub mod buffer;
pub mod candidate;
pub mod config;
pub mod engine;
pub mod error;
pub mod imm;
pub mod session;
pub mod source;
pub mod types;
#[cfg(windows)]
pub mod win32;

pub use candidate::{CandidatePage, CandidatePayload};
pub use config::{load_config, ImeConfig, ResultDelivery};
pub use engine::ImeEngine;
pub use error::{ImeError, Result};
pub use session::{CharacterCommitted, CompositionChanged, ImeEvent, ImeSession};
pub use source::{BufferedSource, NativeImeSource};
pub use types::{
    Capabilities, Capability, CompositionAttribute, FieldKind, ImeState, InputRect, KeyCode,
    Notification, PayloadKind,
};
