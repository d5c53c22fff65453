use crate::types::InputRect;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info, warn};

/// How the characters of a finalized result reach the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultDelivery {
    /// The platform follows the result with its own character messages.
    CharacterInput,
    /// The engine commits each result character itself on composition end.
    Synthesized,
}

impl Default for ResultDelivery {
    fn default() -> Self {
        Self::CharacterInput
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImeConfig {
    /// Let the OS draw its own composition and candidate windows.
    pub show_default_ime_window: bool,
    pub result_delivery: ResultDelivery,
    /// Input hint applied whenever the IME gets enabled.
    pub input_rect: Option<InputRect>,
}

impl Default for ImeConfig {
    fn default() -> Self {
        Self {
            show_default_ime_window: false,
            result_delivery: ResultDelivery::CharacterInput,
            input_rect: None,
        }
    }
}

impl ImeConfig {
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid IME config")
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ImeConfig> {
    let path = path.as_ref();
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = decode_config_bytes(&raw);
    let config = ImeConfig::from_json_str(text.as_ref())?;
    info!("Config: loaded {}", path.display());
    Ok(config)
}

fn decode_config_bytes(raw: &[u8]) -> Cow<'_, str> {
    if let Some((enc, bom_len)) = encoding_rs::Encoding::for_bom(raw) {
        debug!("Config decoded using BOM: {}", enc.name());
        let (cow, _, had_errors) = enc.decode(&raw[bom_len..]);
        if had_errors {
            warn!("Config decode had errors (replacement characters used)");
        }
        return cow;
    }

    let (cow, had_errors) = encoding_rs::UTF_8.decode_without_bom_handling(raw);
    if had_errors {
        warn!("Config is not valid UTF-8 (replacement characters used)");
    }
    cow
}
