use crate::candidate::CandidatePayload;
use crate::error::{ImeError, Result};
use crate::types::{Capabilities, FieldKind, InputRect, KeyCode, PayloadKind};
use std::collections::HashMap;

/// A platform IME the engine pulls composition state from.
///
/// Implementations only answer for what [`NativeImeSource::capabilities`]
/// advertises; the engine turns everything else into
/// [`ImeError::Unsupported`] before calling in.
pub trait NativeImeSource {
    fn capabilities(&self) -> Capabilities;

    /// Attaches the input context to the window.
    fn associate(&mut self) -> Result<()>;

    fn disassociate(&mut self) -> Result<()>;

    /// Raw bytes for one payload, or `None` when the IME has nothing for it.
    fn composition_payload(&mut self, kind: PayloadKind) -> Option<Vec<u8>>;

    fn candidate_payload(&mut self) -> Option<CandidatePayload>;

    fn set_input_rect(&mut self, rect: InputRect);

    fn resolve_key(&mut self, ch: char) -> KeyCode;

    /// Whether the platform's own composition/candidate UI should be drawn.
    fn set_default_window_visible(&mut self, _visible: bool) {}
}

impl<S: NativeImeSource + ?Sized> NativeImeSource for Box<S> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn associate(&mut self) -> Result<()> {
        (**self).associate()
    }

    fn disassociate(&mut self) -> Result<()> {
        (**self).disassociate()
    }

    fn composition_payload(&mut self, kind: PayloadKind) -> Option<Vec<u8>> {
        (**self).composition_payload(kind)
    }

    fn candidate_payload(&mut self) -> Option<CandidatePayload> {
        (**self).candidate_payload()
    }

    fn set_input_rect(&mut self, rect: InputRect) {
        (**self).set_input_rect(rect)
    }

    fn resolve_key(&mut self, ch: char) -> KeyCode {
        (**self).resolve_key(ch)
    }

    fn set_default_window_visible(&mut self, visible: bool) {
        (**self).set_default_window_visible(visible)
    }
}

/// In-memory source for push-style platforms.
///
/// Platform glue that receives composition state as events (text-editing
/// callbacks and the like) stores it here and then notifies the engine,
/// which pulls it back out like it would from a native context.
#[derive(Debug, Clone)]
pub struct BufferedSource {
    capabilities: Capabilities,
    payloads: HashMap<PayloadKind, Vec<u8>>,
    candidates: Option<CandidatePayload>,
    keys: HashMap<char, KeyCode>,
    available: bool,
    associated: bool,
    input_rect: Option<InputRect>,
    default_window_visible: bool,
}

impl Default for BufferedSource {
    fn default() -> Self {
        Self::new(Capabilities::all())
    }
}

impl BufferedSource {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            payloads: HashMap::new(),
            candidates: None,
            keys: HashMap::new(),
            available: true,
            associated: false,
            input_rect: None,
            default_window_visible: false,
        }
    }

    /// Makes `associate` fail, as when no input context can be acquired.
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn set_text(&mut self, field: FieldKind, text: &str) {
        let raw = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        self.payloads.insert(PayloadKind::Field(field), raw);
    }

    pub fn set_clauses(&mut self, field: FieldKind, offsets: &[u32]) {
        let raw = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        self.payloads.insert(PayloadKind::Field(field), raw);
    }

    pub fn set_attributes(&mut self, field: FieldKind, attributes: &[u8]) {
        self.payloads
            .insert(PayloadKind::Field(field), attributes.to_vec());
    }

    /// Caret offset in UTF-16 code units.
    pub fn set_cursor(&mut self, offset: u32) {
        self.payloads
            .insert(PayloadKind::CursorPosition, offset.to_le_bytes().to_vec());
    }

    pub fn set_raw(&mut self, kind: PayloadKind, raw: Vec<u8>) {
        self.payloads.insert(kind, raw);
    }

    pub fn remove(&mut self, kind: PayloadKind) {
        self.payloads.remove(&kind);
    }

    pub fn clear_payloads(&mut self) {
        self.payloads.clear();
    }

    pub fn set_candidates(&mut self, payload: Option<CandidatePayload>) {
        self.candidates = payload;
    }

    pub fn map_key(&mut self, ch: char, key: KeyCode) {
        self.keys.insert(ch, key);
    }

    pub fn is_associated(&self) -> bool {
        self.associated
    }

    pub fn input_rect(&self) -> Option<InputRect> {
        self.input_rect
    }

    pub fn default_window_visible(&self) -> bool {
        self.default_window_visible
    }
}

impl NativeImeSource for BufferedSource {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn associate(&mut self) -> Result<()> {
        if !self.available {
            return Err(ImeError::NativeUnavailable(
                "no input context for buffered source".to_string(),
            ));
        }
        self.associated = true;
        Ok(())
    }

    fn disassociate(&mut self) -> Result<()> {
        self.associated = false;
        Ok(())
    }

    fn composition_payload(&mut self, kind: PayloadKind) -> Option<Vec<u8>> {
        self.payloads.get(&kind).cloned()
    }

    fn candidate_payload(&mut self) -> Option<CandidatePayload> {
        self.candidates.clone()
    }

    fn set_input_rect(&mut self, rect: InputRect) {
        self.input_rect = Some(rect);
    }

    fn resolve_key(&mut self, ch: char) -> KeyCode {
        self.keys
            .get(&ch)
            .copied()
            .unwrap_or_else(|| KeyCode::for_ascii(ch))
    }

    fn set_default_window_visible(&mut self, visible: bool) {
        self.default_window_visible = visible;
    }
}
