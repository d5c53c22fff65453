use crate::buffer::CompositionBuffer;
use crate::candidate::CandidatePage;
use crate::config::ResultDelivery;
use crate::error::Result;
use crate::source::NativeImeSource;
use crate::types::{BufferShape, FieldKind, ImeState, KeyCode, Notification, PayloadKind};
use tracing::{debug, info, trace, warn};

/// Composition text, caret and (optionally) the candidate window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionChanged {
    pub text: String,
    /// Caret position in characters.
    pub cursor: usize,
    pub candidates: Option<CandidatePage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterCommitted {
    pub character: char,
    pub key: KeyCode,
}

/// Output decision of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImeEvent {
    CompositionChanged(CompositionChanged),
    CharacterCommitted(CharacterCommitted),
}

/// Composition state machine over one buffer per field and the candidate page.
///
/// Each handler runs to completion before returning its events, so every
/// emitted event reflects settled buffers.
#[derive(Debug, Clone)]
pub struct ImeSession {
    state: ImeState,
    buffers: [CompositionBuffer; FieldKind::COUNT],
    cursor: usize,
    candidates: CandidatePage,
    result_delivery: ResultDelivery,
}

impl Default for ImeSession {
    fn default() -> Self {
        Self::new(ResultDelivery::default())
    }
}

impl ImeSession {
    pub fn new(result_delivery: ResultDelivery) -> Self {
        Self {
            state: ImeState::Idle,
            buffers: FieldKind::ALL.map(CompositionBuffer::new),
            cursor: 0,
            candidates: CandidatePage::new(),
            result_delivery,
        }
    }

    pub fn state(&self) -> ImeState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state != ImeState::Idle
    }

    pub fn buffer(&self, field: FieldKind) -> &CompositionBuffer {
        &self.buffers[field.slot()]
    }

    pub fn text(&self, field: FieldKind) -> &str {
        self.buffer(field).text()
    }

    pub fn composition(&self) -> &str {
        self.text(FieldKind::CompositionText)
    }

    pub fn result(&self) -> &str {
        self.text(FieldKind::ResultText)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn candidates(&self) -> &CandidatePage {
        &self.candidates
    }

    pub fn result_delivery(&self) -> ResultDelivery {
        self.result_delivery
    }

    /// `Idle -> Enabled`. Leaves the state untouched if association fails.
    pub fn enable<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        if self.state != ImeState::Idle {
            debug!("Session: enable ignored, already {:?}", self.state);
            return Ok(());
        }
        source.associate()?;
        self.state = ImeState::Enabled;
        info!("Session: enabled");
        Ok(())
    }

    /// Back to `Idle` from any state, discarding everything in flight.
    pub fn disable<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) {
        if self.state == ImeState::Idle {
            return;
        }
        if let Err(e) = source.disassociate() {
            warn!("Session: disassociate failed: {}", e);
        }
        self.clear_composition();
        self.clear_result();
        self.candidates.reset();
        self.state = ImeState::Idle;
        info!("Session: disabled");
    }

    /// Routes a notification to its transition.
    pub fn handle<S: NativeImeSource + ?Sized>(
        &mut self,
        notification: Notification,
        source: &mut S,
    ) -> Vec<ImeEvent> {
        debug!("Session: {:?} in {:?}", notification, self.state);
        match notification {
            Notification::CompositionStart => self.composition_start(),
            Notification::CompositionUpdate => self.composition_update(source),
            Notification::CompositionEnd => self.composition_end(source),
            Notification::CandidateOpen | Notification::CandidateChange => {
                self.candidate_change(source)
            }
            Notification::CandidateClose => self.candidate_close(),
            Notification::CharacterInput(raw) => self.character_input(raw, source),
        }
    }

    pub fn composition_start(&mut self) -> Vec<ImeEvent> {
        if self.state == ImeState::Idle {
            debug!("Session: composition start while idle, ignored");
            return Vec::new();
        }
        self.clear_composition();
        self.clear_result();
        self.candidates.reset();
        self.state = ImeState::Composing;
        vec![self.changed(String::new(), 0, None)]
    }

    pub fn composition_update<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) -> Vec<ImeEvent> {
        if self.state != ImeState::Composing {
            debug!("Session: composition update outside a composition, ignored");
            return Vec::new();
        }
        if !self.refresh_field(source, FieldKind::CompositionText) {
            return Vec::new();
        }
        for field in &FieldKind::COMPOSITION[1..] {
            self.refresh_field(source, *field);
        }
        self.align_attributes(FieldKind::CompositionAttribute, FieldKind::CompositionText);
        self.align_attributes(
            FieldKind::CompositionReadingAttribute,
            FieldKind::CompositionReadingText,
        );
        self.refresh_cursor(source);

        let text = self.composition().to_string();
        vec![self.changed(text, self.cursor, None)]
    }

    pub fn composition_end<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) -> Vec<ImeEvent> {
        if self.state != ImeState::Composing {
            debug!("Session: composition end outside a composition, ignored");
            return Vec::new();
        }
        self.clear_composition();
        self.state = ImeState::Enabled;

        let mut events = Vec::new();
        if !self.refresh_field(source, FieldKind::ResultText) {
            return events;
        }
        for field in &FieldKind::RESULT[1..] {
            self.refresh_field(source, *field);
        }
        events.push(self.changed(String::new(), 0, None));

        if self.result_delivery == ResultDelivery::Synthesized {
            let result = self.result().to_string();
            for character in result.chars() {
                let key = source.resolve_key(character);
                events.push(ImeEvent::CharacterCommitted(CharacterCommitted { character, key }));
            }
        }
        events
    }

    pub fn candidate_change<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) -> Vec<ImeEvent> {
        if self.state == ImeState::Idle {
            debug!("Session: candidate change while idle, ignored");
            return Vec::new();
        }
        match source.candidate_payload() {
            None => {
                debug!("Session: no candidate list available");
                Vec::new()
            }
            Some(payload) if payload.count > 1 => {
                self.candidates.replace(
                    payload.items,
                    payload.page_start,
                    payload.page_size,
                    payload.selection,
                );
                let text = self.composition().to_string();
                vec![self.changed(text, self.cursor, Some(self.candidates.clone()))]
            }
            Some(_) => self.candidate_close(),
        }
    }

    pub fn candidate_close(&mut self) -> Vec<ImeEvent> {
        if self.state == ImeState::Idle {
            return Vec::new();
        }
        self.candidates.reset();
        let text = self.composition().to_string();
        vec![self.changed(text, self.cursor, None)]
    }

    /// A character from the platform's character message.
    ///
    /// Surrogate halves are dropped; this engine does not pair them up.
    pub fn character_input<S: NativeImeSource + ?Sized>(
        &mut self,
        raw: u16,
        source: &mut S,
    ) -> Vec<ImeEvent> {
        let character = match char::from_u32(raw as u32) {
            Some(c) => c,
            None => {
                debug!("Session: dropped surrogate code unit {:#06X}", raw);
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        if self.state == ImeState::Enabled && !self.candidates.is_empty() {
            events.extend(self.candidate_close());
        }
        let key = source.resolve_key(character);
        events.push(ImeEvent::CharacterCommitted(CharacterCommitted { character, key }));
        events
    }

    /// Hands out the finalized result and clears the result buffers.
    pub fn take_result(&mut self) -> Option<String> {
        if self.buffer(FieldKind::ResultText).is_empty() {
            return None;
        }
        let result = self.result().to_string();
        self.clear_result();
        Some(result)
    }

    fn changed(&self, text: String, cursor: usize, candidates: Option<CandidatePage>) -> ImeEvent {
        ImeEvent::CompositionChanged(CompositionChanged {
            text,
            cursor,
            candidates,
        })
    }

    fn refresh_field<S: NativeImeSource + ?Sized>(&mut self, source: &mut S, field: FieldKind) -> bool {
        let raw = match source.composition_payload(field.into()) {
            Some(raw) => raw,
            None => {
                trace!("Session: {:?} not available", field);
                // Attributes only describe the text they arrived with.
                if field.shape() == BufferShape::Attribute {
                    self.buffers[field.slot()].clear();
                }
                return false;
            }
        };
        match self.buffers[field.slot()].refresh(&raw) {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Session: keeping previous {:?}: {}", field, e);
                false
            }
        }
    }

    /// Drops attributes whose length no longer matches their text.
    fn align_attributes(&mut self, attributes: FieldKind, text: FieldKind) {
        let expected = self.buffer(text).len();
        let buffer = &mut self.buffers[attributes.slot()];
        if !buffer.is_empty() && buffer.len() != expected {
            warn!(
                "Session: dropping {:?}, {} entries for {} code units",
                attributes,
                buffer.len(),
                expected
            );
            buffer.clear();
        }
    }

    fn refresh_cursor<S: NativeImeSource + ?Sized>(&mut self, source: &mut S) {
        let text = self.buffer(FieldKind::CompositionText);
        let max = text.char_offset(text.len());
        match source.composition_payload(PayloadKind::CursorPosition) {
            Some(raw) if raw.len() == 4 => {
                let offset = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                self.cursor = text.char_offset(offset as usize);
            }
            Some(raw) => {
                warn!(
                    "Session: keeping previous cursor, payload has {} bytes",
                    raw.len()
                );
                self.cursor = self.cursor.min(max);
            }
            None => self.cursor = self.cursor.min(max),
        }
    }

    fn clear_composition(&mut self) {
        for field in FieldKind::COMPOSITION {
            self.buffers[field.slot()].clear();
        }
        self.cursor = 0;
    }

    fn clear_result(&mut self) {
        for field in FieldKind::RESULT {
            self.buffers[field.slot()].clear();
        }
    }
}
