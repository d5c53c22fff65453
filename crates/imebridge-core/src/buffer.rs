use crate::error::{ImeError, Result};
use crate::types::{BufferShape, FieldKind};
use tracing::trace;

/// Storage for one composition or result field.
///
/// Text buffers hold UTF-16 code units. Clause and attribute buffers hold
/// their entries as metadata only, and their length is the entry count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionBuffer {
    field: FieldKind,
    units: Vec<u16>,
    text: String,
    metadata: Option<Vec<u32>>,
    stale: bool,
}

impl CompositionBuffer {
    pub fn new(field: FieldKind) -> Self {
        Self {
            field,
            units: Vec::new(),
            text: String::new(),
            metadata: None,
            stale: true,
        }
    }

    pub fn field(&self) -> FieldKind {
        self.field
    }

    pub fn shape(&self) -> BufferShape {
        self.field.shape()
    }

    /// Replaces the content with the decoded payload.
    ///
    /// Returns whether the content changed. The first refresh after a clear
    /// always counts as a change. On error the previous content is kept.
    pub fn refresh(&mut self, raw: &[u8]) -> Result<bool> {
        let (units, text, metadata) = match self.shape() {
            BufferShape::Text => decode_text(self.field, raw)?,
            BufferShape::Clause => decode_clauses(self.field, raw)?,
            BufferShape::Attribute => decode_attributes(raw),
        };

        let changed = self.stale || units != self.units || metadata != self.metadata;
        trace!(
            "Buffer {:?}: refreshed {} units, {} entries (changed={})",
            self.field,
            units.len(),
            metadata.as_ref().map_or(0, Vec::len),
            changed
        );
        if changed {
            self.units = units;
            self.text = text;
            self.metadata = metadata;
        }
        self.stale = false;
        Ok(changed)
    }

    pub fn clear(&mut self) {
        self.units.clear();
        self.text.clear();
        self.metadata = None;
        self.stale = true;
    }

    /// Metadata entry at `index`, which must lie inside the buffer.
    pub fn attribute_at(&self, index: usize) -> Result<u32> {
        let len = self.len();
        match &self.metadata {
            Some(meta) if index < len => Ok(meta[index]),
            _ => Err(ImeError::IndexOutOfRange { index, len }),
        }
    }

    /// Decoded text; empty for clause and attribute buffers.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    pub fn metadata(&self) -> Option<&[u32]> {
        self.metadata.as_deref()
    }

    /// Code units for text buffers, entries otherwise.
    pub fn len(&self) -> usize {
        match &self.metadata {
            Some(meta) => meta.len(),
            None => self.units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Converts a code-unit offset into a character count, clamped to the text.
    pub fn char_offset(&self, unit_offset: usize) -> usize {
        let end = unit_offset.min(self.units.len());
        char::decode_utf16(self.units[..end].iter().copied()).count()
    }
}

type Decoded = (Vec<u16>, String, Option<Vec<u32>>);

fn decode_text(field: FieldKind, raw: &[u8]) -> Result<Decoded> {
    if raw.len() % 2 != 0 {
        return Err(ImeError::decode(
            field,
            format!("odd byte length {} for UTF-16 text", raw.len()),
        ));
    }
    let text = encoding_rs::UTF_16LE
        .decode_without_bom_handling_and_without_replacement(raw)
        .ok_or_else(|| ImeError::decode(field, "malformed UTF-16"))?
        .into_owned();
    let units = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((units, text, None))
}

fn decode_clauses(field: FieldKind, raw: &[u8]) -> Result<Decoded> {
    if raw.len() % 4 != 0 {
        return Err(ImeError::decode(
            field,
            format!("clause payload length {} is not a multiple of 4", raw.len()),
        ));
    }
    let offsets = raw
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Ok((Vec::new(), String::new(), Some(offsets)))
}

fn decode_attributes(raw: &[u8]) -> Decoded {
    let metadata = raw.iter().map(|b| *b as u32).collect();
    (Vec::new(), String::new(), Some(metadata))
}
