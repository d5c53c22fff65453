use serde::{Deserialize, Serialize};

/// Buffered field of a composition or its finalized result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    CompositionText,
    CompositionClause,
    CompositionAttribute,
    CompositionReadingText,
    CompositionReadingClause,
    CompositionReadingAttribute,
    ResultText,
    ResultClause,
    ResultReadingText,
    ResultReadingClause,
}

impl FieldKind {
    /// In-progress composition fields, text first.
    pub const COMPOSITION: [FieldKind; 6] = [
        FieldKind::CompositionText,
        FieldKind::CompositionClause,
        FieldKind::CompositionAttribute,
        FieldKind::CompositionReadingText,
        FieldKind::CompositionReadingClause,
        FieldKind::CompositionReadingAttribute,
    ];

    /// Finalized result fields, text first.
    pub const RESULT: [FieldKind; 4] = [
        FieldKind::ResultText,
        FieldKind::ResultClause,
        FieldKind::ResultReadingText,
        FieldKind::ResultReadingClause,
    ];

    /// Every buffered field, in slot order.
    pub const ALL: [FieldKind; 10] = [
        FieldKind::CompositionText,
        FieldKind::CompositionClause,
        FieldKind::CompositionAttribute,
        FieldKind::CompositionReadingText,
        FieldKind::CompositionReadingClause,
        FieldKind::CompositionReadingAttribute,
        FieldKind::ResultText,
        FieldKind::ResultClause,
        FieldKind::ResultReadingText,
        FieldKind::ResultReadingClause,
    ];

    pub const COUNT: usize = 10;

    /// Stable slot used by the session's buffer table.
    pub const fn slot(self) -> usize {
        match self {
            FieldKind::CompositionText => 0,
            FieldKind::CompositionClause => 1,
            FieldKind::CompositionAttribute => 2,
            FieldKind::CompositionReadingText => 3,
            FieldKind::CompositionReadingClause => 4,
            FieldKind::CompositionReadingAttribute => 5,
            FieldKind::ResultText => 6,
            FieldKind::ResultClause => 7,
            FieldKind::ResultReadingText => 8,
            FieldKind::ResultReadingClause => 9,
        }
    }

    pub const fn shape(self) -> BufferShape {
        match self {
            FieldKind::CompositionText
            | FieldKind::CompositionReadingText
            | FieldKind::ResultText
            | FieldKind::ResultReadingText => BufferShape::Text,
            FieldKind::CompositionClause
            | FieldKind::CompositionReadingClause
            | FieldKind::ResultClause
            | FieldKind::ResultReadingClause => BufferShape::Clause,
            FieldKind::CompositionAttribute | FieldKind::CompositionReadingAttribute => {
                BufferShape::Attribute
            }
        }
    }

    pub const fn is_reading(self) -> bool {
        matches!(
            self,
            FieldKind::CompositionReadingText
                | FieldKind::CompositionReadingClause
                | FieldKind::CompositionReadingAttribute
                | FieldKind::ResultReadingText
                | FieldKind::ResultReadingClause
        )
    }

    pub const fn is_result(self) -> bool {
        matches!(
            self,
            FieldKind::ResultText
                | FieldKind::ResultClause
                | FieldKind::ResultReadingText
                | FieldKind::ResultReadingClause
        )
    }
}

/// Anything the session can request from a native source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Field(FieldKind),
    /// Caret offset inside the composition, in UTF-16 code units.
    CursorPosition,
    CandidateList,
}

impl From<FieldKind> for PayloadKind {
    fn from(field: FieldKind) -> Self {
        PayloadKind::Field(field)
    }
}

/// How a raw payload is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferShape {
    /// UTF-16LE code units.
    Text,
    /// Little-endian u32 clause boundary offsets.
    Clause,
    /// One attribute byte per composition code unit.
    Attribute,
}

/// Per-character classification reported by the IME.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositionAttribute {
    Input,
    TargetConverted,
    Converted,
    TargetNotConverted,
    InputError,
    FixedConverted,
    Other(u32),
}

impl CompositionAttribute {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Input,
            1 => Self::TargetConverted,
            2 => Self::Converted,
            3 => Self::TargetNotConverted,
            4 => Self::InputError,
            5 => Self::FixedConverted,
            other => Self::Other(other),
        }
    }

    pub const fn to_raw(self) -> u32 {
        match self {
            Self::Input => 0,
            Self::TargetConverted => 1,
            Self::Converted => 2,
            Self::TargetNotConverted => 3,
            Self::InputError => 4,
            Self::FixedConverted => 5,
            Self::Other(raw) => raw,
        }
    }
}

/// Screen-space rectangle hinting where the IME should place its windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl InputRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Platform virtual-key identifier attached to a committed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const NONE: KeyCode = KeyCode(0);
    pub const BACK: KeyCode = KeyCode(0x08);
    pub const TAB: KeyCode = KeyCode(0x09);
    pub const ENTER: KeyCode = KeyCode(0x0D);
    pub const ESCAPE: KeyCode = KeyCode(0x1B);
    pub const SPACE: KeyCode = KeyCode(0x20);

    /// Layout-independent guess for sources without a keyboard layout lookup.
    pub fn for_ascii(ch: char) -> KeyCode {
        match ch {
            '\u{8}' => Self::BACK,
            '\t' => Self::TAB,
            '\r' | '\n' => Self::ENTER,
            '\u{1b}' => Self::ESCAPE,
            ' ' => Self::SPACE,
            'a'..='z' => KeyCode(ch.to_ascii_uppercase() as u16),
            'A'..='Z' | '0'..='9' => KeyCode(ch as u16),
            _ => Self::NONE,
        }
    }
}

/// Optional platform features a native source may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Composition,
    Reading,
    Result,
    Candidates,
    InputRect,
}

/// The set of capabilities a native source implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub composition: bool,
    pub reading: bool,
    pub result: bool,
    pub candidates: bool,
    pub input_rect: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            composition: true,
            reading: true,
            result: true,
            candidates: true,
            input_rect: true,
        }
    }

    /// Only committed characters, as with plain text-input events.
    pub const fn text_input_only() -> Self {
        Self {
            composition: false,
            reading: false,
            result: false,
            candidates: false,
            input_rect: false,
        }
    }

    pub const fn contains(self, capability: Capability) -> bool {
        match capability {
            Capability::Composition => self.composition,
            Capability::Reading => self.reading,
            Capability::Result => self.result,
            Capability::Candidates => self.candidates,
            Capability::InputRect => self.input_rect,
        }
    }

    /// Capability a field accessor depends on, reading before result.
    pub const fn required_for(field: FieldKind) -> Capability {
        if field.is_reading() {
            Capability::Reading
        } else if field.is_result() {
            Capability::Result
        } else {
            Capability::Composition
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImeState {
    Idle,
    Enabled,
    Composing,
}

impl Default for ImeState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Signals raised by a native source, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    CompositionStart,
    CompositionUpdate,
    CompositionEnd,
    CandidateOpen,
    CandidateChange,
    CandidateClose,
    /// A single UTF-16 code unit from the platform's character message.
    CharacterInput(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_unique() {
        let mut seen = [false; FieldKind::COUNT];
        for field in FieldKind::COMPOSITION.iter().chain(FieldKind::RESULT.iter()) {
            assert!(!seen[field.slot()], "duplicate slot for {:?}", field);
            seen[field.slot()] = true;
        }
        assert!(seen.iter().all(|s| *s));
        for (i, field) in FieldKind::ALL.iter().enumerate() {
            assert_eq!(field.slot(), i);
        }
    }

    #[test]
    fn test_attribute_codes() {
        assert_eq!(CompositionAttribute::from_raw(0), CompositionAttribute::Input);
        assert_eq!(
            CompositionAttribute::from_raw(5),
            CompositionAttribute::FixedConverted
        );
        assert_eq!(
            CompositionAttribute::from_raw(9),
            CompositionAttribute::Other(9)
        );
        assert_eq!(CompositionAttribute::TargetConverted.to_raw(), 1);
    }

    #[test]
    fn test_key_code_for_ascii() {
        assert_eq!(KeyCode::for_ascii('a'), KeyCode(0x41));
        assert_eq!(KeyCode::for_ascii('7'), KeyCode(0x37));
        assert_eq!(KeyCode::for_ascii('\u{8}'), KeyCode::BACK);
        assert_eq!(KeyCode::for_ascii('\r'), KeyCode::ENTER);
        assert_eq!(KeyCode::for_ascii('你'), KeyCode::NONE);
    }

    #[test]
    fn test_required_capability() {
        assert_eq!(
            Capabilities::required_for(FieldKind::CompositionText),
            Capability::Composition
        );
        assert_eq!(
            Capabilities::required_for(FieldKind::ResultReadingText),
            Capability::Reading
        );
        assert_eq!(
            Capabilities::required_for(FieldKind::ResultClause),
            Capability::Result
        );
        assert!(!Capabilities::text_input_only().contains(Capability::Candidates));
    }
}
