use crate::candidate::CandidatePayload;
use crate::error::{ImeError, Result};
use crate::types::{FieldKind, Notification, PayloadKind};
use tracing::debug;

pub const WM_CHAR: u32 = 0x0102;
pub const WM_IME_STARTCOMPOSITION: u32 = 0x010D;
pub const WM_IME_ENDCOMPOSITION: u32 = 0x010E;
pub const WM_IME_COMPOSITION: u32 = 0x010F;
pub const WM_IME_SETCONTEXT: u32 = 0x0281;
pub const WM_IME_NOTIFY: u32 = 0x0282;
pub const WM_INPUTLANGCHANGE: u32 = 0x0051;

pub const IMN_CHANGECANDIDATE: usize = 0x0003;
pub const IMN_CLOSECANDIDATE: usize = 0x0004;
pub const IMN_OPENCANDIDATE: usize = 0x0005;

pub const GCS_COMPREADSTR: u32 = 0x0001;
pub const GCS_COMPREADATTR: u32 = 0x0002;
pub const GCS_COMPREADCLAUSE: u32 = 0x0004;
pub const GCS_COMPSTR: u32 = 0x0008;
pub const GCS_COMPATTR: u32 = 0x0010;
pub const GCS_COMPCLAUSE: u32 = 0x0020;
pub const GCS_CURSORPOS: u32 = 0x0080;
pub const GCS_RESULTREADSTR: u32 = 0x0200;
pub const GCS_RESULTREADCLAUSE: u32 = 0x0400;
pub const GCS_RESULTSTR: u32 = 0x0800;
pub const GCS_RESULTCLAUSE: u32 = 0x1000;

/// Size of the fixed `CANDIDATELIST` header preceding the offset table.
const CANDIDATE_HEADER_LEN: usize = 24;

/// `GCS_*` index for a payload.
pub const fn gcs_index(kind: PayloadKind) -> Option<u32> {
    match kind {
        PayloadKind::Field(field) => Some(match field {
            FieldKind::CompositionText => GCS_COMPSTR,
            FieldKind::CompositionClause => GCS_COMPCLAUSE,
            FieldKind::CompositionAttribute => GCS_COMPATTR,
            FieldKind::CompositionReadingText => GCS_COMPREADSTR,
            FieldKind::CompositionReadingClause => GCS_COMPREADCLAUSE,
            FieldKind::CompositionReadingAttribute => GCS_COMPREADATTR,
            FieldKind::ResultText => GCS_RESULTSTR,
            FieldKind::ResultClause => GCS_RESULTCLAUSE,
            FieldKind::ResultReadingText => GCS_RESULTREADSTR,
            FieldKind::ResultReadingClause => GCS_RESULTREADCLAUSE,
        }),
        PayloadKind::CursorPosition => Some(GCS_CURSORPOS),
        PayloadKind::CandidateList => None,
    }
}

/// What to do with one window message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub notification: Option<Notification>,
    /// Whether the message still goes to the default window procedure.
    pub forward: bool,
    /// Replacement lParam for the default window procedure.
    pub lparam: isize,
}

/// Maps an IME window message onto a notification.
///
/// With `show_default_window == false` the default IME UI is suppressed by
/// swallowing the messages that would draw it.
pub fn translate_message(msg: u32, wparam: usize, lparam: isize, show_default_window: bool) -> Dispatch {
    let pass = Dispatch {
        notification: None,
        forward: true,
        lparam,
    };
    match msg {
        WM_IME_SETCONTEXT => {
            if wparam == 1 && !show_default_window {
                Dispatch { lparam: 0, ..pass }
            } else {
                pass
            }
        }
        WM_INPUTLANGCHANGE => Dispatch {
            forward: false,
            ..pass
        },
        WM_IME_NOTIFY => {
            let notification = match wparam {
                IMN_OPENCANDIDATE => Some(Notification::CandidateOpen),
                IMN_CHANGECANDIDATE => Some(Notification::CandidateChange),
                IMN_CLOSECANDIDATE => Some(Notification::CandidateClose),
                _ => None,
            };
            Dispatch {
                notification,
                forward: show_default_window,
                lparam,
            }
        }
        WM_IME_STARTCOMPOSITION => Dispatch {
            notification: Some(Notification::CompositionStart),
            forward: false,
            lparam,
        },
        WM_IME_COMPOSITION => Dispatch {
            notification: Some(Notification::CompositionUpdate),
            ..pass
        },
        WM_IME_ENDCOMPOSITION => Dispatch {
            notification: Some(Notification::CompositionEnd),
            forward: show_default_window,
            lparam,
        },
        WM_CHAR => Dispatch {
            notification: Some(Notification::CharacterInput(wparam as u16)),
            ..pass
        },
        _ => pass,
    }
}

/// Decodes a `CANDIDATELIST` blob as returned by `ImmGetCandidateListW`.
pub fn parse_candidate_list(blob: &[u8]) -> Result<CandidatePayload> {
    let kind = PayloadKind::CandidateList;
    if blob.len() < CANDIDATE_HEADER_LEN {
        return Err(ImeError::decode(
            kind,
            format!("blob of {} bytes is shorter than the header", blob.len()),
        ));
    }

    let size = (read_u32(blob, 0) as usize).min(blob.len());
    let count = read_u32(blob, 8);
    let selection = read_u32(blob, 12);
    let page_start = read_u32(blob, 16);
    let page_size = read_u32(blob, 20);

    let table_end = (count as usize)
        .checked_mul(4)
        .and_then(|n| n.checked_add(CANDIDATE_HEADER_LEN))
        .filter(|end| *end <= size)
        .ok_or_else(|| ImeError::decode(kind, format!("offset table for {} items overruns blob", count)))?;

    let mut items = Vec::with_capacity(count as usize);
    for entry in (CANDIDATE_HEADER_LEN..table_end).step_by(4) {
        let offset = read_u32(blob, entry) as usize;
        items.push(read_wide_string(&blob[..size], offset)?);
    }

    debug!(
        "CANDIDATELIST: count={} selection={} page_start={} page_size={}",
        count, selection, page_start, page_size
    );

    Ok(CandidatePayload {
        items,
        page_start,
        page_size,
        selection,
        count,
    })
}

fn read_u32(blob: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([blob[at], blob[at + 1], blob[at + 2], blob[at + 3]])
}

/// NUL-terminated UTF-16LE string starting at `offset`.
fn read_wide_string(blob: &[u8], offset: usize) -> Result<String> {
    let kind = PayloadKind::CandidateList;
    if offset >= blob.len() {
        return Err(ImeError::decode(kind, format!("string offset {} outside blob", offset)));
    }
    let tail = &blob[offset..];
    let end = tail
        .chunks_exact(2)
        .position(|pair| pair == [0, 0])
        .ok_or_else(|| ImeError::decode(kind, format!("unterminated string at offset {}", offset)))?;
    encoding_rs::UTF_16LE
        .decode_without_bom_handling_and_without_replacement(&tail[..end * 2])
        .map(|s| s.into_owned())
        .ok_or_else(|| ImeError::decode(kind, format!("malformed UTF-16 at offset {}", offset)))
}

/// Builds a `CANDIDATELIST` blob. Used by tests and in-memory sources.
pub fn encode_candidate_list(payload: &CandidatePayload) -> Vec<u8> {
    let table_end = CANDIDATE_HEADER_LEN + 4 * payload.items.len();
    let mut strings = Vec::new();
    let mut offsets = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        offsets.push((table_end + strings.len()) as u32);
        strings.extend(item.encode_utf16().flat_map(|u| u.to_le_bytes()));
        strings.extend_from_slice(&[0, 0]);
    }

    let size = (table_end + strings.len()) as u32;
    let mut blob = Vec::with_capacity(size as usize);
    for value in [
        size,
        0, // dwStyle
        payload.count,
        payload.selection,
        payload.page_start,
        payload.page_size,
    ] {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    for offset in offsets {
        blob.extend_from_slice(&offset.to_le_bytes());
    }
    blob.extend_from_slice(&strings);
    blob
}
