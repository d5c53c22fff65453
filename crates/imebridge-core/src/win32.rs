use crate::candidate::CandidatePayload;
use crate::error::{ImeError, Result};
use crate::imm::{self, Dispatch};
use crate::source::NativeImeSource;
use crate::types::{Capabilities, FieldKind, InputRect, KeyCode, PayloadKind};
use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::Globalization::HIMC;
use windows::Win32::UI::Input::Ime::{
    ImmAssociateContext, ImmGetCandidateListW, ImmGetCompositionStringW, ImmGetContext,
    ImmReleaseContext, ImmSetCandidateWindow, CANDIDATEFORM, IME_COMPOSITION_STRING,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyboardLayout, VkKeyScanExW};

const CFS_CANDIDATEPOS: u32 = 0x0040;

/// IMM32 source for a single window.
///
/// The window procedure passes its messages through [`Win32Source::translate`]
/// and hands the resulting notification to the engine, which then pulls
/// composition state back through [`NativeImeSource`].
pub struct Win32Source {
    hwnd: HWND,
    /// Input context detached by `disassociate`, restored by `associate`.
    detached: HIMC,
    /// `GCS_*` flags of the last `WM_IME_COMPOSITION`.
    composition_flags: u32,
    show_default_window: bool,
}

impl Win32Source {
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd,
            detached: HIMC(0),
            composition_flags: 0,
            show_default_window: false,
        }
    }

    /// Classifies a window message; call from the window procedure.
    pub fn translate(&mut self, msg: u32, wparam: WPARAM, lparam: LPARAM) -> Dispatch {
        if msg == imm::WM_IME_COMPOSITION {
            self.composition_flags = lparam.0 as u32;
        }
        imm::translate_message(msg, wparam.0, lparam.0, self.show_default_window)
    }

    /// Runs `f` with the window's input context, releasing it afterwards.
    fn with_context<R>(&self, f: impl FnOnce(HIMC) -> Option<R>) -> Option<R> {
        unsafe {
            let himc = ImmGetContext(self.hwnd);
            if himc.0 == 0 {
                return None;
            }
            let out = f(himc);
            let _ = ImmReleaseContext(self.hwnd, himc);
            out
        }
    }

    fn read_composition(&self, gcs: u32) -> Option<Vec<u8>> {
        let index = IME_COMPOSITION_STRING(gcs);
        self.with_context(|himc| unsafe {
            let len = ImmGetCompositionStringW(himc, index, None, 0);
            if len < 0 {
                return None;
            }
            let mut buf = vec![0u8; len as usize];
            if len > 0 {
                let read = ImmGetCompositionStringW(
                    himc,
                    index,
                    Some(buf.as_mut_ptr() as *mut _),
                    len as u32,
                );
                if read < 0 {
                    return None;
                }
                buf.truncate(read as usize);
            }
            Some(buf)
        })
    }
}

impl NativeImeSource for Win32Source {
    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    fn associate(&mut self) -> Result<()> {
        let himc = if self.detached.0 != 0 {
            self.detached
        } else {
            unsafe { ImmGetContext(self.hwnd) }
        };
        if himc.0 == 0 {
            return Err(ImeError::NativeUnavailable(format!(
                "no input context for window {:?}",
                self.hwnd
            )));
        }
        unsafe {
            ImmAssociateContext(self.hwnd, himc);
            if self.detached.0 == 0 {
                let _ = ImmReleaseContext(self.hwnd, himc);
            }
        }
        self.detached = HIMC(0);
        debug!("Win32: context associated");
        Ok(())
    }

    fn disassociate(&mut self) -> Result<()> {
        let previous = unsafe { ImmAssociateContext(self.hwnd, HIMC(0)) };
        if previous.0 != 0 {
            self.detached = previous;
        }
        debug!("Win32: context detached");
        Ok(())
    }

    fn composition_payload(&mut self, kind: PayloadKind) -> Option<Vec<u8>> {
        if kind == PayloadKind::Field(FieldKind::CompositionText)
            && self.composition_flags & imm::GCS_COMPSTR == 0
        {
            return None;
        }
        let gcs = imm::gcs_index(kind)?;
        if kind == PayloadKind::CursorPosition {
            // The caret comes back as the return value, not in the buffer.
            return self.with_context(|himc| unsafe {
                let pos = ImmGetCompositionStringW(himc, IME_COMPOSITION_STRING(gcs), None, 0);
                (pos >= 0).then(|| (pos as u32).to_le_bytes().to_vec())
            });
        }
        self.read_composition(gcs)
    }

    fn candidate_payload(&mut self) -> Option<CandidatePayload> {
        let blob = self.with_context(|himc| unsafe {
            let len = ImmGetCandidateListW(himc, 0, None, 0);
            if len == 0 {
                return None;
            }
            let mut buf = vec![0u8; len as usize];
            let read = ImmGetCandidateListW(himc, 0, Some(buf.as_mut_ptr() as *mut _), len);
            buf.truncate(read as usize);
            Some(buf)
        })?;
        match imm::parse_candidate_list(&blob) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("Win32: {}", e);
                None
            }
        }
    }

    fn set_input_rect(&mut self, rect: InputRect) {
        let form = CANDIDATEFORM {
            dwIndex: 0,
            dwStyle: CFS_CANDIDATEPOS,
            ptCurrentPos: POINT {
                x: rect.x,
                y: rect.y,
            },
            rcArea: RECT::default(),
        };
        let _ = self.with_context(|himc| unsafe {
            let _ = ImmSetCandidateWindow(himc, &form);
            Some(())
        });
    }

    fn resolve_key(&mut self, ch: char) -> KeyCode {
        let mut units = [0u16; 2];
        let encoded = ch.encode_utf16(&mut units);
        if encoded.len() != 1 {
            return KeyCode::NONE;
        }
        let scan = unsafe { VkKeyScanExW(encoded[0], GetKeyboardLayout(0)) };
        if scan == -1 {
            return KeyCode::NONE;
        }
        KeyCode((scan as u16) & 0xFF)
    }

    fn set_default_window_visible(&mut self, visible: bool) {
        self.show_default_window = visible;
    }
}
