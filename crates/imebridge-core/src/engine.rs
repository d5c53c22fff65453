use crate::candidate::CandidatePage;
use crate::config::ImeConfig;
use crate::error::{ImeError, Result};
use crate::session::{CharacterCommitted, CompositionChanged, ImeEvent, ImeSession};
use crate::source::NativeImeSource;
use crate::types::{
    Capabilities, Capability, CompositionAttribute, FieldKind, ImeState, InputRect, Notification,
};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info};

type CompositionListener = Arc<dyn Fn(&CompositionChanged) + Send + Sync>;
type CommitListener = Arc<dyn Fn(&CharacterCommitted) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    composition: Vec<CompositionListener>,
    committed: Vec<CommitListener>,
    channels: Vec<Sender<ImeEvent>>,
}

/// Consumer-facing composition engine over one native source.
///
/// Transitions run with the session write-locked; listeners are only called
/// after the lock is released, so they may read the engine or call back into
/// it (to move the input hint, for instance).
pub struct ImeEngine<S: NativeImeSource> {
    source: Mutex<S>,
    session: RwLock<ImeSession>,
    capabilities: Capabilities,
    config: ImeConfig,
    input_rect: Mutex<Option<InputRect>>,
    listeners: Mutex<Listeners>,
}

impl<S: NativeImeSource> ImeEngine<S> {
    pub fn new(mut source: S, config: ImeConfig) -> Self {
        source.set_default_window_visible(config.show_default_ime_window);
        let capabilities = source.capabilities();
        info!(
            "Engine: created (default window={}, delivery={:?})",
            config.show_default_ime_window, config.result_delivery
        );
        Self {
            source: Mutex::new(source),
            session: RwLock::new(ImeSession::new(config.result_delivery)),
            capabilities,
            input_rect: Mutex::new(config.input_rect),
            config,
            listeners: Mutex::new(Listeners::default()),
        }
    }

    pub fn config(&self) -> &ImeConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn enabled(&self) -> bool {
        self.session.read().is_enabled()
    }

    pub fn state(&self) -> ImeState {
        self.session.read().state()
    }

    /// Enables the IME for the window. No-op if it already is.
    pub fn start_composition(&self) -> Result<()> {
        let mut source = self.source.lock();
        let mut session = self.session.write();
        if session.is_enabled() {
            return Ok(());
        }
        session.enable(&mut *source)?;
        if self.capabilities.input_rect {
            if let Some(rect) = *self.input_rect.lock() {
                source.set_input_rect(rect);
            }
        }
        Ok(())
    }

    /// Disables the IME and drops any composition in progress without
    /// emitting a final event.
    pub fn stop_composition(&self) {
        let mut source = self.source.lock();
        self.session.write().disable(&mut *source);
    }

    /// Remembers the hint and forwards it while the IME is enabled.
    pub fn set_input_hint(&self, rect: InputRect) -> Result<()> {
        self.require(Capability::InputRect)?;
        *self.input_rect.lock() = Some(rect);
        if !self.enabled() {
            debug!("Engine: input hint stored, IME disabled");
            return Ok(());
        }
        self.source.lock().set_input_rect(rect);
        Ok(())
    }

    pub fn input_hint(&self) -> Option<InputRect> {
        *self.input_rect.lock()
    }

    /// Feeds one native notification through the session and dispatches the
    /// resulting events.
    pub fn notify(&self, notification: Notification) {
        let events = {
            let mut source = self.source.lock();
            let mut session = self.session.write();
            session.handle(notification, &mut *source)
        };
        self.dispatch(events);
    }

    /// Direct access to the source, for platform glue that pushes payloads
    /// before notifying. The source stays locked while `f` runs, so `f` must
    /// not call back into the engine.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.source.lock())
    }

    pub fn composition(&self) -> Result<String> {
        self.field_text(FieldKind::CompositionText)
    }

    pub fn composition_clause(&self) -> Result<Vec<u32>> {
        self.field_metadata(FieldKind::CompositionClause)
    }

    pub fn composition_reading(&self) -> Result<String> {
        self.field_text(FieldKind::CompositionReadingText)
    }

    pub fn composition_reading_clause(&self) -> Result<Vec<u32>> {
        self.field_metadata(FieldKind::CompositionReadingClause)
    }

    /// Caret position in characters.
    pub fn cursor_position(&self) -> Result<usize> {
        self.require(Capability::Composition)?;
        Ok(self.session.read().cursor())
    }

    pub fn result(&self) -> Result<String> {
        self.field_text(FieldKind::ResultText)
    }

    pub fn result_clause(&self) -> Result<Vec<u32>> {
        self.field_metadata(FieldKind::ResultClause)
    }

    pub fn result_reading(&self) -> Result<String> {
        self.field_text(FieldKind::ResultReadingText)
    }

    pub fn result_reading_clause(&self) -> Result<Vec<u32>> {
        self.field_metadata(FieldKind::ResultReadingClause)
    }

    /// Takes the finalized result, clearing the result fields.
    pub fn take_result(&self) -> Result<Option<String>> {
        self.require(Capability::Result)?;
        Ok(self.session.write().take_result())
    }

    pub fn attribute_at(&self, index: usize) -> Result<CompositionAttribute> {
        self.attribute(FieldKind::CompositionAttribute, FieldKind::CompositionText, index)
    }

    pub fn read_attribute_at(&self, index: usize) -> Result<CompositionAttribute> {
        self.attribute(
            FieldKind::CompositionReadingAttribute,
            FieldKind::CompositionReadingText,
            index,
        )
    }

    pub fn candidates(&self) -> Result<CandidatePage> {
        self.require(Capability::Candidates)?;
        Ok(self.session.read().candidates().clone())
    }

    /// Settled copy of the whole session.
    pub fn snapshot(&self) -> ImeSession {
        self.session.read().clone()
    }

    pub fn on_composition_changed(&self, cb: impl Fn(&CompositionChanged) + Send + Sync + 'static) {
        self.listeners.lock().composition.push(Arc::new(cb));
    }

    pub fn on_character_committed(&self, cb: impl Fn(&CharacterCommitted) + Send + Sync + 'static) {
        self.listeners.lock().committed.push(Arc::new(cb));
    }

    /// Receiver fed with every event, for consumers on another thread.
    pub fn subscribe(&self) -> Receiver<ImeEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.lock().channels.push(tx);
        rx
    }

    fn dispatch(&self, events: Vec<ImeEvent>) {
        if events.is_empty() {
            return;
        }
        let (composition, committed) = {
            let mut listeners = self.listeners.lock();
            listeners
                .channels
                .retain(|tx| events.iter().all(|ev| tx.send(ev.clone()).is_ok()));
            (listeners.composition.clone(), listeners.committed.clone())
        };

        for event in &events {
            match event {
                ImeEvent::CompositionChanged(changed) => {
                    for cb in &composition {
                        cb(changed);
                    }
                }
                ImeEvent::CharacterCommitted(ch) => {
                    for cb in &committed {
                        cb(ch);
                    }
                }
            }
        }
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(ImeError::Unsupported(capability))
        }
    }

    fn field_text(&self, field: FieldKind) -> Result<String> {
        self.require(Capabilities::required_for(field))?;
        Ok(self.session.read().text(field).to_string())
    }

    fn field_metadata(&self, field: FieldKind) -> Result<Vec<u32>> {
        self.require(Capabilities::required_for(field))?;
        let session = self.session.read();
        Ok(session
            .buffer(field)
            .metadata()
            .map(<[u32]>::to_vec)
            .unwrap_or_default())
    }

    /// Attribute of the code unit at `index` of `text`.
    fn attribute(&self, field: FieldKind, text: FieldKind, index: usize) -> Result<CompositionAttribute> {
        self.require(Capabilities::required_for(field))?;
        let session = self.session.read();
        let len = session.buffer(text).len();
        if index >= len {
            return Err(ImeError::IndexOutOfRange { index, len });
        }
        let raw = session.buffer(field).attribute_at(index)?;
        Ok(CompositionAttribute::from_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidatePayload;
    use crate::config::ResultDelivery;
    use crate::source::BufferedSource;

    fn engine() -> ImeEngine<BufferedSource> {
        ImeEngine::new(BufferedSource::default(), ImeConfig::default())
    }

    #[test]
    fn test_start_and_stop() {
        let engine = engine();
        assert!(!engine.enabled());
        engine.start_composition().unwrap();
        assert!(engine.enabled());
        assert!(engine.with_source(|s| s.is_associated()));

        engine.stop_composition();
        assert!(!engine.enabled());
        assert_eq!(engine.state(), ImeState::Idle);
    }

    #[test]
    fn test_start_failure_leaves_engine_idle() {
        let mut src = BufferedSource::default();
        src.set_available(false);
        let engine = ImeEngine::new(src, ImeConfig::default());
        assert!(matches!(
            engine.start_composition(),
            Err(ImeError::NativeUnavailable(_))
        ));
        assert_eq!(engine.state(), ImeState::Idle);
    }

    #[test]
    fn test_default_window_flag_is_forwarded() {
        let config = ImeConfig {
            show_default_ime_window: true,
            ..ImeConfig::default()
        };
        let engine = ImeEngine::new(BufferedSource::default(), config);
        assert!(engine.with_source(|s| s.default_window_visible()));
    }

    #[test]
    fn test_input_hint_only_forwarded_while_enabled() {
        let engine = engine();
        let rect = InputRect::new(10, 50, 0, 0);
        engine.set_input_hint(rect).unwrap();
        assert_eq!(engine.with_source(|s| s.input_rect()), None);

        // Stored hint is applied on enable
        engine.start_composition().unwrap();
        assert_eq!(engine.with_source(|s| s.input_rect()), Some(rect));

        let moved = InputRect::new(20, 60, 0, 0);
        engine.set_input_hint(moved).unwrap();
        assert_eq!(engine.with_source(|s| s.input_rect()), Some(moved));
        assert_eq!(engine.input_hint(), Some(moved));
    }

    #[test]
    fn test_unsupported_capabilities_are_explicit() {
        let engine = ImeEngine::new(
            BufferedSource::new(Capabilities::text_input_only()),
            ImeConfig::default(),
        );
        assert_eq!(
            engine.composition(),
            Err(ImeError::Unsupported(Capability::Composition))
        );
        assert_eq!(
            engine.result_reading(),
            Err(ImeError::Unsupported(Capability::Reading))
        );
        assert_eq!(
            engine.candidates(),
            Err(ImeError::Unsupported(Capability::Candidates))
        );
        assert_eq!(
            engine.set_input_hint(InputRect::default()),
            Err(ImeError::Unsupported(Capability::InputRect))
        );
        assert_eq!(
            engine.attribute_at(0),
            Err(ImeError::Unsupported(Capability::Composition))
        );
    }

    #[test]
    fn test_attribute_lookup() {
        let engine = engine();
        engine.start_composition().unwrap();
        engine.notify(Notification::CompositionStart);
        engine.with_source(|s| {
            s.set_text(FieldKind::CompositionText, "你好");
            s.set_attributes(FieldKind::CompositionAttribute, &[1, 0]);
        });
        engine.notify(Notification::CompositionUpdate);

        assert_eq!(
            engine.attribute_at(0).unwrap(),
            CompositionAttribute::TargetConverted
        );
        assert_eq!(engine.attribute_at(1).unwrap(), CompositionAttribute::Input);
        assert_eq!(
            engine.attribute_at(2),
            Err(ImeError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            engine.read_attribute_at(0),
            Err(ImeError::IndexOutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_attribute_lookup_bounded_by_text() {
        let engine = engine();
        engine.start_composition().unwrap();
        engine.notify(Notification::CompositionStart);
        engine.with_source(|s| {
            s.set_text(FieldKind::CompositionText, "nihao");
            s.set_attributes(FieldKind::CompositionAttribute, &[1; 5]);
        });
        engine.notify(Notification::CompositionUpdate);
        assert_eq!(
            engine.attribute_at(4).unwrap(),
            CompositionAttribute::TargetConverted
        );

        engine.with_source(|s| {
            s.set_text(FieldKind::CompositionText, "ni");
            s.remove(FieldKind::CompositionAttribute.into());
        });
        engine.notify(Notification::CompositionUpdate);
        assert_eq!(engine.composition().unwrap(), "ni");
        assert_eq!(
            engine.attribute_at(4),
            Err(ImeError::IndexOutOfRange { index: 4, len: 2 })
        );

        engine.with_source(|s| {
            s.set_text(FieldKind::CompositionText, "a");
            s.set_attributes(FieldKind::CompositionAttribute, &[1, 2, 3]);
        });
        engine.notify(Notification::CompositionUpdate);
        assert_eq!(
            engine.attribute_at(2),
            Err(ImeError::IndexOutOfRange { index: 2, len: 1 })
        );
        assert!(engine.attribute_at(0).is_err());
    }

    #[test]
    fn test_listeners_can_reenter() {
        let engine = Arc::new(engine());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let engine2 = Arc::clone(&engine);
            let seen = Arc::clone(&seen);
            engine.on_composition_changed(move |e| {
                // Reads and writes from inside a callback must not deadlock
                let current = engine2.composition().unwrap();
                engine2.set_input_hint(InputRect::new(1, 2, 0, 0)).unwrap();
                seen.lock().push((e.text.clone(), current));
            });
        }

        engine.start_composition().unwrap();
        engine.notify(Notification::CompositionStart);
        engine.with_source(|s| s.set_text(FieldKind::CompositionText, "ka"));
        engine.notify(Notification::CompositionUpdate);

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                (String::new(), String::new()),
                ("ka".to_string(), "ka".to_string())
            ]
        );
        assert_eq!(
            engine.with_source(|s| s.input_rect()),
            Some(InputRect::new(1, 2, 0, 0))
        );
    }

    #[test]
    fn test_channel_subscription() {
        let engine = engine();
        let rx = engine.subscribe();
        engine.start_composition().unwrap();
        engine.notify(Notification::CharacterInput('a' as u16));

        match rx.try_recv().unwrap() {
            ImeEvent::CharacterCommitted(c) => assert_eq!(c.character, 'a'),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());

        // Dropped receivers are pruned
        drop(rx);
        engine.notify(Notification::CharacterInput('b' as u16));
        assert!(engine.listeners.lock().channels.is_empty());
    }

    #[test]
    fn test_candidates_snapshot() {
        let engine = engine();
        engine.start_composition().unwrap();
        engine.with_source(|s| {
            s.set_candidates(Some(CandidatePayload::new(
                vec!["你".into(), "泥".into(), "妮".into()],
                0,
                2,
                0,
            )))
        });
        engine.notify(Notification::CandidateOpen);
        let page = engine.candidates().unwrap();
        assert_eq!(page.visible().len(), 2);
        assert_eq!(engine.snapshot().candidates(), &page);
    }

    #[test]
    fn test_synthesized_commit_through_listener() {
        let config = ImeConfig {
            result_delivery: ResultDelivery::Synthesized,
            ..ImeConfig::default()
        };
        let engine = ImeEngine::new(BufferedSource::default(), config);
        let typed = Arc::new(Mutex::new(String::new()));
        {
            let typed = Arc::clone(&typed);
            engine.on_character_committed(move |c| typed.lock().push(c.character));
        }
        engine.start_composition().unwrap();
        engine.notify(Notification::CompositionStart);
        engine.with_source(|s| s.set_text(FieldKind::ResultText, "你好"));
        engine.notify(Notification::CompositionEnd);

        assert_eq!(*typed.lock(), "你好");
        assert_eq!(engine.take_result().unwrap().as_deref(), Some("你好"));
        assert_eq!(engine.result().unwrap(), "");
    }
}
