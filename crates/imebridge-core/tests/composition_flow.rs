use imebridge_core::imm;
use imebridge_core::{
    BufferedSource, CandidatePayload, CompositionAttribute, FieldKind, ImeConfig, ImeEngine,
    ImeEvent, ImeState, InputRect, KeyCode, Notification, ResultDelivery,
};
use parking_lot::Mutex;
use std::sync::Arc;

fn engine(config: ImeConfig) -> ImeEngine<BufferedSource> {
    ImeEngine::new(BufferedSource::default(), config)
}

fn candidates(items: &[&str], page_start: u32, page_size: u32, selection: u32) -> CandidatePayload {
    CandidatePayload::new(
        items.iter().map(|s| s.to_string()).collect(),
        page_start,
        page_size,
        selection,
    )
}

#[test]
fn pinyin_composition_commits_through_character_input() {
    let engine = engine(ImeConfig::default());
    let rx = engine.subscribe();
    engine.start_composition().unwrap();

    engine.notify(Notification::CompositionStart);
    engine.with_source(|s| {
        s.set_text(FieldKind::CompositionText, "ni");
        s.set_attributes(FieldKind::CompositionAttribute, &[0, 0]);
        s.set_clauses(FieldKind::CompositionClause, &[0, 2]);
        s.set_cursor(2);
    });
    engine.notify(Notification::CompositionUpdate);

    assert_eq!(engine.composition().unwrap(), "ni");
    assert_eq!(engine.composition_clause().unwrap(), vec![0, 2]);
    assert_eq!(engine.attribute_at(1).unwrap(), CompositionAttribute::Input);
    assert_eq!(engine.cursor_position().unwrap(), 2);

    engine.with_source(|s| s.set_candidates(Some(candidates(&["你", "泥", "妮"], 0, 9, 0))));
    engine.notify(Notification::CandidateOpen);
    let page = engine.candidates().unwrap();
    assert_eq!(page.visible(), &["你", "泥", "妮"]);
    assert_eq!(page.selected(), Some("你"));

    engine.with_source(|s| {
        s.clear_payloads();
        s.set_text(FieldKind::ResultText, "你");
        s.set_candidates(None);
    });
    engine.notify(Notification::CandidateClose);
    engine.notify(Notification::CompositionEnd);
    assert_eq!(engine.state(), ImeState::Enabled);
    assert_eq!(engine.composition().unwrap(), "");
    assert_eq!(engine.result().unwrap(), "你");

    engine.notify(Notification::CharacterInput(0x4F60));

    let events: Vec<ImeEvent> = rx.try_iter().collect();
    let texts: Vec<&str> = events
        .iter()
        .filter_map(|ev| match ev {
            ImeEvent::CompositionChanged(c) => Some(c.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["", "ni", "ni", "ni", ""]);

    let committed: Vec<char> = events
        .iter()
        .filter_map(|ev| match ev {
            ImeEvent::CharacterCommitted(c) => Some(c.character),
            _ => None,
        })
        .collect();
    assert_eq!(committed, vec!['你']);

    assert_eq!(engine.take_result().unwrap(), Some("你".to_string()));
    assert_eq!(engine.take_result().unwrap(), None);
}

#[test]
fn synthesized_delivery_commits_every_result_character() {
    let config = ImeConfig {
        result_delivery: ResultDelivery::Synthesized,
        ..ImeConfig::default()
    };
    let engine = engine(config);
    let committed = Arc::new(Mutex::new(Vec::new()));
    let sink = committed.clone();
    engine.on_character_committed(move |c| sink.lock().push((c.character, c.key)));

    engine.start_composition().unwrap();
    engine.notify(Notification::CompositionStart);
    engine.with_source(|s| s.set_text(FieldKind::ResultText, "日本"));
    engine.notify(Notification::CompositionEnd);

    assert_eq!(
        *committed.lock(),
        vec![('日', KeyCode::NONE), ('本', KeyCode::NONE)]
    );
}

#[test]
fn paging_values_pass_through_unclamped() {
    let engine = engine(ImeConfig::default());
    engine.start_composition().unwrap();
    engine.notify(Notification::CompositionStart);

    let items: Vec<&str> = vec!["一", "二", "三", "四", "五", "六", "七", "八", "九", "十", "十一", "十二"];
    engine.with_source(|s| s.set_candidates(Some(candidates(&items, 9, 9, 10))));
    engine.notify(Notification::CandidateChange);

    let page = engine.candidates().unwrap();
    assert_eq!(page.page_start(), 9);
    assert_eq!(page.page_size(), 9);
    assert_eq!(page.selection(), 10);
    assert_eq!(page.visible(), &["十", "十一", "十二"]);
    assert_eq!(page.selection_in_page(), Some(1));

    // A single remaining candidate closes the window
    engine.with_source(|s| s.set_candidates(Some(candidates(&["一"], 0, 9, 0))));
    engine.notify(Notification::CandidateChange);
    assert!(engine.candidates().unwrap().is_empty());
}

#[test]
fn surrogate_halves_are_dropped() {
    let engine = engine(ImeConfig::default());
    let rx = engine.subscribe();
    engine.notify(Notification::CharacterInput(0xD83D));
    engine.notify(Notification::CharacterInput(0xDE00));
    assert!(rx.try_recv().is_err());

    engine.notify(Notification::CharacterInput('a' as u16));
    match rx.try_recv().unwrap() {
        ImeEvent::CharacterCommitted(c) => {
            assert_eq!(c.character, 'a');
            assert_eq!(c.key, KeyCode(0x41));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn window_messages_drive_the_engine() {
    let engine = engine(ImeConfig::default());
    engine.set_input_hint(InputRect::new(10, 50, 0, 0)).unwrap();
    engine.start_composition().unwrap();
    assert_eq!(
        engine.with_source(|s| s.input_rect()),
        Some(InputRect::new(10, 50, 0, 0))
    );

    let start = imm::translate_message(imm::WM_IME_STARTCOMPOSITION, 0, 0, false);
    assert!(!start.forward);
    engine.notify(start.notification.unwrap());

    engine.with_source(|s| {
        s.set_text(FieldKind::CompositionText, "かな");
        s.set_cursor(1);
    });
    let update = imm::translate_message(
        imm::WM_IME_COMPOSITION,
        0,
        (imm::GCS_COMPSTR | imm::GCS_CURSORPOS) as isize,
        false,
    );
    engine.notify(update.notification.unwrap());
    assert_eq!(engine.composition().unwrap(), "かな");
    assert_eq!(engine.cursor_position().unwrap(), 1);

    let blob = imm::encode_candidate_list(&candidates(&["仮名", "かな", "カナ"], 0, 9, 2));
    let parsed = imm::parse_candidate_list(&blob).unwrap();
    engine.with_source(|s| s.set_candidates(Some(parsed)));
    let open = imm::translate_message(imm::WM_IME_NOTIFY, imm::IMN_OPENCANDIDATE, 0, false);
    assert!(!open.forward);
    engine.notify(open.notification.unwrap());
    assert_eq!(engine.candidates().unwrap().selected(), Some("カナ"));

    engine.stop_composition();
    assert_eq!(engine.state(), ImeState::Idle);
    assert_eq!(engine.composition().unwrap(), "");
    assert!(engine.candidates().unwrap().is_empty());
}
