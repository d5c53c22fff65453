use imebridge_core::{
    load_config, BufferedSource, CandidatePayload, FieldKind, ImeConfig, ImeEngine, InputRect,
    Notification,
};
use std::path::Path;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("Starting scripted composition...");

    let path = Path::new("imebridge.json");
    let config = if path.exists() {
        println!("Loading config from {:?}", path);
        load_config(path)?
    } else {
        println!("Config not found at {:?}, using defaults.", path);
        ImeConfig::default()
    };

    let engine = ImeEngine::new(BufferedSource::default(), config);
    engine.on_composition_changed(|c| {
        println!("composition: {:?} cursor={}", c.text, c.cursor);
        if let Some(page) = &c.candidates {
            println!("  candidates: {:?} selected={:?}", page.visible(), page.selected());
        }
    });
    engine.on_character_committed(|c| println!("committed: {:?} ({:?})", c.character, c.key));

    engine.set_input_hint(InputRect::new(10, 50, 0, 0))?;
    engine.start_composition()?;

    engine.notify(Notification::CompositionStart);
    for typed in ["n", "ni", "nih", "niha", "nihao"] {
        engine.with_source(|s| {
            s.set_text(FieldKind::CompositionText, typed);
            s.set_cursor(typed.len() as u32);
        });
        engine.notify(Notification::CompositionUpdate);
    }

    engine.with_source(|s| {
        let items = ["你好", "拟好", "你号"].iter().map(|s| s.to_string()).collect();
        s.set_candidates(Some(CandidatePayload::new(items, 0, 9, 0)));
    });
    engine.notify(Notification::CandidateOpen);

    engine.with_source(|s| {
        s.clear_payloads();
        s.set_candidates(None);
        s.set_text(FieldKind::ResultText, "你好");
    });
    engine.notify(Notification::CandidateClose);
    engine.notify(Notification::CompositionEnd);
    for ch in "你好".encode_utf16() {
        engine.notify(Notification::CharacterInput(ch));
    }

    println!("result: {:?}", engine.take_result()?);
    engine.stop_composition();

    Ok(())
}
