use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use vigil_core::engine::EngineCall;
use vigil_core::{PresentationSink, Session, SessionSetup, SessionStatus, StubEngine};

const KEYPHRASE: &str = "oh mighty computer";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkCall {
    Caption(String),
    Result(String),
    Transient(String),
    Error(String),
}

#[derive(Clone, Default)]
struct RecordingSink {
    log: Arc<Mutex<Vec<SinkCall>>>,
}

impl PresentationSink for RecordingSink {
    fn set_caption(&mut self, text: &str) {
        self.log.lock().push(SinkCall::Caption(text.into()));
    }

    fn set_result(&mut self, text: &str) {
        self.log.lock().push(SinkCall::Result(text.into()));
    }

    fn notify_transient(&mut self, text: &str) {
        self.log.lock().push(SinkCall::Transient(text.into()));
    }

    fn report_error(&mut self, text: &str) {
        self.log.lock().push(SinkCall::Error(text.into()));
    }
}

fn temp_asset(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("vigil-it-{}-{name}", std::process::id()));
    std::fs::write(&path, "#JSGF V1.0;\n").expect("write temp asset");
    path
}

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// No two `start_listening` calls without a completed stop in between.
fn assert_no_overlapping_decodes(calls: &[EngineCall]) {
    let mut listening = false;
    for call in calls {
        match call {
            EngineCall::Start { search, .. } => {
                assert!(
                    !listening,
                    "engine observed start of '{search}' while another search was active: {calls:?}"
                );
                listening = true;
            }
            EngineCall::Stop | EngineCall::Cancel => listening = false,
            _ => {}
        }
    }
}

fn listening_sequence(calls: &[EngineCall]) -> Vec<(String, bool)> {
    calls
        .iter()
        .filter_map(|call| match call {
            EngineCall::Start { search, timeout } => Some((search.clone(), timeout.is_some())),
            _ => None,
        })
        .collect()
}

#[test]
fn wake_to_menu_to_digits_then_deadline_returns_to_wake() {
    let menu = temp_asset("menu.gram");
    let digits = temp_asset("digits.gram");

    let (engine, handle) = StubEngine::new();
    let controller = SessionSetup::new()
        .keyword_search("wakeup", KEYPHRASE)
        .grammar_search("menu", &menu)
        .grammar_search("digits", &digits)
        .wake_search("wakeup")
        .trigger(KEYPHRASE, "menu")
        .trigger("digits", "digits")
        .listen_timeout(Duration::from_millis(200))
        .build(engine, RecordingSink::default())
        .expect("setup must build");

    let mut session = Session::spawn(controller).expect("session must spawn");
    session.switch_to("wakeup").unwrap();
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("wakeup".into()),
            Duration::from_secs(1),
        ),
        "wake listening should start"
    );

    // Wake phrase spotted — the session moves to the menu grammar.
    assert!(handle.hear_partial(KEYPHRASE));
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("menu".into()),
            Duration::from_secs(1),
        ),
        "menu search should become active"
    );

    // Menu grammar recognises a search name — on to digits.
    assert!(handle.hear_partial("digits"));
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("digits".into()),
            Duration::from_secs(1),
        ),
        "digits search should become active"
    );

    // Say nothing: the 200 ms listen deadline must bounce us back to wake.
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("wakeup".into()),
            Duration::from_secs(2),
        ),
        "deadline should return the session to wake listening"
    );

    session.shutdown();
    assert_eq!(session.status(), SessionStatus::Stopped);

    let calls = handle.calls();
    assert_no_overlapping_decodes(&calls);
    assert_eq!(
        listening_sequence(&calls),
        vec![
            ("wakeup".to_string(), false),
            ("menu".to_string(), true),
            ("digits".to_string(), true),
            ("wakeup".to_string(), false),
        ],
        "wake listens open-ended, everything else with a timeout"
    );
    assert_eq!(
        &calls[calls.len() - 2..],
        &[EngineCall::Cancel, EngineCall::Shutdown]
    );

    let _ = std::fs::remove_file(menu);
    let _ = std::fs::remove_file(digits);
}

#[test]
fn final_result_is_notified_then_cleared_and_eos_returns_to_wake() {
    let digits = temp_asset("digits2.gram");

    let sink = RecordingSink::default();
    let sink_log = Arc::clone(&sink.log);

    let (engine, handle) = StubEngine::new();
    let controller = SessionSetup::new()
        .keyword_search("wakeup", KEYPHRASE)
        .grammar_search("digits", &digits)
        .wake_search("wakeup")
        .caption("wakeup", "say the wake phrase")
        .caption("digits", "speak digits")
        .result_clear_delay(Duration::from_millis(100))
        .build(engine, sink)
        .expect("setup must build");

    let mut session = Session::spawn(controller).expect("session must spawn");
    session.switch_to("digits").unwrap();
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("digits".into()),
            Duration::from_secs(1),
        ),
        "digits listening should start"
    );

    assert!(handle.hear_partial("four five"));
    assert!(handle.hear_final("four five six"));
    assert!(
        wait_until(
            || sink_log
                .lock()
                .contains(&SinkCall::Transient("four five six".into())),
            Duration::from_secs(1),
        ),
        "final hypothesis should be notified"
    );

    // The display-clear timer fires independently of the state machine.
    assert!(
        wait_until(
            || sink_log.lock().ends_with(&[SinkCall::Result(String::new())]),
            Duration::from_secs(1),
        ),
        "result display should clear after the configured delay"
    );

    assert!(handle.end_of_speech());
    assert!(
        wait_until(
            || handle.active_search().map(|s| s.to_string()) == Some("wakeup".into()),
            Duration::from_secs(1),
        ),
        "end of speech should return the session to wake listening"
    );

    session.shutdown();

    let log = sink_log.lock();
    assert!(log.contains(&SinkCall::Caption("speak digits".into())));
    assert!(log.contains(&SinkCall::Caption("say the wake phrase".into())));
    assert!(log.contains(&SinkCall::Result("four five".into())));
    assert!(
        !log.iter().any(|c| matches!(c, SinkCall::Error(_))),
        "no errors expected in this scenario: {log:?}"
    );

    let _ = std::fs::remove_file(digits);
}
