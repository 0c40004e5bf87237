//! End-to-end tests over the full default catalog: a real engine is brought
//! up exactly the way the assistant binary does it, then driven with text
//! utterances.

use lyra_core::{Config, Engine, OutputMode};
use lyra_extensions::default_catalog;
use std::time::Duration;
use tempfile::TempDir;

fn booted_engine() -> (Engine, TempDir) {
    let dir = TempDir::new().expect("temp runtime dir");
    let config = Config {
        runtime_dir: dir.path().to_path_buf(),
        output_modes: vec![OutputMode::Text],
        ..Config::default()
    };
    let mut engine = Engine::new(config);
    engine.init_with_extensions(&default_catalog(), &[]);
    (engine, dir)
}

fn reply_text(engine: &mut Engine) -> String {
    engine
        .take_reply()
        .expect("a reply should have been produced")
        .text
        .expect("text mode reply")
}

#[test]
fn all_units_load_and_register_their_engines() {
    let (engine, _dir) = booted_engine();
    assert!(engine.registry().tts("console").is_some());
    assert!(engine.registry().playback("console").is_some());
    assert!(engine.registry().normalizer("plain").is_some());
    assert_eq!(engine.registry().fuzzy_processors().len(), 1);
    assert!(!engine.registry().contributed_commands("greetings").is_empty());
}

#[test]
fn greeting_round_trip() {
    let (mut engine, _dir) = booted_engine();
    assert!(engine.run_input_str("hey lyra hello"));
    let reply = reply_text(&mut engine);
    assert!(!reply.is_empty());
    assert_eq!(engine.last_say(), reply);
}

#[test]
fn timer_flow_through_dispatch() {
    let (mut engine, _dir) = booted_engine();

    assert!(engine.run_input_str("lyra set timer 2 minutes"));
    assert_eq!(reply_text(&mut engine), "Timer 1 set for 2 minutes");

    assert!(engine.run_input_str("lyra timers"));
    assert!(reply_text(&mut engine).starts_with("timer 1 has"));

    assert!(engine.run_input_str("lyra cancel timer 1"));
    assert_eq!(reply_text(&mut engine), "Timer 1 cancelled");
    assert!(engine.timer_deadlines().is_empty());
}

#[test]
fn bare_set_timer_opens_a_dialog() {
    let (mut engine, _dir) = booted_engine();

    assert!(engine.run_input_str("lyra set timer"));
    assert_eq!(reply_text(&mut engine), "For how long?");

    // No wake word: the dialog context takes the whole utterance.
    assert!(engine.run_input_str("three minutes"));
    assert_eq!(reply_text(&mut engine), "Timer 1 set for 3 minutes");
}

#[test]
fn nested_coin_flip_resolves_in_one_utterance() {
    let (mut engine, _dir) = booted_engine();
    assert!(engine.run_input_str("lyra flip a coin"));
    let reply = reply_text(&mut engine);
    assert!(reply == "Heads" || reply == "Tails", "got {reply}");
}

#[test]
fn close_enough_phrase_reaches_the_command_via_fuzzy() {
    let (mut engine, _dir) = booted_engine();
    // "list tmers" is not an exact or prefix match for anything.
    assert!(engine.run_input_str("lyra list tmers"));
    assert_eq!(reply_text(&mut engine), "No timers are running");
}

#[test]
fn unknown_phrase_gets_the_fallback_reply() {
    let (mut engine, _dir) = booted_engine();
    assert!(engine.run_input_str("lyra paint the shed ultraviolet"));
    assert_eq!(
        reply_text(&mut engine),
        "Sorry, I did not understand that"
    );
}

#[test]
fn commands_listing_names_the_greetings_unit() {
    let (mut engine, _dir) = booted_engine();
    assert!(engine.run_input_str("lyra what can you do"));
    let reply = reply_text(&mut engine);
    assert!(reply.contains("greetings:"), "got {reply}");
    assert!(reply.contains("hello"), "got {reply}");
}

#[test]
fn persisted_timer_default_changes_the_armed_duration() {
    let dir = TempDir::new().expect("temp runtime dir");
    let options_dir = dir.path().join("options");
    std::fs::create_dir_all(&options_dir).unwrap();
    std::fs::write(
        options_dir.join("greetings.json"),
        r#"{"timer_default_minutes": 1}"#,
    )
    .unwrap();

    let config = Config {
        runtime_dir: dir.path().to_path_buf(),
        output_modes: vec![OutputMode::Text],
        ..Config::default()
    };
    let mut engine = Engine::new(config);
    engine.init_with_extensions(&default_catalog(), &[]);

    // An unparsable duration falls back to the overridden default. Each say
    // replaces the collected reply, so only the final confirmation is left.
    assert!(engine.run_input_str("lyra set timer"));
    assert_eq!(reply_text(&mut engine), "For how long?");
    assert!(engine.run_input_str("mumble mumble"));
    assert_eq!(reply_text(&mut engine), "Timer 1 set for 1 minute");
    let (_, left) = engine.timer_deadlines()[0];
    assert!(left <= Duration::from_secs(60), "got {left:?}");
}
