//! Small-talk and utility command pack: greetings, date and time, kitchen
//! timers on top of the engine's timer slots, and coin or dice throws.
//!
//! Also the reference user of the options machinery: the default timer
//! length is an extension option, so a persisted override changes what an
//! unqualified "set timer" arms.

use anyhow::Result;
use chrono::Local;
use lyra_core::{
    Action, CommandNode, Engine, Extension, Manifest, leaf, leaf_with, tree,
};
use rand::Rng;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMER_MINUTES: u64 = 5;

pub struct GreetingsUnit;

const GREETING_REPLIES: &[&str] = &[
    "Hello!",
    "Hi there!",
    "Good to hear you!",
    "At your service!",
];

fn build_manifest(default_timer: Duration) -> Manifest {
    let mut manifest = Manifest::named("Greetings and utilities");
    manifest
        .options
        .insert("timer_default_minutes".to_string(), json!(DEFAULT_TIMER_MINUTES));
    manifest.commands = tree([
        ("hello|hi|greetings", leaf(greet)),
        ("date|what day is it", leaf(tell_date)),
        ("time|what time is it", leaf(tell_time)),
        (
            "set timer|start timer|timer",
            CommandNode::Leaf(Action::with_param(
                set_timer,
                default_timer.as_secs(),
            )),
        ),
        ("timers|list timers", leaf(list_timers)),
        ("cancel timer|stop timer", leaf(cancel_timer)),
        (
            "flip|toss|throw",
            CommandNode::Interior(tree([
                ("coin|a coin", leaf(flip_coin)),
                ("dice|die|a die", leaf_with(roll_die, 6)),
            ])),
        ),
        ("commands|what can you do", leaf(list_commands)),
    ]);
    manifest
}

impl Extension for GreetingsUnit {
    fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
        Ok(build_manifest(Duration::from_secs(DEFAULT_TIMER_MINUTES * 60)))
    }

    fn start_with_options(
        &mut self,
        _engine: &mut Engine,
        manifest: &Manifest,
    ) -> Result<Option<Manifest>> {
        let minutes = manifest
            .options
            .get("timer_default_minutes")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMER_MINUTES);
        if minutes == DEFAULT_TIMER_MINUTES {
            return Ok(None);
        }
        debug!(minutes, "timer default overridden");
        Ok(Some(build_manifest(Duration::from_secs(
            minutes.saturating_mul(60),
        ))))
    }
}

fn greet(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let pick = rand::rng().random_range(0..GREETING_REPLIES.len());
    engine.say(GREETING_REPLIES[pick])
}

fn tell_date(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let today = Local::now().format("%A, %B %-d").to_string();
    engine.say(&format!("Today is {today}"))
}

fn tell_time(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let now = Local::now().format("%-H:%M").to_string();
    engine.say(&format!("It is {now}"))
}

/// "set timer" entry point. The registration-time parameter carries the
/// configured default length in seconds.
fn set_timer(engine: &mut Engine, phrase: &str, default_secs: &Value) -> Result<()> {
    let default = Duration::from_secs(default_secs.as_u64().unwrap_or(300));
    if phrase.is_empty() {
        engine.say("For how long?")?;
        // The whole next utterance is the duration.
        let default_secs = default_secs.clone();
        engine.context_set(
            CommandNode::Leaf(Action::with_param(set_timer_reply, default_secs)),
            None,
        );
        return Ok(());
    }
    match parse_duration(phrase) {
        Some(duration) => arm_timer(engine, duration),
        None => arm_timer(engine, default),
    }
}

/// Dialog continuation after "For how long?".
fn set_timer_reply(engine: &mut Engine, phrase: &str, default_secs: &Value) -> Result<()> {
    match parse_duration(phrase) {
        Some(duration) => arm_timer(engine, duration),
        None => {
            let default = Duration::from_secs(default_secs.as_u64().unwrap_or(300));
            engine.say(&format!(
                "I could not make out a duration, setting {}",
                human_duration(default)
            ))?;
            arm_timer(engine, default)
        }
    }
}

fn arm_timer(engine: &mut Engine, duration: Duration) -> Result<()> {
    let announce = Action::plain(|engine: &mut Engine, _: &str| engine.say("Time is up!"));
    match engine.set_timer(duration, announce) {
        Some(slot) => engine.say(&format!(
            "Timer {} set for {}",
            slot + 1,
            human_duration(duration)
        )),
        None => engine.say("All timer slots are busy"),
    }
}

fn list_timers(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let running = engine.timer_deadlines();
    if running.is_empty() {
        return engine.say("No timers are running");
    }
    let lines: Vec<String> = running
        .iter()
        .map(|(slot, left)| format!("timer {} has {} left", slot + 1, human_duration(*left)))
        .collect();
    engine.say(&lines.join(", "))
}

/// "cancel timer" with "all", a number, or nothing (cancels the only timer
/// when exactly one is running).
fn cancel_timer(engine: &mut Engine, phrase: &str) -> Result<()> {
    if phrase == "all" || phrase == "everything" {
        engine.clear_timers();
        return engine.say("All timers cancelled");
    }
    let running = engine.timer_deadlines();
    let slot = match parse_count(phrase) {
        Some(number) => match running.iter().find(|(slot, _)| (slot + 1) as u64 == number) {
            Some((slot, _)) => *slot,
            None => return engine.say(&format!("There is no timer {number}")),
        },
        None if running.len() == 1 => running[0].0,
        None => return engine.say("Which timer? Say a number or all"),
    };
    engine.clear_timer(slot, false)?;
    engine.say(&format!("Timer {} cancelled", slot + 1))
}

fn flip_coin(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let side = if rand::rng().random_bool(0.5) {
        "Heads"
    } else {
        "Tails"
    };
    engine.say(side)
}

fn roll_die(engine: &mut Engine, _phrase: &str, sides: &Value) -> Result<()> {
    let sides = sides.as_u64().unwrap_or(6);
    let roll = rand::rng().random_range(1..=sides);
    engine.say(&format!("It came up {roll}"))
}

/// Lists every loaded unit together with the first synonym of each command
/// it contributed.
fn list_commands(engine: &mut Engine, _phrase: &str) -> Result<()> {
    let mut units: Vec<(String, Vec<String>)> = engine
        .registry()
        .contributions()
        .map(|(unit, keys)| {
            let phrases: Vec<String> = keys
                .iter()
                .filter_map(|key| key.synonyms().next().map(str::to_string))
                .collect();
            (unit.to_string(), phrases)
        })
        .collect();
    units.sort();
    let lines: Vec<String> = units
        .into_iter()
        .map(|(unit, phrases)| format!("{unit}: {}", phrases.join(", ")))
        .collect();
    engine.say(&lines.join(". "))
}

/// Parses phrases like "5 minutes", "ninety seconds", "1 hour 30 minutes".
/// Bare numbers are minutes.
fn parse_duration(phrase: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut pending: Option<u64> = None;

    for word in phrase.split_whitespace() {
        if let Some(number) = parse_count(word) {
            // Two numbers in a row: the first one had no unit, treat it as
            // minutes like a bare trailing number.
            if let Some(prev) = pending.replace(number) {
                total = total.saturating_add(Duration::from_secs(prev.saturating_mul(60)));
            }
            continue;
        }
        let factor = match word.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" | "hr" => 3600,
            _ => continue,
        };
        let count = pending.take().unwrap_or(1);
        total = total.saturating_add(Duration::from_secs(count.saturating_mul(factor)));
    }

    if let Some(bare) = pending.take() {
        total = total.saturating_add(Duration::from_secs(bare.saturating_mul(60)));
    }
    (total > Duration::ZERO).then_some(total)
}

fn parse_count(word: &str) -> Option<u64> {
    if let Ok(number) = word.parse::<u64>() {
        return Some(number);
    }
    let number = match word {
        "one" | "a" | "an" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "fifteen" => 15,
        "twenty" => 20,
        "thirty" => 30,
        "forty" => 40,
        "fifty" => 50,
        "sixty" => 60,
        "ninety" => 90,
        _ => return None,
    };
    Some(number)
}

fn human_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} hour{}", plural(hours)));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minute{}", plural(minutes)));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{seconds} second{}", plural(seconds)));
    }
    parts.join(" ")
}

fn plural(count: u64) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyra_core::{Config, OutputMode};

    fn text_engine() -> Engine {
        Engine::new(Config {
            output_modes: vec![OutputMode::Text],
            ..Config::default()
        })
    }

    fn last_text(engine: &mut Engine) -> String {
        engine.take_reply().unwrap().text.unwrap()
    }

    #[test]
    fn durations_parse_in_common_shapes() {
        assert_eq!(parse_duration("5 minutes"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("ninety seconds"), Some(Duration::from_secs(90)));
        assert_eq!(
            parse_duration("1 hour 30 minutes"),
            Some(Duration::from_secs(5400))
        );
        assert_eq!(parse_duration("3"), Some(Duration::from_secs(180)));
        assert_eq!(parse_duration("a minute"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("please hurry"), None);
        assert_eq!(parse_duration("0 seconds"), None);
        // Absurd counts saturate instead of overflowing.
        assert_eq!(
            parse_duration("9999999999999999 hours"),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn set_timer_with_phrase_arms_and_confirms() {
        let mut engine = text_engine();
        set_timer(&mut engine, "2 minutes", &json!(300)).unwrap();
        assert_eq!(last_text(&mut engine), "Timer 1 set for 2 minutes");
        assert_eq!(engine.timer_deadlines().len(), 1);
    }

    #[test]
    fn set_timer_without_phrase_asks_back() {
        let mut engine = text_engine();
        set_timer(&mut engine, "", &json!(300)).unwrap();
        assert_eq!(last_text(&mut engine), "For how long?");
        assert!(engine.timer_deadlines().is_empty());

        // The continuation arrives as a full-utterance leaf invocation.
        assert!(engine.run_input_str("ten minutes"));
        assert_eq!(last_text(&mut engine), "Timer 1 set for 10 minutes");
        assert_eq!(engine.timer_deadlines().len(), 1);
    }

    #[test]
    fn garbled_continuation_falls_back_to_the_default() {
        let mut engine = text_engine();
        set_timer(&mut engine, "", &json!(120)).unwrap();
        assert!(engine.run_input_str("errr whatever"));
        assert_eq!(engine.timer_deadlines().len(), 1);
        let (_, left) = engine.timer_deadlines()[0];
        assert!(left <= Duration::from_secs(120));
        assert!(left > Duration::from_secs(110));
    }

    #[test]
    fn cancel_by_number_and_cancel_all() {
        let mut engine = text_engine();
        set_timer(&mut engine, "5 minutes", &json!(300)).unwrap();
        set_timer(&mut engine, "8 minutes", &json!(300)).unwrap();
        engine.take_reply();

        cancel_timer(&mut engine, "two").unwrap();
        assert_eq!(last_text(&mut engine), "Timer 2 cancelled");
        assert_eq!(engine.timer_deadlines().len(), 1);

        cancel_timer(&mut engine, "7").unwrap();
        assert_eq!(last_text(&mut engine), "There is no timer 7");

        cancel_timer(&mut engine, "all").unwrap();
        assert_eq!(last_text(&mut engine), "All timers cancelled");
        assert!(engine.timer_deadlines().is_empty());
    }

    #[test]
    fn cancel_without_number_needs_a_single_timer() {
        let mut engine = text_engine();
        cancel_timer(&mut engine, "").unwrap();
        assert_eq!(last_text(&mut engine), "Which timer? Say a number or all");

        set_timer(&mut engine, "5 minutes", &json!(300)).unwrap();
        cancel_timer(&mut engine, "").unwrap();
        assert_eq!(last_text(&mut engine), "Timer 1 cancelled");
    }

    #[test]
    fn human_duration_reads_naturally() {
        assert_eq!(human_duration(Duration::from_secs(90)), "1 minute 30 seconds");
        assert_eq!(human_duration(Duration::from_secs(3600)), "1 hour");
        assert_eq!(human_duration(Duration::ZERO), "0 seconds");
    }
}
