//! Main Entrypoint for the Lyra Assistant
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the engine with the default extension catalog.
//! 3. Driving the engine: either a single utterance from the command line,
//!    or an interactive loop that reads utterances from stdin while ticking
//!    the timer bank.

use anyhow::Context;
use clap::Parser;
use lyra_core::{Config, Engine, OutputMode};
use lyra_extensions::default_catalog;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

/// How often the interactive loop polls the timer bank.
const TIMER_TICK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "assistant", about = "Lyra voice command assistant")]
struct Cli {
    /// Dispatch a single utterance and exit instead of reading stdin.
    #[arg(short, long)]
    utterance: Option<String>,

    /// Extension units to load before all others, comma separated.
    #[arg(long, value_delimiter = ',')]
    priority: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing engine...");

    // --- 3. Bring Up the Engine ---
    let echo_replies = config.output_modes.contains(&OutputMode::Text);
    let mut engine = Engine::new(config);
    let priority: Vec<&str> = cli.priority.iter().map(String::as_str).collect();
    engine.init_with_extensions(&default_catalog(), &priority);

    // --- 4. Dispatch ---
    if let Some(utterance) = cli.utterance {
        if !engine.run_input_str(&utterance) {
            info!(utterance, "no wake word in utterance, nothing dispatched");
        }
        echo_reply(&mut engine, echo_replies);
        return Ok(());
    }

    info!("Listening on stdin. Say '<wake word> <command>', Ctrl+C to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(TIMER_TICK);
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                engine.run_input_str(line);
                echo_reply(&mut engine, echo_replies);
            }
            _ = tick.tick() => {
                engine.update_timers();
                echo_reply(&mut engine, echo_replies);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Shutting down...");
                break;
            }
        }
    }

    Ok(())
}

/// Prints the collected text reply when running in text output mode.
fn echo_reply(engine: &mut Engine, enabled: bool) {
    if !enabled {
        return;
    }
    if let Some(reply) = engine.take_reply() {
        if let Some(text) = reply.text {
            println!("{text}");
        }
    }
}
