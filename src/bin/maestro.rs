//! Thin CLI harness over the core library (§6.5).
//!
//! `chat`/`implement` need a front-end to supply a live `Provider` and the
//! intent/complexity classifiers (out of scope per the crate's Non-goals),
//! so this binary only wires the one command shape that is entirely
//! self-contained in the core: submitting a feedback event.

use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use maestro_core::store::feedback::FeedbackEvent;
use maestro_core::store::feedback::FeedbackStore;

fn feedback_path() -> PathBuf {
    env::var("MAESTRO_FEEDBACK_PATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("feedback.jsonl"))
}

fn usage() -> &'static str {
    "usage: maestro feedback submit   (reads a FeedbackEvent as JSON from stdin)"
}

fn run() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, sub] if cmd == "feedback" && sub == "submit" => {
            let mut payload = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut payload) {
                log::error!("failed to read stdin: {}", e);
                return ExitCode::from(2);
            }
            let event: FeedbackEvent = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    log::error!("invalid feedback event: {}", e);
                    return ExitCode::from(2);
                }
            };
            let store = FeedbackStore::new(feedback_path());
            match store.append(&event) {
                Ok(()) => {
                    log::info!("recorded feedback for {}/{}", event.backend, event.model);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!("failed to append feedback event: {}", e);
                    ExitCode::from(1)
                }
            }
        }
        ["chat"] | ["implement", _] => {
            log::error!("{} is not wired in this harness; construct an AgentCoordinator/Orchestrator via the library API from a front-end", args[0]);
            ExitCode::from(2)
        }
        _ => {
            eprintln!("{}", usage());
            ExitCode::from(2)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run()
}
