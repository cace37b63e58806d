//! device-events demo
//!
//! Prints keyboard and mouse activity until Escape is pressed.

use anyhow::{bail, Context, Result};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use device_events::{create_source, DeviceEventsHandler, DeviceQuery, Keycode};

const USAGE: &str = "usage: device-events [--query] [interval_ms]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Register callbacks and print events
    Events,
    /// Print the synchronous state whenever it changes
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Options {
    mode: Mode,
    interval: Duration,
}

/// Main entry point
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();

    match run() {
        Ok(()) => {
            info!("device-events exiting cleanly");
            process::exit(0);
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("\nFATAL ERROR: {:#}", e);
            process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let Some(options) = parse_args(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    match options.mode {
        Mode::Events => run_events(options.interval),
        Mode::Query => run_query(options.interval),
    }
}

/// `Ok(None)` means help was requested.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Option<Options>> {
    let mut options = Options {
        mode: Mode::Events,
        interval: Duration::from_millis(10),
    };

    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--query" => options.mode = Mode::Query,
            other if other.starts_with('-') => bail!("unknown option '{other}'\n{USAGE}"),
            other => {
                let ms: u64 = other
                    .parse()
                    .with_context(|| format!("invalid interval '{other}'\n{USAGE}"))?;
                options.interval = Duration::from_millis(ms);
            }
        }
    }

    Ok(Some(options))
}

fn run_events(interval: Duration) -> Result<()> {
    let handler =
        DeviceEventsHandler::new(interval).context("Failed to start device event polling")?;

    // Cancellation token, set from the key-down callback.
    let exit = Arc::new(AtomicBool::new(false));
    let token = Arc::clone(&exit);

    let guards = [
        handler.on_key_down(move |key| {
            println!("Key down: {key}");
            if *key == Keycode::Escape {
                token.store(true, Ordering::Release);
            }
        })?,
        handler.on_key_up(|key| println!("Key up: {key}"))?,
        handler.on_mouse_move(|&(x, y)| println!("Mouse move: ({x}, {y})"))?,
        handler.on_mouse_down(|button| println!("Mouse button down: {button}"))?,
        handler.on_mouse_up(|button| println!("Mouse button up: {button}"))?,
    ];

    println!("Listening for input, press Escape to exit");
    while !exit.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(50));
    }

    drop(guards);
    handler.stop().context("Failed to stop device event polling")?;
    Ok(())
}

fn run_query(interval: Duration) -> Result<()> {
    let source = create_source().context("Failed to open device state")?;
    println!("Querying device state, hold Escape to exit");

    let mut last = None;
    loop {
        match (source.query_keys(), source.query_mouse()) {
            (Ok(keys), Ok(mouse)) => {
                if keys.contains(&Keycode::Escape) {
                    break;
                }
                let current = Some((keys, mouse));
                if current != last {
                    if let Some((keys, mouse)) = &current {
                        let names: Vec<String> = keys.iter().map(Keycode::to_string).collect();
                        println!(
                            "Keys: [{}] Mouse: {:?} Buttons: {:?}",
                            names.join(", "),
                            mouse.coords,
                            mouse.button_pressed.get(1..).unwrap_or(&[])
                        );
                    }
                    last = current;
                }
            }
            (Err(e), _) | (_, Err(e)) => warn!("Query failed: {}", e),
        }

        thread::sleep(interval);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_to_event_mode() {
        let options = parse_args(args(&[])).unwrap().unwrap();
        assert_eq!(options.mode, Mode::Events);
        assert_eq!(options.interval, Duration::from_millis(10));
    }

    #[test]
    fn query_mode_with_interval() {
        let options = parse_args(args(&["--query", "25"])).unwrap().unwrap();
        assert_eq!(options.mode, Mode::Query);
        assert_eq!(options.interval, Duration::from_millis(25));
    }

    #[test]
    fn help_returns_none() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
    }

    #[test]
    fn bad_arguments_are_errors() {
        assert!(parse_args(args(&["--verbose"])).is_err());
        let err = parse_args(args(&["fast"])).unwrap_err();
        assert!(err.to_string().contains("invalid interval"));
    }
}
