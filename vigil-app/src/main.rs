//! Vigil console host.
//!
//! Wires the stub decoding engine and a console sink into a session and
//! drives it from stdin: a typed line is delivered as a partial
//! hypothesis, so typing the wake phrase walks the same search-switching
//! path real audio would.

mod settings;
mod sink;

use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use settings::AppSettings;
use sink::ConsoleSink;
use vigil_core::{Session, StubEngine, StubHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => AppSettings::load(Path::new(&path))?,
        None => AppSettings::default(),
    };
    settings.validate()?;

    let (engine, driver) = StubEngine::new();
    let setup = settings.to_setup()?;

    // Setup is IO-bound (asset checks, engine configuration) — keep it
    // off the thread that owns the console.
    let controller = tokio::task::spawn_blocking(move || setup.build(engine, ConsoleSink))
        .await
        .context("setup task panicked")?
        .context("failed to initialise the recognizer")?;

    let mut session = Session::spawn(controller)?;

    let mut status_rx = session.subscribe_status();
    tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            debug!(status = ?event.status, search = ?event.search, "session status");
        }
    });

    session.switch_to(settings.wake_search.as_str())?;
    info!(wake = %settings.wake_search, "session running");

    println!("vigil console demo — a typed line is a partial hypothesis");
    println!("  blank line = end of speech   :final <text>   :error <text>   :timeout   :quit");

    tokio::task::spawn_blocking(move || read_input(driver))
        .await
        .context("input task panicked")?;

    session.shutdown();
    let snap = session.diagnostics_snapshot();
    info!(
        engine_events = snap.engine_events,
        starts_issued = snap.starts_issued,
        triggers_matched = snap.triggers_matched,
        timeouts_fired = snap.timeouts_fired,
        "session closed"
    );
    Ok(())
}

/// Blocking stdin loop; returns when the user quits or stdin closes.
fn read_input(driver: StubHandle) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        let delivered = match trimmed {
            ":quit" => break,
            "" => driver.end_of_speech(),
            ":timeout" => driver.timeout(),
            text => {
                if let Some(rest) = text.strip_prefix(":final ") {
                    driver.hear_final(rest)
                } else if let Some(rest) = text.strip_prefix(":error ") {
                    driver.fail(rest)
                } else {
                    driver.hear_partial(text)
                }
            }
        };
        if !delivered {
            println!(" ! no active search — the session dropped that input");
        }
    }
}
