use anyhow::Context;
use drc_engine::server::handlers::{drc_complete_notification, summary_line};
use drc_engine::server::{dispatch, error_codes, DrcAsyncResult, Request, Response, ServerState};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn write_line(out: &mut impl Write, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let text = serde_json::to_string(value).context("Failed to serialize response")?;
    writeln!(out, "{}", text).context("Failed to write to stdout")?;
    out.flush().context("Failed to flush stdout")
}

/// Forward a finished background run, if any, to the client
fn poll_drc(state: &mut ServerState, rx: &Receiver<DrcAsyncResult>, out: &mut impl Write) -> anyhow::Result<()> {
    match rx.try_recv() {
        Ok(result) => {
            match &result.summary {
                Ok(summary) => info!("[DRC Server] Async DRC completed: {}", summary_line(summary)),
                Err(e) => error!("[DRC Server] Async DRC failed: {}", e),
            }
            let notification = drc_complete_notification(&result);
            state.apply_result(result);
            write_line(out, &notification)
        }
        Err(TryRecvError::Empty) => Ok(()),
        // drc_tx lives until main returns
        Err(TryRecvError::Disconnected) => Ok(()),
    }
}

fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("[DRC Server] Starting DRC server...");
    let mut state = ServerState::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    let (drc_tx, drc_rx): (Sender<DrcAsyncResult>, Receiver<DrcAsyncResult>) = mpsc::channel();

    for line in stdin.lock().lines() {
        poll_drc(&mut state, &drc_rx, &mut stdout)?;

        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("[DRC Server] Error reading stdin: {}", e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => dispatch(&mut state, request, &drc_tx),
            Err(e) => {
                warn!("[DRC Server] Failed to parse request: {}", e);
                Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e))
            }
        };
        write_line(&mut stdout, &response)?;
    }

    // Let a run that is still going finish before exiting
    if state.run_in_progress {
        state.engine.cancel();
        if let Ok(result) = drc_rx.recv() {
            let notification = drc_complete_notification(&result);
            state.apply_result(result);
            write_line(&mut stdout, &notification)?;
        }
    }
    state.engine.teardown();
    info!("[DRC Server] Shutting down");
    Ok(())
}
