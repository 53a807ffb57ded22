//! Sunny: voice-controlled photo slideshow core.
//!
//! Communicates with the UI shell via JSON-line IPC on stdin/stdout. The
//! shell owns the platform speech recognizer/synthesizer and the photo
//! store; this process owns command recognition, dispatch, and slideshow
//! playback state. This is the entry point that wires everything together
//! and runs the main event loop.

mod assistant;
mod config;
mod dispatch;
mod ipc;
mod session;
mod slideshow;
mod tts;
mod voice;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ipc::bridge::{emit_event, spawn_stdin_reader, StdoutSink};
use ipc::CoreEvent;
use session::Session;

#[tokio::main]
async fn main() {
    // Initialize tracing (respects RUST_LOG env, defaults to info).
    // Logs go to stderr; stdout carries the IPC protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Emit starting event immediately so the shell knows we're alive.
    emit_event(&CoreEvent::Starting {});

    let frame_config = config::read_frame_config();
    info!(
        wake_word = %frame_config.wake_word,
        interval = frame_config.interval_secs,
        order = %frame_config.order,
        "Configuration loaded"
    );

    // Spawn stdin reader (blocking thread -> async channel).
    let mut cmd_rx = spawn_stdin_reader();

    // Channels for engine events and auto-advance ticks.
    let (engine_tx, mut engine_rx) = mpsc::unbounded_channel();
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();

    let sink = std::sync::Arc::new(StdoutSink);
    let mut session = Session::new(&frame_config, sink, engine_tx, tick_tx);

    emit_event(&CoreEvent::Ready {});
    info!("Sunny core ready");

    // Main loop: shell commands, engine events, and timer ticks serialize
    // through this single task.
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => {
                        if !session.handle_shell_command(command) {
                            break; // Stop command received.
                        }
                    }
                    None => {
                        // stdin closed; parent process gone.
                        info!("stdin closed, shutting down");
                        session.shutdown();
                        break;
                    }
                }
            }
            Some(event) = engine_rx.recv() => {
                session.handle_engine_event(event).await;
            }
            Some(_tick) = tick_rx.recv() => {
                session.handle_tick();
            }
        }
    }

    emit_event(&CoreEvent::Stopping {});
    info!("Sunny core shutting down");
}
