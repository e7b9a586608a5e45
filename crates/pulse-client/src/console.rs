//! Line-oriented terminal session.
//!
//! Each line read from stdin is sent as a text message; every message
//! received is printed to stdout. Logs go to stderr.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use tenvis_pulse_core::{Payload, Stream, StreamBuilder, StreamError, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Run a session until the stream closes.
///
/// # Errors
///
/// Returns an error if the stream cannot be started or gives up on every
/// transport.
pub async fn run(config: Config) -> Result<()> {
    let ping = config.heartbeat.ping()?;

    let (tx, mut events) = mpsc::unbounded_channel();
    let stream = StreamBuilder::new()
        .config(config.stream.clone())
        .connect(&config.url, tx)
        .with_context(|| format!("Failed to start stream to {}", config.url))?;

    info!(stream = %stream.id(), url = %config.url, "Connecting");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut fatal = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(StreamEvent::Open) => info!(stream = %stream.id(), "Stream open"),
                Some(StreamEvent::Message(payload)) => print_payload(&payload),
                Some(StreamEvent::Heartbeat) => {
                    if let Some(ping) = &ping {
                        debug!(stream = %stream.id(), "Heartbeat, sending ping");
                        send(&stream, ping.clone());
                    }
                }
                Some(StreamEvent::Error(e @ StreamError::Exhausted { .. })) => fatal = Some(e),
                Some(StreamEvent::Error(e)) => warn!(stream = %stream.id(), error = %e, "Stream error"),
                Some(StreamEvent::Close) | None => break,
            },

            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) if line.is_empty() => {}
                    Some(line) => send(&stream, line),
                    None => {
                        debug!("End of input, closing");
                        stdin_open = false;
                        request_close(&stream);
                    }
                }
            }

            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted, closing");
                request_close(&stream);
            }
        }
    }

    stream.closed().await;

    if let Some(e) = fatal {
        bail!("Stream to {} gave up: {}", config.url, e);
    }

    info!(stream = %stream.id(), "Stream closed");
    Ok(())
}

fn send(stream: &Stream, text: String) {
    if let Err(e) = stream.send(text) {
        warn!(stream = %stream.id(), error = %e, "Send failed");
    }
}

fn request_close(stream: &Stream) {
    if let Err(e) = stream.close() {
        debug!(stream = %stream.id(), error = %e, "Close failed");
    }
}

fn print_payload(payload: &Payload) {
    match payload {
        Payload::Text(text) => println!("{}", text),
        Payload::Binary(data) => println!("<{} bytes>", data.len()),
    }
}
