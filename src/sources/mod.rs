/*!
Gesture sources for the simulator.

A source reads gesture lines (see `gesture.rs` for the grammar) from somewhere
and pushes parsed `Gesture`s into a channel that the dial loop drains. The
implementations live in their own files:

- `stdin_source.rs` -> `StdinSource`  (interactive, one gesture per line, read on its own thread)
- `script.rs`       -> `ScriptSource` (replay a gesture file, optionally paced)

Each source is responsible for:
- Skipping blank and `#` comment lines, logging and skipping malformed ones
- Pushing gestures via `Sender<Gesture>` while respecting backpressure (`send().await`)
- Ending when its input is exhausted, the receiver is dropped or the
  `CancellationToken` fires (never panicking inside tasks)
*/

use std::time::Duration;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc::Sender,
    task::JoinHandle,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

pub mod gesture;
pub mod script;
pub mod stdin_source;

pub use gesture::{Gesture, GestureError, parse_line};
pub use script::ScriptSource;
pub use stdin_source::StdinSource;

/// Trait implemented by all gesture sources.
pub trait GestureSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background. The task ends at end of input,
    /// when the channel closes, or when `cancel` fires.
    fn start(&self, sender: Sender<Gesture>, cancel: CancellationToken) -> JoinHandle<()>;
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn GestureSource>],
    sender: Sender<Gesture>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "modedial::sources",
                source = %src.name(),
                "Starting source task"
            );
            src.start(sender.clone(), cancel.child_token())
        })
        .collect()
}

/// Read gesture lines from `reader` until EOF, cancellation or a closed channel.
///
/// `pace` is slept before each gesture after the first. Returns the number of
/// gestures sent.
pub async fn pump_lines<R>(
    mut reader: R,
    sender: &Sender<Gesture>,
    cancel: &CancellationToken,
    pace: Option<Duration>,
    source: &'static str,
) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut sent = 0usize;
    let mut line_no = 0usize;

    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(target: "modedial::sources", source, "Cancelled");
                break;
            }
            read = reader.read_line(&mut line) => read,
        };

        match read {
            Ok(0) => {
                info!(target: "modedial::sources", source, sent, "End of input");
                break;
            }
            Ok(_) => {
                line_no += 1;
                let Some(gesture) = parse_logged(&line, line_no, source) else {
                    continue;
                };

                if let Some(pace) = pace.filter(|_| sent > 0) {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = sleep(pace) => {}
                    }
                }

                trace!(target: "modedial::sources", source, ?gesture, "Parsed gesture");
                if let Err(e) = sender.send(gesture).await {
                    error!(
                        target: "modedial::sources",
                        source, error = %e,
                        "Channel closed while sending gesture; terminating task"
                    );
                    break;
                }
                sent += 1;
            }
            Err(e) => {
                warn!(
                    target: "modedial::sources",
                    source, error = %e,
                    "Error reading input; terminating task"
                );
                break;
            }
        }
    }

    sent
}

/// Parse one input line, logging and dropping malformed ones.
pub(crate) fn parse_logged(line: &str, line_no: usize, source: &'static str) -> Option<Gesture> {
    match parse_line(line)? {
        Ok(gesture) => Some(gesture),
        Err(e) => {
            warn!(
                target: "modedial::sources",
                source, line = line_no, error = %e,
                "Ignoring malformed gesture line"
            );
            None
        }
    }
}
