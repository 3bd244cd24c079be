//! Stdin gesture source.
//!
//! Reads gesture lines from standard input, so the simulator can be driven by
//! hand or from a shell pipeline:
//!     printf 'l\nr\nr\ns\n' | modedial
//!
//! The blocking read runs on a dedicated OS thread, never on tokio's blocking
//! pool, which the runtime joins at shutdown. On cancellation the thread is
//! detached and dies with the process.
//!
//! Malformed lines are logged with `warn!` and skipped. EOF, a closed channel
//! or cancellation end the task.

use std::io::{self, BufRead, BufReader};
use std::thread;

use tokio::{
    sync::{mpsc::Sender, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::{Gesture, GestureSource, parse_logged};

/// Source that reads gestures from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl GestureSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<Gesture>, cancel: CancellationToken) -> JoinHandle<()> {
        info!(target: "modedial::sources", "StdinSource task started (reading lines)");
        spawn_line_reader(BufReader::new(io::stdin()), sender, cancel, "stdin")
    }
}

/// Read gesture lines from a blocking `reader` on its own thread.
///
/// The returned task completes when the reader finishes or `cancel` fires,
/// whichever comes first; it never waits on a read in progress.
pub(crate) fn spawn_line_reader<R>(
    reader: R,
    sender: Sender<Gesture>,
    cancel: CancellationToken,
    source: &'static str,
) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    let (done_tx, done_rx) = oneshot::channel::<usize>();
    let thread_cancel = cancel.clone();

    let spawned = thread::Builder::new()
        .name(format!("modedial-{source}"))
        .spawn(move || {
            let sent = read_lines_blocking(reader, &sender, &thread_cancel, source);
            let _ = done_tx.send(sent);
        });

    if let Err(e) = spawned {
        error!(
            target: "modedial::sources",
            source, error = %e,
            "Failed to spawn reader thread"
        );
    }

    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(target: "modedial::sources", source, "Cancelled; reader thread detached");
            }
            sent = done_rx => {
                trace!(target: "modedial::sources", source, sent = sent.unwrap_or(0), "Reader thread ended");
            }
        }
    })
}

fn read_lines_blocking<R: BufRead>(
    reader: R,
    sender: &Sender<Gesture>,
    cancel: &CancellationToken,
    source: &'static str,
) -> usize {
    let mut sent = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(
                    target: "modedial::sources",
                    source, error = %e,
                    "Error reading input; terminating task"
                );
                break;
            }
        };
        let Some(gesture) = parse_logged(&line, idx + 1, source) else {
            continue;
        };
        if sender.blocking_send(gesture).is_err() {
            error!(
                target: "modedial::sources",
                source,
                "Channel closed while sending gesture; terminating task"
            );
            break;
        }
        sent += 1;
    }

    if !cancel.is_cancelled() {
        info!(target: "modedial::sources", source, sent, "End of input");
    }
    sent
}
