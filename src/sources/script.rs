//! Script gesture source.
//!
//! Replays a file of gesture lines (same grammar as stdin), optionally pacing
//! them `delay_ms` apart so a connected UI can be watched stepping through.
//! A missing or unreadable file is logged and the task ends without sending.

use std::path::PathBuf;
use std::time::Duration;

use tokio::{fs::File, io::BufReader, sync::mpsc::Sender, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{Gesture, GestureSource, pump_lines};

/// Source that replays a gesture script.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    path: PathBuf,
    delay_ms: u64,
}

impl ScriptSource {
    /// Create a new `ScriptSource`. `delay_ms = 0` replays without pauses.
    pub fn new(path: impl Into<PathBuf>, delay_ms: u64) -> Self {
        Self {
            path: path.into(),
            delay_ms,
        }
    }

    fn pace(&self) -> Option<Duration> {
        (self.delay_ms > 0).then(|| Duration::from_millis(self.delay_ms))
    }
}

impl GestureSource for ScriptSource {
    fn name(&self) -> &'static str {
        "script"
    }

    fn start(&self, sender: Sender<Gesture>, cancel: CancellationToken) -> JoinHandle<()> {
        let path = self.path.clone();
        let pace = self.pace();

        tokio::spawn(async move {
            info!(
                target: "modedial::sources",
                path = %path.display(), delay_ms = pace.map_or(0, |d| d.as_millis() as u64),
                "ScriptSource task started"
            );

            let file = match File::open(&path).await {
                Ok(file) => file,
                Err(e) => {
                    error!(
                        target: "modedial::sources",
                        path = %path.display(), error = %e,
                        "Failed to open gesture script"
                    );
                    return;
                }
            };

            let sent = pump_lines(BufReader::new(file), &sender, &cancel, pace, "script").await;
            info!(
                target: "modedial::sources",
                path = %path.display(), sent,
                "ScriptSource task ended"
            );
        })
    }
}
