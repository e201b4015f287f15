//! Broadcast channel over an append-only event log.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use fs2::FileExt;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use tokenflight_core::{BroadcastChannel, EventEnvelope, EventStream, SessionEvent, StorageError};

use crate::storage::map_io;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Log size past which the next writer starts it over.
pub const DEFAULT_LOG_LIMIT: u64 = 256 * 1024;

/// Session events shared through `<dir>/<name>.jsonl`.
///
/// Each endpoint has its own context id and skips lines it wrote. New
/// lines are picked up by a file watcher, with a polling fallback for
/// filesystems that do not report changes. Once the log passes its size
/// limit the next writer truncates it; readers then start from the top.
#[derive(Debug, Clone)]
pub struct FileChannel {
    id: String,
    dir: PathBuf,
    name: String,
    log_limit: u64,
}

impl FileChannel {
    /// Open channel `name` in `dir`. Names are limited to ASCII letters,
    /// digits, `-` and `_`.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::unavailable(format!(
                "invalid channel name '{}'",
                name
            )));
        }

        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(map_io)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            dir: dir.to_path_buf(),
            name: name.to_string(),
            log_limit: DEFAULT_LOG_LIMIT,
        })
    }

    /// Truncate the log once it reaches `bytes`.
    pub fn with_log_limit(mut self, bytes: u64) -> Self {
        self.log_limit = bytes;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(format!("{}.jsonl", self.name))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.name))
    }

    fn append(&self, envelope: &EventEnvelope) -> Result<(), StorageError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(map_io)?;
        lock_file.lock_exclusive().map_err(map_io)?;

        let line = serde_json::to_string(envelope)
            .map_err(|e| StorageError::unavailable(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .map_err(map_io)?;
        let len = file.metadata().map_err(map_io)?.len();
        if len >= self.log_limit {
            debug!(len, limit = self.log_limit, "event log full, starting over");
            file.set_len(0).map_err(map_io)?;
        }
        writeln!(file, "{}", line).map_err(map_io)?;
        file.sync_data().map_err(map_io)?;

        FileExt::unlock(&lock_file).map_err(map_io)?;
        Ok(())
    }

    fn watch(
        &self,
        tail: Arc<LogTail>,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Option<RecommendedWatcher> {
        let log_name = format!("{}.jsonl", self.name);
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(
                event.kind,
                notify::EventKind::Modify(_) | notify::EventKind::Create(_)
            ) {
                return;
            }
            if event
                .paths
                .iter()
                .any(|p| p.file_name().is_some_and(|n| n == log_name.as_str()))
            {
                tail.read_new(&tx);
            }
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!(error = %e, "file watcher unavailable, polling only");
                return None;
            }
        };
        if let Err(e) = watcher.watch(&self.dir, RecursiveMode::NonRecursive) {
            warn!(error = %e, dir = %self.dir.display(), "failed to watch state directory, polling only");
            return None;
        }
        Some(watcher)
    }
}

impl BroadcastChannel for FileChannel {
    fn publish(&self, event: &SessionEvent) {
        let envelope = EventEnvelope {
            source: self.id.clone(),
            time: Utc::now().to_rfc3339(),
            event: event.clone(),
        };
        match self.append(&envelope) {
            Ok(()) => debug!(kind = event.kind(), "event appended"),
            Err(e) => warn!(kind = event.kind(), error = %e, "failed to append event"),
        }
    }

    /// Events appended after this call. Needs a Tokio runtime.
    fn subscribe(&self) -> Option<EventStream> {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("no async runtime, file broadcast subscription unavailable");
            return None;
        }

        let path = self.log_path();
        let start = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let tail = Arc::new(LogTail {
            path,
            own_id: self.id.clone(),
            position: Mutex::new(start),
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watcher = self.watch(tail.clone(), tx.clone());

        tokio::spawn(async move {
            let _watcher = watcher;
            let mut interval = tokio::time::interval(POLL_INTERVAL);

            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                tail.read_new(&tx);
            }
            trace!("event log poller stopped");
        });

        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Some(Box::pin(stream))
    }
}

/// Read cursor over the event log, shared by the watcher and the poller.
struct LogTail {
    path: PathBuf,
    own_id: String,
    position: Mutex<u64>,
}

impl LogTail {
    fn read_new(&self, tx: &mpsc::UnboundedSender<SessionEvent>) {
        let mut position = self.position.lock().unwrap_or_else(PoisonError::into_inner);

        let Ok(mut file) = File::open(&self.path) else {
            return;
        };
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if len < *position {
            debug!("event log shrank, reading from start");
            *position = 0;
        }
        if file.seek(SeekFrom::Start(*position)).is_err() {
            return;
        }

        let mut buf = String::new();
        if let Err(e) = file.read_to_string(&mut buf) {
            warn!(error = %e, "failed to read event log");
            return;
        }

        // A writer may be mid-line; leave the tail for the next read.
        let Some(end) = buf.rfind('\n') else {
            return;
        };

        for line in buf[..end].lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<EventEnvelope>(line) {
                Ok(envelope) if envelope.source == self.own_id => {}
                Ok(envelope) => {
                    let _ = tx.send(envelope.event);
                }
                Err(e) => warn!(error = %e, "skipping malformed event line"),
            }
        }
        *position += (end + 1) as u64;
    }
}
