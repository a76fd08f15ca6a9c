use crate::config::types::SpoolConfig;
use crate::decode::EncodingHint;
use crate::pipeline::{self, PipelineError};
use crate::sink::Sender;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const PROCESSING_DIR: &str = "processing";
const PROCESSED_DIR: &str = "processed";
const FAILED_DIR: &str = "failed";

/// Watches a spool directory for newly written flow-log documents and runs
/// one pipeline invocation per file.
///
/// A file is claimed by renaming it into `processing/` before it is read, so
/// a concurrent worker on the same directory cannot pick it up twice. After
/// the invocation the file lands in `processed/` or `failed/`. Document
/// failures are terminal for that file only; the watcher keeps going.
pub struct SpoolRunner<S: Sender> {
    config: SpoolConfig,
    max_events: usize,
    sender: S,
}

impl<S: Sender> SpoolRunner<S> {
    pub fn new(config: SpoolConfig, max_events: usize, sender: S) -> Self {
        Self {
            config,
            max_events,
            sender,
        }
    }

    /// Poll the spool directory until cancelled, or once when `once` is set.
    pub async fn run(&self, once: bool) -> Result<(), SpoolError> {
        self.ensure_layout()?;

        loop {
            let processed = self.sweep().await?;
            if once {
                tracing::info!(files = processed, "single sweep complete");
                return Ok(());
            }
            if processed == 0 {
                sleep(self.config.poll_interval).await;
            }
        }
    }

    fn ensure_layout(&self) -> Result<(), SpoolError> {
        for dir in [PROCESSING_DIR, PROCESSED_DIR, FAILED_DIR] {
            std::fs::create_dir_all(self.config.path.join(dir))?;
        }
        Ok(())
    }

    /// Process every document currently in the spool, in name order.
    /// Returns the number of files handled.
    async fn sweep(&self) -> Result<usize, SpoolError> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.config.path)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        let mut handled = 0;
        for path in entries {
            if let Some(claimed) = self.claim(&path)? {
                self.process_file(&claimed).await;
                handled += 1;
            }
        }

        Ok(handled)
    }

    /// Atomically move the file into `processing/`. Returns None if another
    /// worker claimed it first.
    fn claim(&self, path: &Path) -> Result<Option<PathBuf>, SpoolError> {
        let name = match path.file_name() {
            Some(name) => name,
            None => return Ok(None),
        };
        let claimed = self.config.path.join(PROCESSING_DIR).join(name);

        match std::fs::rename(path, &claimed) {
            Ok(()) => Ok(Some(claimed)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn process_file(&self, path: &Path) {
        let invocation_id = Uuid::new_v4();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(%invocation_id, document = %name, "processing flow-log document");

        let destination = if self.run_invocation(path, &name).await {
            PROCESSED_DIR
        } else {
            FAILED_DIR
        };

        let target = self.config.path.join(destination).join(&name);
        if let Err(e) = std::fs::rename(path, &target) {
            tracing::error!(%invocation_id, document = %name, error = %e, "failed to move document out of processing");
        }
    }

    /// One pipeline invocation, with the configured per-document deadline.
    /// On timeout the in-flight work is dropped; already-dispatched batches
    /// stay dispatched and no partial batch is force-flushed. Returns whether
    /// the document was processed successfully.
    async fn run_invocation(&self, path: &Path, name: &str) -> bool {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(document = %name, error = %e, "failed to read document");
                return false;
            }
        };

        let hint = EncodingHint::from_name(name);
        let invocation =
            pipeline::process_document(&bytes, hint, self.max_events, &self.sender);

        let result = match self.config.document_timeout {
            Some(deadline) => match timeout(deadline, invocation).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(document = %name, ?deadline, "document processing deadline exceeded");
                    return false;
                }
            },
            None => invocation.await,
        };

        match result {
            Ok(outcome) => {
                if outcome.tuples_skipped > 0 {
                    tracing::warn!(
                        document = %name,
                        tuples_skipped = outcome.tuples_skipped,
                        "document processed with skipped tuples"
                    );
                }
                true
            }
            Err(PipelineError::Delivery(e)) => {
                tracing::error!(document = %name, error = %e, "delivery failed, document will need redelivery");
                false
            }
            Err(e) => {
                tracing::error!(document = %name, error = %e, "document rejected");
                false
            }
        }
    }
}
