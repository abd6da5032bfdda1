use crate::audit_log::{AuditLog, LogEntry};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::processor::{CompressionJob, CompressionRequest, CompressionResult, JobFailure};
use crate::walker;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stops a running batch before its next file. The file being written when
/// the token is triggered is always finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Request settings shared by every file of a folder job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    pub quality: u8,
    pub rename: bool,
    pub destination: Option<PathBuf>,
    pub allow_overwrite: bool,
}

impl JobTemplate {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            rename: false,
            destination: None,
            allow_overwrite: false,
        }
    }

    pub fn request_for(&self, source: impl Into<PathBuf>) -> CompressionRequest {
        CompressionRequest::new(source)
            .quality(self.quality)
            .rename(self.rename)
            .destination(self.destination.clone())
            .allow_overwrite(self.allow_overwrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFailure {
    pub output: PathBuf,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<CompressionResult>,
    /// Audit log writes that failed. The matching images were still written.
    pub log_failures: Vec<LogFailure>,
    /// Sources left untouched because the batch was cancelled.
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &JobFailure)> {
        self.results
            .iter()
            .filter_map(|r| r.failure.as_ref().map(|f| (r.source.as_path(), f)))
    }
}

pub struct JobRunner {
    audit_log: AuditLog,
    default_quality: u8,
    cancel: CancelToken,
}

impl JobRunner {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            audit_log: AuditLog::new(config.resolved_log_file()),
            default_quality: config.default_quality,
            cancel: CancelToken::default(),
        }
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// A template preloaded with the configured default quality.
    pub fn template(&self) -> JobTemplate {
        JobTemplate::new(self.default_quality)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn run_single(&self, request: CompressionRequest) -> Result<BatchOutcome, AppError> {
        self.run_many(vec![request])
    }

    /// Processes `requests` in order. Every request is validated up front, so
    /// a malformed one, or two requests writing the same output, fails the
    /// whole call before any file is touched.
    pub fn run_many(&self, requests: Vec<CompressionRequest>) -> Result<BatchOutcome, AppError> {
        let mut outputs: HashMap<PathBuf, PathBuf> = HashMap::new();
        for request in &requests {
            request.validate()?;
            if let Some(other) = outputs.insert(request.resolved_output_path(), request.source.clone()) {
                return Err(AppError::Validation(format!(
                    "{:?} and {:?} would both be written to {:?}",
                    other,
                    request.source,
                    request.output_path()
                )));
            }
        }
        log::info!("Starting batch of {} image(s)", requests.len());

        let mut outcome = BatchOutcome::default();
        let mut pending = requests.into_iter();
        while let Some(request) = pending.next() {
            if self.cancel.is_cancelled() {
                log::warn!("Batch cancelled, skipping remaining images");
                outcome.cancelled = true;
                outcome.skipped.push(request.source);
                outcome.skipped.extend(pending.by_ref().map(|r| r.source));
                break;
            }

            let result = CompressionJob::execute(&request);
            if result.is_success() {
                if let Err(e) = self.audit_log.append(&LogEntry::now(&result.output)) {
                    log::warn!("{}", e);
                    outcome.log_failures.push(LogFailure {
                        output: result.output.clone(),
                        detail: e.to_string(),
                    });
                }
            }
            outcome.results.push(result);
        }

        log::info!(
            "Batch finished: {} attempted, {} succeeded, {} failed",
            outcome.attempted(),
            outcome.succeeded(),
            outcome.failed()
        );
        Ok(outcome)
    }

    pub fn run_folder(
        &self,
        folder: &Path,
        recursive: bool,
        template: &JobTemplate,
    ) -> Result<BatchOutcome, AppError> {
        let requests = walker::list_images(folder, recursive)?
            .into_iter()
            .map(|path| template.request_for(path))
            .collect();
        self.run_many(requests)
    }
}
