//! Batch JPEG compression that keeps the original EXIF block.
//!
//! Images are discovered by [`walker`], re-encoded by [`processor`] with
//! their raw EXIF payload carried over (see [`metadata`]), and every written
//! file is recorded in the [`audit_log`]. [`runner::JobRunner`] ties these
//! together for single files, file lists and folders.

pub mod audit_log;
pub mod config;
pub mod error;
pub mod metadata;
pub mod processor;
pub mod runner;
pub mod walker;

pub use error::AppError;
pub use processor::{CompressionJob, CompressionRequest, CompressionResult};
pub use runner::{BatchOutcome, JobRunner, JobTemplate};
