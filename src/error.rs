use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Could not write audit log: {0}")]
    LogWrite(String),
}

impl From<img_parts::Error> for AppError {
    fn from(e: img_parts::Error) -> Self {
        AppError::Encode(e.to_string())
    }
}
