use crate::error::AppError;
use crate::metadata;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat};
use img_parts::jpeg::{markers, Jpeg};
use img_parts::{Bytes, ImageEXIF};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 95;
pub const DEFAULT_QUALITY: u8 = 70;

/// Appended to the file stem when a request asks for renaming.
pub const RENAME_SUFFIX: &str = "_comp";

// APP1 length field (2) plus the "Exif\0\0" header (6).
const EXIF_SEGMENT_OVERHEAD: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionRequest {
    pub source: PathBuf,
    pub quality: u8,
    pub rename: bool,
    pub destination: Option<PathBuf>,
    /// Must be set for a request whose output would replace the source.
    pub allow_overwrite: bool,
}

impl CompressionRequest {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            quality: DEFAULT_QUALITY,
            rename: false,
            destination: None,
            allow_overwrite: false,
        }
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn rename(mut self, rename: bool) -> Self {
        self.rename = rename;
        self
    }

    pub fn destination(mut self, destination: Option<PathBuf>) -> Self {
        self.destination = destination;
        self
    }

    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Where the compressed file goes: `destination` (or the source's own
    /// directory), the source stem with an optional `_comp` suffix, and the
    /// source's extension.
    pub fn output_path(&self) -> PathBuf {
        let dir = match &self.destination {
            Some(dir) => dir.as_path(),
            None => self.source.parent().unwrap_or_else(|| Path::new("")),
        };
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = if self.rename {
            format!("{}{}", stem, RENAME_SUFFIX)
        } else {
            stem
        };
        if let Some(ext) = self.source.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        dir.join(name)
    }

    /// The output path with its directory resolved through symlinks and
    /// `.`/`..`, for comparing the outputs of different requests. Falls back
    /// to [`output_path`](Self::output_path) when the directory can't be resolved.
    pub fn resolved_output_path(&self) -> PathBuf {
        let output = self.output_path();
        match (
            fs::canonicalize(non_empty_dir(output.parent())),
            output.file_name(),
        ) {
            (Ok(dir), Some(name)) => dir.join(name),
            _ => output,
        }
    }

    /// True when the output path names the source file itself.
    pub fn overwrites_source(&self) -> bool {
        let output = self.output_path();
        if output == self.source {
            return true;
        }
        if output.file_name() != self.source.file_name() {
            return false;
        }
        match (
            fs::canonicalize(non_empty_dir(output.parent())),
            fs::canonicalize(non_empty_dir(self.source.parent())),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// Rejects requests that break the caller contract. Nothing is written
    /// for a request that fails here.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&self.quality) {
            return Err(AppError::Validation(format!(
                "quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, self.quality
            )));
        }
        if let Some(dir) = &self.destination {
            if !dir.is_dir() {
                return Err(AppError::Validation(format!(
                    "destination {:?} is not an existing directory",
                    dir
                )));
            }
        }
        if !self.allow_overwrite && self.overwrites_source() {
            return Err(AppError::Validation(format!(
                "output would overwrite {:?}; enable renaming, choose a destination or allow overwriting",
                self.source
            )));
        }
        Ok(())
    }
}

fn non_empty_dir(dir: Option<&Path>) -> &Path {
    match dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    FileNotFound,
    EncodeFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionResult {
    pub source: PathBuf,
    pub output: PathBuf,
    pub failure: Option<JobFailure>,
}

impl CompressionResult {
    fn succeeded(request: &CompressionRequest, output: PathBuf) -> Self {
        Self {
            source: request.source.clone(),
            output,
            failure: None,
        }
    }

    fn failed(request: &CompressionRequest, output: PathBuf, kind: FailureKind, detail: String) -> Self {
        Self {
            source: request.source.clone(),
            output,
            failure: Some(JobFailure { kind, detail }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct CompressionJob;

impl CompressionJob {
    /// Compresses one image. Contract violations come back as
    /// `Err(AppError::Validation)`; runtime problems with the file itself are
    /// reported inside the returned [`CompressionResult`].
    pub fn run(request: &CompressionRequest) -> Result<CompressionResult, AppError> {
        request.validate()?;
        Ok(Self::execute(request))
    }

    /// Compresses an already validated request. Every problem, including a
    /// destination that vanished since validation, ends up in the result.
    pub fn execute(request: &CompressionRequest) -> CompressionResult {
        let output = request.output_path();
        log::info!("Processing image started for: {:?}", request.source);

        let data = match read_source(&request.source) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Cannot read source {:?}: {}", request.source, e);
                return CompressionResult::failed(
                    request,
                    output,
                    FailureKind::FileNotFound,
                    e.to_string(),
                );
            }
        };

        match compress_to(&data, request.quality, &output) {
            Ok(()) => {
                log::info!("Processing image finished for: {:?} -> {:?}", request.source, output);
                CompressionResult::succeeded(request, output)
            }
            Err(e) => {
                log::warn!("Failed to compress image {:?}: {}", request.source, e);
                CompressionResult::failed(
                    request,
                    output,
                    FailureKind::EncodeFailure,
                    e.to_string(),
                )
            }
        }
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, AppError> {
    if !path.is_file() {
        return Err(AppError::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

fn compress_to(data: &[u8], quality: u8, output: &Path) -> Result<(), AppError> {
    let exif = metadata::raw_bytes_from(data);
    match &exif {
        Some(bytes) => log::debug!("Carrying over {} bytes of EXIF data", bytes.len()),
        None => log::debug!("Source has no EXIF data, output will carry none"),
    }

    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    log::trace!("Decoded {}x{} image", image.width(), image.height());

    let encoded = encode_jpeg(&image, quality)?;
    let encoded = match exif {
        Some(exif) => embed_exif(encoded, exif)?,
        None => encoded,
    };

    write_atomic(output, &encoded)
}

/// Re-encodes `image` as a baseline JPEG. Grayscale sources stay grayscale.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        match image.color() {
            ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
                let luma = image.to_luma8();
                encoder.encode(luma.as_raw(), luma.width(), luma.height(), ColorType::L8)?;
            }
            _ => {
                let rgb = image.to_rgb8();
                encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
            }
        }
    }
    Ok(buf)
}

/// Inserts `exif` as the APP1 segment following the JFIF header of `jpeg`.
pub fn embed_exif(jpeg: Vec<u8>, exif: Vec<u8>) -> Result<Vec<u8>, AppError> {
    if exif.len() + EXIF_SEGMENT_OVERHEAD > usize::from(u16::MAX) {
        return Err(AppError::Encode(format!(
            "EXIF block of {} bytes does not fit in a single APP1 segment",
            exif.len()
        )));
    }

    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg))?;
    jpeg.set_exif(Some(Bytes::from(exif)));

    let segments = jpeg.segments_mut();
    let exif_pos = segments
        .iter()
        .position(|s| s.marker() == markers::APP1 && s.contents().starts_with(b"Exif\0\0"));
    let target = segments
        .iter()
        .position(|s| s.marker() == markers::APP0)
        .map_or(0, |pos| pos + 1);
    if let Some(pos) = exif_pos {
        if pos > target {
            let segment = segments.remove(pos);
            segments.insert(target, segment);
        }
    }

    Ok(jpeg.encoder().bytes().to_vec())
}

/// Writes `data` to a temporary file next to `output`, then renames it into
/// place. On failure the temporary file is removed and `output` is untouched.
///
/// A replaced file keeps its permissions. A new file gets the same mode a
/// plain `File::create` would give it.
pub fn write_atomic(output: &Path, data: &[u8]) -> Result<(), AppError> {
    let dir = non_empty_dir(output.parent());
    let existing = fs::metadata(output).ok().map(|m| m.permissions());

    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut temp_file = builder.tempfile_in(dir)?;
    if let Some(permissions) = existing {
        temp_file.as_file().set_permissions(permissions)?;
    }
    temp_file.write_all(data)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(output).map_err(|e| AppError::Io(e.error))?;
    log::debug!("Wrote {} bytes to {:?}", data.len(), output);
    Ok(())
}
