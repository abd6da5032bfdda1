// src/metadata.rs

use crate::error::AppError;
use exif::{Context, In, Reader};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decoded EXIF tags of a single image, keyed by descriptive tag name.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    #[serde(flatten)]
    pub tags: BTreeMap<String, String>,
    #[serde(rename = "GPSInfo")]
    pub gps_info: GpsInfo,
}

/// The `GPSInfo` entry. A photo without a GPS block is `Absent`, which is
/// a normal state rather than an error.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(into = "Option<BTreeMap<String, String>>")]
pub enum GpsInfo {
    Present(BTreeMap<String, String>),
    #[default]
    Absent,
}

impl From<GpsInfo> for Option<BTreeMap<String, String>> {
    fn from(value: GpsInfo) -> Self {
        match value {
            GpsInfo::Present(tags) => Some(tags),
            GpsInfo::Absent => None,
        }
    }
}

impl GpsInfo {
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            GpsInfo::Present(tags) => tags.get(name).map(String::as_str),
            GpsInfo::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, GpsInfo::Present(_))
    }
}

impl Metadata {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    Available(Metadata),
    NotAvailable,
}

impl Extracted {
    pub fn into_option(self) -> Option<Metadata> {
        match self {
            Extracted::Available(metadata) => Some(metadata),
            Extracted::NotAvailable => None,
        }
    }
}

/// Reads and decodes the EXIF block of the image at `path`.
///
/// Anything that keeps the block from being read in full (missing file,
/// unsupported container, corrupt data, no EXIF at all) yields
/// [`Extracted::NotAvailable`].
pub fn extract(path: &Path) -> Extracted {
    log::trace!("Extracting EXIF data for image: {:?}", path);
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::debug!("Could not open {:?} for EXIF extraction: {}", path, e);
            return Extracted::NotAvailable;
        }
    };
    let mut buf_reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut buf_reader) {
        Ok(exif) => exif,
        Err(e) => {
            log::debug!("No EXIF data found for {:?}: {}", path, e);
            return Extracted::NotAvailable;
        }
    };

    let mut tags = BTreeMap::new();
    let mut gps = BTreeMap::new();
    for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
        let name = field.tag.to_string();
        let value = field.display_value().with_unit(&exif).to_string();
        log::trace!("{:?}: {} = {}", path, name, value);
        if field.tag.context() == Context::Gps {
            gps.insert(name, value);
        } else {
            tags.insert(name, value);
        }
    }

    let gps_info = if gps.is_empty() {
        GpsInfo::Absent
    } else {
        GpsInfo::Present(gps)
    };
    log::debug!(
        "Extracted {} tags from {:?} (GPS: {})",
        tags.len(),
        path,
        gps_info.is_present()
    );

    Extracted::Available(Metadata { tags, gps_info })
}

/// Returns the EXIF payload of the JPEG at `path` exactly as stored in the
/// file, or `None` when the container holds no EXIF segment.
pub fn raw_bytes(path: &Path) -> Result<Option<Vec<u8>>, AppError> {
    let data = std::fs::read(path)?;
    Ok(raw_bytes_from(&data))
}

/// Same as [`raw_bytes`] for a file already loaded into memory.
pub fn raw_bytes_from(data: &[u8]) -> Option<Vec<u8>> {
    match Jpeg::from_bytes(Bytes::copy_from_slice(data)) {
        Ok(jpeg) => jpeg.exif().map(|exif| exif.to_vec()),
        Err(e) => {
            log::debug!("Not a readable JPEG container, no metadata to carry over: {}", e);
            None
        }
    }
}
