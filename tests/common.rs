use image::{ImageBuffer, Rgb};
use imgcomp::config::AppConfig;
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use std::{fs, path::Path, path::PathBuf};

/// Little-endian TIFF payload with a `Make` tag and a GPS sub-IFD holding
/// `GPSLatitudeRef = N`.
#[allow(dead_code)]
pub fn sample_exif() -> Vec<u8> {
    build_exif(true)
}

/// Same payload without the GPS sub-IFD.
#[allow(dead_code)]
pub fn sample_exif_without_gps() -> Vec<u8> {
    build_exif(false)
}

#[allow(dead_code)]
fn build_exif(with_gps: bool) -> Vec<u8> {
    let entries: u16 = if with_gps { 2 } else { 1 };
    let make_offset = 8 + 2 + 12 * u32::from(entries) + 4;
    let gps_offset = make_offset + 6;

    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());

    tiff.extend_from_slice(&entries.to_le_bytes());
    push_entry(&mut tiff, 0x010F, 2, 5, make_offset); // Make, ASCII
    if with_gps {
        push_entry(&mut tiff, 0x8825, 4, 1, gps_offset); // GPS IFD pointer
    }
    tiff.extend_from_slice(&0u32.to_le_bytes());

    tiff.extend_from_slice(b"Acme\0\0");

    if with_gps {
        tiff.extend_from_slice(&1u16.to_le_bytes());
        push_entry(&mut tiff, 0x0001, 2, 2, u32::from_le_bytes(*b"N\0\0\0")); // GPSLatitudeRef
        tiff.extend_from_slice(&0u32.to_le_bytes());
    }

    tiff
}

#[allow(dead_code)]
fn push_entry(buf: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: u32) {
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&kind.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
}

#[allow(dead_code)]
pub fn jpeg_bytes(seed: u8) -> Vec<u8> {
    let img = ImageBuffer::from_fn(64, 48, |x, y| {
        Rgb([(x * 4) as u8, (y * 5) as u8, seed.wrapping_mul(37)])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 95)
        .encode(img.as_raw(), img.width(), img.height(), image::ColorType::Rgb8)
        .unwrap();
    buf
}

#[allow(dead_code)]
pub fn write_plain_jpeg(path: &Path, seed: u8) {
    fs::write(path, jpeg_bytes(seed)).unwrap();
}

#[allow(dead_code)]
pub fn write_jpeg_with_exif(path: &Path, seed: u8, exif: &[u8]) {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_bytes(seed))).unwrap();
    jpeg.set_exif(Some(Bytes::copy_from_slice(exif)));
    fs::write(path, jpeg.encoder().bytes()).unwrap();
}

#[allow(dead_code)]
pub fn test_config(log_file: PathBuf) -> AppConfig {
    AppConfig {
        log_file: Some(log_file),
        ..AppConfig::default()
    }
}

#[allow(dead_code)]
pub fn log_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
