use anyhow::Result;
use imgcomp::metadata::{self, Extracted};
use imgcomp::processor::{CompressionJob, CompressionRequest, FailureKind};
use imgcomp::AppError;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

mod common;

#[test]
fn test_every_quality_in_range_produces_a_decodable_jpeg() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("photo.jpg");
    common::write_plain_jpeg(&source, 1);

    for quality in [1, 2, 25, 50, 70, 90, 95] {
        let request = CompressionRequest::new(&source).rename(true).quality(quality);
        let result = CompressionJob::run(&request)?;
        assert!(result.is_success(), "quality {}: {:?}", quality, result.failure);

        let decoded = image::open(&result.output)?;
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
    Ok(())
}

#[test]
fn test_out_of_range_quality_writes_nothing() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("photo.jpg");
    common::write_plain_jpeg(&source, 1);

    for quality in [0, 96] {
        let request = CompressionRequest::new(&source).rename(true).quality(quality);
        let output = request.output_path();
        assert!(matches!(
            CompressionJob::run(&request),
            Err(AppError::Validation(_))
        ));
        assert!(!output.exists());
    }
    Ok(())
}

#[test]
fn test_rename_appends_comp_suffix() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("IMG_0042.JPG");
    common::write_plain_jpeg(&source, 2);

    let result = CompressionJob::run(&CompressionRequest::new(&source).rename(true))?;
    assert!(result.is_success());
    assert_eq!(result.output, dir.path().join("IMG_0042_comp.JPG"));
    assert!(result.output.exists());
    Ok(())
}

#[test]
fn test_allowed_overwrite_replaces_source_in_place() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("photo.jpg");
    common::write_plain_jpeg(&source, 3);
    let before = fs::read(&source)?;

    let request = CompressionRequest::new(&source).quality(20).allow_overwrite(true);
    let result = CompressionJob::run(&request)?;
    assert!(result.is_success());
    assert_eq!(result.output, source);

    let after = fs::read(&source)?;
    assert_ne!(before, after);
    image::load_from_memory(&after)?;

    let leftovers: Vec<_> = fs::read_dir(dir.path())?.collect();
    assert_eq!(leftovers.len(), 1);
    Ok(())
}

#[test]
fn test_destination_directory_receives_output() -> Result<()> {
    let dir = tempdir()?;
    let out = tempdir()?;
    let source = dir.path().join("photo.jpeg");
    common::write_plain_jpeg(&source, 4);

    let request = CompressionRequest::new(&source).destination(Some(out.path().to_path_buf()));
    let result = CompressionJob::run(&request)?;
    assert!(result.is_success());
    assert_eq!(result.output, out.path().join("photo.jpeg"));
    assert!(result.output.exists());
    Ok(())
}

#[test]
fn test_exif_bytes_survive_compression() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("gps.jpg");
    let exif = common::sample_exif();
    common::write_jpeg_with_exif(&source, 5, &exif);
    assert_eq!(metadata::raw_bytes(&source)?, Some(exif.clone()));

    let result = CompressionJob::run(&CompressionRequest::new(&source).rename(true).quality(30))?;
    assert!(result.is_success());
    assert_eq!(metadata::raw_bytes(&result.output)?, Some(exif));

    let Extracted::Available(meta) = metadata::extract(&result.output) else {
        panic!("metadata should be readable after compression");
    };
    assert!(meta.get("Make").unwrap().contains("Acme"));
    assert!(meta.gps_info.get("GPSLatitudeRef").unwrap().contains('N'));
    Ok(())
}

#[test]
fn test_source_without_exif_still_compresses() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("plain.jpg");
    common::write_plain_jpeg(&source, 6);
    assert_eq!(metadata::extract(&source), Extracted::NotAvailable);

    let result = CompressionJob::run(&CompressionRequest::new(&source).rename(true))?;
    assert!(result.is_success());
    assert_eq!(metadata::raw_bytes(&result.output)?, None);
    assert_eq!(metadata::extract(&result.output), Extracted::NotAvailable);
    Ok(())
}

#[test]
fn test_missing_source_is_file_not_found() -> Result<()> {
    let dir = tempdir()?;
    let request = CompressionRequest::new(dir.path().join("ghost.jpg")).rename(true);
    let result = CompressionJob::run(&request)?;

    let failure = result.failure.expect("missing source must fail");
    assert_eq!(failure.kind, FailureKind::FileNotFound);
    assert!(!result.output.exists());
    Ok(())
}

#[test]
fn test_corrupt_source_is_encode_failure_and_leaves_no_output() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("broken.jpg");
    fs::write(&source, b"definitely not a jpeg")?;

    let result = CompressionJob::run(&CompressionRequest::new(&source).rename(true))?;
    let failure = result.failure.clone().expect("corrupt source must fail");
    assert_eq!(failure.kind, FailureKind::EncodeFailure);
    assert!(!result.output.exists());
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn test_repeated_runs_are_bit_identical() -> Result<()> {
    let dir = tempdir()?;
    let source = dir.path().join("photo.jpg");
    common::write_jpeg_with_exif(&source, 7, &common::sample_exif());
    let request = CompressionRequest::new(&source).rename(true).quality(60);

    let first = CompressionJob::run(&request)?;
    let first_bytes = fs::read(&first.output)?;
    let second = CompressionJob::run(&request)?;
    let second_bytes = fs::read(&second.output)?;

    assert_eq!(first.output, second.output);
    assert!(first_bytes == second_bytes, "outputs differ between runs");
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_output_permissions_follow_normal_file_creation() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = |p: &std::path::Path| -> Result<u32> { Ok(fs::metadata(p)?.permissions().mode() & 0o777) };

    let dir = tempdir()?;
    let source = dir.path().join("photo.jpg");
    common::write_plain_jpeg(&source, 8);
    fs::set_permissions(&source, fs::Permissions::from_mode(0o644))?;
    let reference = dir.path().join("reference.txt");
    fs::write(&reference, b"x")?;

    let renamed = CompressionJob::run(&CompressionRequest::new(&source).rename(true))?;
    assert!(renamed.is_success());
    assert_eq!(mode(&renamed.output)?, mode(&reference)?);

    let replaced = CompressionJob::run(&CompressionRequest::new(&source).allow_overwrite(true))?;
    assert!(replaced.is_success());
    assert_eq!(mode(&source)?, 0o644);
    Ok(())
}
