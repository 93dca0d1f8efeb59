//! Persisting packets into source images.

use crate::error::XmpError;
use crate::jpeg::inject_jpeg;
use crate::XMP_HEADER;
use std::path::Path;

/// How a packet ended up in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Spliced into the JPEG header as an APP1 segment.
    Injected,
    /// Appended after the image data, where byte scanners still find it.
    Appended,
}

/// `data` followed by the XMP header and `packet`.
pub fn append_trailer(data: &[u8], packet: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + XMP_HEADER.len() + packet.len());
    out.extend_from_slice(data);
    out.extend_from_slice(XMP_HEADER);
    out.extend_from_slice(packet.as_bytes());
    out
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
        .unwrap_or(false)
}

/// Write `packet` into the image at `path`.
///
/// JPEG files get a proper APP1 segment; when the splice fails, and for every
/// other format, the packet is appended as a trailer instead.
pub fn write_xmp_to_source(path: &Path, packet: &str) -> Result<WriteOutcome, XmpError> {
    let data = std::fs::read(path)?;

    if is_jpeg_path(path) {
        match inject_jpeg(&data, packet) {
            Ok(spliced) => {
                std::fs::write(path, spliced)?;
                tracing::debug!(path = %path.display(), "injected XMP segment");
                return Ok(WriteOutcome::Injected);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "JPEG splice failed, appending XMP trailer");
            }
        }
    }

    std::fs::write(path, append_trailer(&data, packet))?;
    tracing::debug!(path = %path.display(), "appended XMP trailer");
    Ok(WriteOutcome::Appended)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_trailer() {
        let out = append_trailer(b"PNGDATA", "<x/>");
        assert!(out.starts_with(b"PNGDATA"));
        assert!(out.ends_with(b"http://ns.adobe.com/xap/1.0/\0<x/>"));
    }

    #[test]
    fn test_write_jpeg_is_injected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anna_1.JPG");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();

        assert_eq!(write_xmp_to_source(&path, "<x/>").unwrap(), WriteOutcome::Injected);
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[2..4], &[0xFF, 0xE1]);
        assert!(data.ends_with(&[0xFF, 0xD9]));
    }

    #[test]
    fn test_write_broken_jpeg_falls_back_to_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        assert_eq!(write_xmp_to_source(&path, "<x/>").unwrap(), WriteOutcome::Appended);
        let data = std::fs::read(&path).unwrap();
        assert!(data.starts_with(b"not a jpeg"));
        assert!(data.ends_with(b"<x/>"));
    }

    #[test]
    fn test_write_png_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ben.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        assert_eq!(write_xmp_to_source(&path, "<x/>").unwrap(), WriteOutcome::Appended);
    }

    #[test]
    fn test_write_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_xmp_to_source(&dir.path().join("gone.jpg"), "<x/>").unwrap_err();
        assert!(matches!(err, XmpError::Io(_)));
    }
}
