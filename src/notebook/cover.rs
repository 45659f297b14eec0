use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// A validated cover image, ready to embed in a notebook record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub mime: &'static str,
    pub size: u64,
    pub data_uri: String,
}

#[derive(Debug, Error)]
pub enum CoverError {
    #[error("Image is too large. Maximum size is {}MB.", limit / (1024 * 1024))]
    TooLarge { size: u64, limit: u64 },
    #[error("Please select an image file.")]
    NotAnImage { path: PathBuf },
    #[error("Could not read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Validates and encodes an image file for use as a notebook cover.
///
/// The size limit is checked from metadata before any bytes are read.
pub fn read_cover_image(path: &Path, max_bytes: u64) -> Result<CoverImage, CoverError> {
    let unreadable = |source| CoverError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let size = fs::metadata(path).map_err(unreadable)?.len();
    if size > max_bytes {
        return Err(CoverError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let bytes = fs::read(path).map_err(unreadable)?;
    let mime = guess_image_mime(path)
        .or_else(|| sniff_image_mime(&bytes))
        .ok_or_else(|| CoverError::NotAnImage {
            path: path.to_path_buf(),
        })?;
    Ok(CoverImage {
        mime,
        size,
        data_uri: format!("data:{mime};base64,{}", STANDARD.encode(&bytes)),
    })
}

fn guess_image_mime(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path)
        .first_raw()
        .filter(|mime| mime.starts_with("image/"))
}

// Files without a recognised extension still pass when their header is an image.
fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    const LIMIT: u64 = 5 * 1024 * 1024;

    #[test]
    fn six_megabyte_file_is_rejected_as_too_large() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("huge.png");
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.resize(6 * 1024 * 1024, 0);
        fs::write(&path, bytes)?;

        let err = read_cover_image(&path, LIMIT).unwrap_err();
        assert_matches!(err, CoverError::TooLarge { limit, .. } if limit == LIMIT);
        assert_eq!(err.to_string(), "Image is too large. Maximum size is 5MB.");
        Ok(())
    }

    #[test]
    fn non_image_file_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("notes.txt");
        fs::write(&path, "definitely text")?;

        let err = read_cover_image(&path, LIMIT).unwrap_err();
        assert_matches!(err, CoverError::NotAnImage { .. });
        assert_eq!(err.to_string(), "Please select an image file.");

        let bare = temp.path().join("notes");
        fs::write(&bare, "still text")?;
        assert_matches!(read_cover_image(&bare, LIMIT), Err(CoverError::NotAnImage { .. }));
        Ok(())
    }

    #[test]
    fn image_type_comes_from_the_file_name() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        for (name, mime) in [
            ("scan.tiff", "image/tiff"),
            ("favicon.ico", "image/x-icon"),
            ("Cover.JPG", "image/jpeg"),
        ] {
            let path = temp.path().join(name);
            fs::write(&path, b"opaque image bytes")?;
            assert_eq!(read_cover_image(&path, LIMIT)?.mime, mime, "{name}");
        }
        Ok(())
    }

    #[test]
    fn png_is_encoded_as_data_uri() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("cover.bin");
        fs::write(&path, b"\x89PNG\r\n\x1a\nrest")?;

        let image = read_cover_image(&path, LIMIT)?;
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.size, 12);
        assert!(image.data_uri.starts_with("data:image/png;base64,iVBORw0KGgo"));
        Ok(())
    }

    #[test]
    fn svg_is_recognised_by_extension() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("cover.SVG");
        fs::write(&path, r#"<?xml version="1.0"?><svg xmlns="http://www.w3.org/2000/svg"/>"#)?;
        assert_eq!(read_cover_image(&path, LIMIT)?.mime, "image/svg+xml");
        Ok(())
    }

    #[test]
    fn missing_file_reports_unreadable() {
        let err = read_cover_image(Path::new("/definitely/not/here.png"), LIMIT).unwrap_err();
        assert_matches!(err, CoverError::Unreadable { .. });
    }
}
