//! Locating and loading the image a tool was pointed at.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::tool::ToolResult;

/// Extensions recognized when digging a path out of free text.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Marker the presentation layer puts in front of the staged path.
const PATH_MARKER: &str = "image path:";

/// Arguments shared by the vision tools.
///
/// Deserializes from `{"image_path": "..."}` or from a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawImagePathArgs")]
pub struct ImagePathArgs {
    /// Path of the image file, or text containing it.
    pub image_path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawImagePathArgs {
    Object { image_path: String },
    Bare(String),
}

impl From<RawImagePathArgs> for ImagePathArgs {
    fn from(raw: RawImagePathArgs) -> Self {
        match raw {
            RawImagePathArgs::Object { image_path } | RawImagePathArgs::Bare(image_path) => {
                Self { image_path }
            }
        }
    }
}

impl ImagePathArgs {
    /// JSON schema advertised to the model.
    pub(crate) fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Path of the image file to analyze"
                }
            },
            "required": ["image_path"]
        })
    }
}

/// An image read from disk, with its sniffed format.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Where the bytes came from.
    pub path: PathBuf,
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Format detected from the file's magic bytes.
    pub format: ImageFormat,
}

impl LoadedImage {
    /// MIME type matching the detected format.
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Pulls an image path out of whatever the model passed.
///
/// Models sometimes forward the whole request instead of the bare path.
/// The input is tried, in order, as an existing path, as text following
/// `image path:`, and as text holding a token with an image extension.
/// Falls back to the trimmed input.
#[must_use]
pub fn extract_path(input: &str) -> PathBuf {
    let trimmed = clean_token(input);
    if Path::new(trimmed).exists() {
        return PathBuf::from(trimmed);
    }

    let lower = input.to_ascii_lowercase();
    if let Some(idx) = lower.rfind(PATH_MARKER) {
        let rest = clean_token(&input[idx + PATH_MARKER.len()..]);
        if !rest.is_empty() {
            return PathBuf::from(rest);
        }
    }

    input
        .split_whitespace()
        .map(clean_token)
        .filter(|token| has_image_extension(token))
        .last()
        .map_or_else(|| PathBuf::from(trimmed), PathBuf::from)
}

fn clean_token(token: &str) -> &str {
    token
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim_end_matches(|c| matches!(c, ',' | ';' | ')' | '!' | '?'))
        .trim_end_matches('.')
}

fn has_image_extension(token: &str) -> bool {
    Path::new(token)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Resolves `input` to a path and reads the image behind it.
///
/// # Errors
///
/// Returns [`ToolError::InvalidImage`] when the file cannot be read or its
/// contents are not a recognized image format.
pub async fn load_image(input: &str) -> ToolResult<LoadedImage> {
    let path = extract_path(input);

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ToolError::invalid_image(format!("cannot read {}: {e}", path.display())))?;

    let format = image::guess_format(&bytes).map_err(|_| {
        ToolError::invalid_image(format!("{} is not a supported image", path.display()))
    })?;

    tracing::debug!(path = %path.display(), ?format, size = bytes.len(), "Loaded image");

    Ok(LoadedImage {
        path,
        bytes,
        format,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn args_from_object_or_bare_string() {
        let object: ImagePathArgs =
            serde_json::from_str(r#"{"image_path": "/tmp/a.png"}"#).unwrap();
        let bare: ImagePathArgs = serde_json::from_str(r#""/tmp/a.png""#).unwrap();
        assert_eq!(object, bare);
        assert_eq!(bare.image_path, "/tmp/a.png");
    }

    #[test]
    fn extract_bare_path() {
        assert_eq!(extract_path(" /tmp/abc.jpg "), PathBuf::from("/tmp/abc.jpg"));
        assert_eq!(extract_path("'/tmp/abc.png'"), PathBuf::from("/tmp/abc.png"));
    }

    #[test]
    fn extract_after_marker() {
        let path = extract_path("What animal is this?, this is the image path: /tmp/tmpa1b2.jpg");
        assert_eq!(path, PathBuf::from("/tmp/tmpa1b2.jpg"));
    }

    #[test]
    fn extract_token_with_extension() {
        let path = extract_path("describe /var/tmp/upload-7.JPEG please");
        assert_eq!(path, PathBuf::from("/var/tmp/upload-7.JPEG"));
    }

    #[test]
    fn extract_falls_back_to_input() {
        assert_eq!(extract_path("no path here"), PathBuf::from("no path here"));
    }

    #[test]
    fn extract_prefers_existing_file() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let raw = file.path().to_str().unwrap();
        assert_eq!(extract_path(raw), file.path());
    }

    #[tokio::test]
    async fn load_sniffs_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbImage::new(2, 2).save(&path).unwrap();

        let loaded = load_image(path.to_str().unwrap()).await.unwrap();
        assert_eq!(loaded.format, ImageFormat::Png);
        assert_eq!(loaded.mime_type(), "image/png");
    }

    #[tokio::test]
    async fn load_rejects_missing_file() {
        let err = load_image("/definitely/not/here.jpg").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn load_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"just some text").unwrap();

        let err = load_image(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("not a supported image"));
    }
}
