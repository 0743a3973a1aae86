//! Binary assets staged for the next commit.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};

use crate::commit::BatchFile;

/// A binary file waiting to be published with a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub path: String,
    pub base64_content: String,
}

impl StagedAsset {
    pub fn new(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            base64_content: STANDARD.encode(bytes),
        }
    }

    pub fn to_batch_file(&self) -> BatchFile {
        BatchFile::new(self.path.clone(), self.base64_content.clone())
    }
}

/// An image placed under the assets directory plus the markdown that
/// references it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedImage {
    pub asset: StagedAsset,
    pub markdown: String,
}

/// Stages an uploaded image as `<assets_dir>/<millis>-<stem>.<ext>`.
///
/// Returns `None` if `mime` is not an image type.
pub fn stage_image(
    assets_dir: &str,
    original_name: &str,
    mime: &str,
    bytes: &[u8],
    now: DateTime<Utc>,
) -> Option<StagedImage> {
    if !mime.starts_with("image/") {
        return None;
    }

    let ext = image_extension(original_name, mime);
    let stem = original_name
        .rsplit_once('.')
        .map_or(original_name, |(stem, _)| stem);
    let mut base_name = sanitize_file_name(stem);
    if base_name.is_empty() {
        base_name = "image".to_string();
    }

    let file_name = format!("{}-{}.{}", now.timestamp_millis(), base_name, ext);
    let path = format!("{}/{}", assets_dir.trim_end_matches('/'), file_name);

    let public_path = path.strip_prefix("public/").unwrap_or(&path);
    let markdown = format!("\n![{}](/{})\n", base_name, public_path);

    Some(StagedImage {
        asset: StagedAsset::new(path, bytes),
        markdown,
    })
}

/// Lowercases and collapses anything outside `[a-z0-9-_]` into single
/// dashes, trimming dashes at either end.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// MIME type for a local image file, judged by its extension.
pub fn guess_image_mime(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        _ => None,
    }
}

fn image_extension(name: &str, mime: &str) -> String {
    let by_mime = match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        _ => None,
    };
    if let Some(ext) = by_mime {
        return ext.to_string();
    }

    match name.rsplit_once('.') {
        Some((_, ext))
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_lowercase()
        }
        _ => "jpg".to_string(),
    }
}
