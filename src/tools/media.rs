/// Local media files sent inline to the model
///
/// Checks run before the file is read: it must exist, be a regular file,
/// fit the size limit and have a known extension.

use crate::config::{
    mime_type_for, MAX_AUDIO_SIZE_MB, MAX_IMAGE_SIZE_MB, SUPPORTED_AUDIO_MIMES,
    SUPPORTED_IMAGE_MIMES,
};
use crate::error::{GeminiError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::Path;

pub(crate) struct MediaKind {
    pub label: &'static str,
    pub max_size_mb: u64,
    pub mimes: &'static [(&'static str, &'static str)],
}

pub(crate) const AUDIO: MediaKind = MediaKind {
    label: "audio",
    max_size_mb: MAX_AUDIO_SIZE_MB,
    mimes: SUPPORTED_AUDIO_MIMES,
};

pub(crate) const IMAGE: MediaKind = MediaKind {
    label: "image",
    max_size_mb: MAX_IMAGE_SIZE_MB,
    mimes: SUPPORTED_IMAGE_MIMES,
};

#[derive(Debug)]
pub(crate) struct MediaFile {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl MediaFile {
    pub fn size_kb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0
    }

    pub fn encoded(&self) -> String {
        BASE64.encode(&self.bytes)
    }
}

pub(crate) async fn load_media(file_path: &str, kind: &MediaKind) -> Result<MediaFile> {
    let path = Path::new(file_path);

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| GeminiError::InvalidArgument(format!("File not found: {}", file_path)))?;
    if !metadata.is_file() {
        return Err(GeminiError::InvalidArgument(format!("Not a file: {}", file_path)));
    }

    if metadata.len() > kind.max_size_mb * 1024 * 1024 {
        let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
        return Err(GeminiError::InvalidArgument(format!(
            "File size {:.2}MB exceeds maximum allowed size of {}MB",
            size_mb, kind.max_size_mb
        )));
    }

    let mime_type = mime_type_for(path, kind.mimes).ok_or_else(|| {
        let supported: Vec<&str> = kind.mimes.iter().map(|(ext, _)| *ext).collect();
        GeminiError::InvalidArgument(format!(
            "Unsupported {} format for {}. Supported extensions: {}",
            kind.label,
            file_path,
            supported.join(", ")
        ))
    })?;

    let bytes = tokio::fs::read(path).await?;
    Ok(MediaFile { bytes, mime_type })
}

/// Upper-cased extension for result headers
pub(crate) fn format_label(file_path: &str) -> String {
    Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_uppercase()
}
