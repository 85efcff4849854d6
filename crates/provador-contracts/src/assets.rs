use std::fmt;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AssetError;

/// An uploaded or generated image. Immutable once built; clones share bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    bytes: Arc<[u8]>,
    mime_type: String,
    label: String,
}

/// Base64 payload plus MIME type, the shape exchanged with the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl ImageAsset {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        mime_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self, AssetError> {
        let bytes = bytes.into();
        let mime_type = mime_type.into().trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") {
            return Err(AssetError::NotAnImage { mime_type });
        }
        if bytes.is_empty() {
            return Err(AssetError::Empty);
        }
        Ok(Self {
            bytes: Arc::from(bytes),
            mime_type,
            label: label.into(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, AssetError> {
        let mime_type = mime_for_path(path).ok_or_else(|| AssetError::NotAnImage {
            mime_type: path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("unknown")
                .to_string(),
        })?;
        let bytes = std::fs::read(path).map_err(|err| AssetError::Io {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        let label = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        Self::new(bytes, mime_type, label)
    }

    pub fn from_base64(
        data: &str,
        mime_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self, AssetError> {
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .map_err(|err| AssetError::Decode(err.to_string()))?;
        Self::new(bytes, mime_type, label)
    }

    /// Parses `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str, label: impl Into<String>) -> Result<Self, AssetError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| AssetError::Decode("missing data: prefix".to_string()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AssetError::Decode("missing payload separator".to_string()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| AssetError::Decode("only base64 data urls are supported".to_string()))?;
        Self::from_base64(payload, mime_type, label)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Display handle shown next to the image (file name or generated name).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn encode(&self) -> EncodedImage {
        EncodedImage {
            data: BASE64.encode(&self.bytes),
            mime_type: self.mime_type.clone(),
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }

    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        hex::encode(&digest[..6])
    }

    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("label", &self.label)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl EncodedImage {
    pub fn decode(&self, label: impl Into<String>) -> Result<ImageAsset, AssetError> {
        ImageAsset::from_base64(&self.data, self.mime_type.clone(), label)
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}
