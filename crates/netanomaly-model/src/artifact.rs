use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::Digest;

use crate::error::ModelError;
use crate::ubjson;

/// Encoding of a model document on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
    Ubjson,
}

/// Facts about the artifact a model was loaded from.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    /// Path the artifact was read from.
    pub path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Checksum (sha256, lowercase hex).
    pub sha256: String,
    /// Detected encoding.
    pub encoding: Encoding,
}

/// Read an artifact into memory and describe it.
pub fn read_artifact(path: &Path) -> Result<(Vec<u8>, ArtifactInfo), ModelError> {
    let bytes = fs::read(path)?;
    let encoding = detect_encoding(&bytes)?;
    let info = ArtifactInfo {
        path: path.to_path_buf(),
        size_bytes: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
        encoding,
    };
    Ok((bytes, info))
}

/// Compute the SHA256 checksum of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Tell a JSON model document from a UBJSON one by its first bytes.
///
/// Both start with `{`. JSON continues with whitespace, a quoted key or `}`; UBJSON
/// continues with a length marker for the first key or an optimized container header.
pub fn detect_encoding(bytes: &[u8]) -> Result<Encoding, ModelError> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or_else(|| ModelError::UnsupportedFormat("artifact is empty".to_string()))?;

    match bytes[start] {
        b'{' => {}
        0x80 => {
            return Err(ModelError::UnsupportedFormat(
                "artifact looks like a Python pickle; export it with save_model to JSON or UBJSON"
                    .to_string(),
            ));
        }
        other => {
            return Err(ModelError::UnsupportedFormat(format!(
                "artifact starts with byte 0x{other:02x}, expected a JSON or UBJSON document"
            )));
        }
    }

    let next = bytes[start + 1..]
        .iter()
        .copied()
        .find(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
    match next {
        Some(b'"') | Some(b'}') | None => Ok(Encoding::Json),
        Some(marker) if ubjson::is_marker(marker) => Ok(Encoding::Ubjson),
        Some(other) => Err(ModelError::UnsupportedFormat(format!(
            "unexpected byte 0x{other:02x} after opening brace"
        ))),
    }
}
