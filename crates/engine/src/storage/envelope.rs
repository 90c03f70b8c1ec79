use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const ENVELOPE_FORMAT_VERSION: u32 = 1;

/// On-disk wrapper around an opaque payload. The checksum covers the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEnvelope {
    pub format_version: u32,
    pub checksum_sha256: String,
    pub payload: String,
}

impl SaveEnvelope {
    pub fn wrap(payload: String) -> Self {
        Self {
            format_version: ENVELOPE_FORMAT_VERSION,
            checksum_sha256: checksum_hex(payload.as_bytes()),
            payload,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode envelope '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported envelope format_version {actual} (expected {expected})")]
    UnsupportedVersion { expected: u32, actual: u32 },
    #[error("checksum mismatch in '{path}': expected {expected}, computed {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

pub fn checksum_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    to_hex_lower(&hasher.finalize())
}

/// Replaces the envelope at `path`. Readers see either the previous envelope
/// or the new one, never a partial write.
pub fn write_envelope(path: &Path, payload: String) -> Result<(), StorageError> {
    let envelope = SaveEnvelope::wrap(payload);
    let json = serde_json::to_string_pretty(&envelope).map_err(StorageError::Encode)?;
    commit_envelope(path, json.as_bytes()).map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn commit_envelope(path: &Path, encoded: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = staging_path(path);
    let result = write_synced(&staging, encoded).and_then(|()| fs::rename(&staging, path));
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// `<name>.partial` next to the envelope, so the rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_else(|| OsString::from("envelope"));
    name.push(".partial");
    path.with_file_name(name)
}

/// Returns `Ok(None)` when nothing has been saved at `path` yet.
pub fn read_envelope(path: &Path) -> Result<Option<String>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let envelope: SaveEnvelope =
        serde_json::from_str(&raw).map_err(|source| StorageError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if envelope.format_version != ENVELOPE_FORMAT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            expected: ENVELOPE_FORMAT_VERSION,
            actual: envelope.format_version,
        });
    }

    let actual = checksum_hex(envelope.payload.as_bytes());
    if actual != envelope.checksum_sha256 {
        return Err(StorageError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: envelope.checksum_sha256,
            actual,
        });
    }
    Ok(Some(envelope.payload))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn checksum_is_content_sensitive() {
        assert_ne!(checksum_hex(b"wheat"), checksum_hex(b"corn"));
        assert_eq!(checksum_hex(b"wheat").len(), 64);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let temp = TempDir::new().expect("tempdir");
        let loaded = read_envelope(&temp.path().join("absent.json")).expect("read");
        assert_eq!(loaded, None);
    }

    #[test]
    fn written_payload_reads_back() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        write_envelope(&path, "{\"tick\":3}".to_string()).expect("write");

        let loaded = read_envelope(&path).expect("read");
        assert_eq!(loaded.as_deref(), Some("{\"tick\":3}"));
    }

    #[test]
    fn write_creates_save_dir_and_leaves_no_staging_file() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("saves").join("slot.json");
        write_envelope(&path, "first".to_string()).expect("write");

        assert!(path.is_file());
        assert!(!staging_path(&path).exists());
        assert_eq!(staging_path(&path).file_name(), Some(OsStr::new("slot.json.partial")));
    }

    #[test]
    fn rewrite_replaces_previous_envelope() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        write_envelope(&path, "first".to_string()).expect("write");
        write_envelope(&path, "second".to_string()).expect("overwrite");

        assert_eq!(read_envelope(&path).expect("read").as_deref(), Some("second"));
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn failed_write_keeps_previous_envelope() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        write_envelope(&path, "kept".to_string()).expect("write");
        fs::create_dir(staging_path(&path)).expect("block staging path");

        let error = write_envelope(&path, "lost".to_string()).expect_err("staging is a dir");
        assert!(matches!(error, StorageError::Write { .. }));
        assert_eq!(read_envelope(&path).expect("read").as_deref(), Some("kept"));
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        let mut envelope = SaveEnvelope::wrap("original".to_string());
        envelope.payload = "edited".to_string();
        fs::write(&path, serde_json::to_string(&envelope).expect("encode")).expect("write");

        let error = read_envelope(&path).expect_err("checksum should fail");
        assert!(matches!(error, StorageError::ChecksumMismatch { .. }));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        fs::write(&path, "not json").expect("write");

        let error = read_envelope(&path).expect_err("decode should fail");
        assert!(matches!(error, StorageError::Decode { .. }));
    }

    #[test]
    fn future_format_version_is_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("slot.json");
        let mut envelope = SaveEnvelope::wrap("payload".to_string());
        envelope.format_version = ENVELOPE_FORMAT_VERSION + 1;
        fs::write(&path, serde_json::to_string(&envelope).expect("encode")).expect("write");

        let error = read_envelope(&path).expect_err("version should fail");
        assert!(matches!(error, StorageError::UnsupportedVersion { .. }));
    }
}
