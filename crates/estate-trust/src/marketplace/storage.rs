use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mime::Mime;

use super::domain::{UploadedFile, UserId};
use crate::config::{ServerConfig, StorageConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("object storage write failed for {key}: {reason}")]
    Backend { key: String, reason: String },
}

/// Outbound object storage for listing images and identity documents.
pub trait ObjectStorage: Debug + Send + Sync {
    fn put(&self, key: &str, bytes: &[u8], content_type: &Mime)
        -> Result<StoredObject, UploadError>;
}

/// Prefix of the object key; mirrors the two upload flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadScope {
    PropertyImage,
    KycDocument,
}

impl UploadScope {
    fn prefix(self) -> &'static str {
        match self {
            UploadScope::PropertyImage => "properties",
            UploadScope::KycDocument => "kyc",
        }
    }
}

/// `<scope>/<user>-<millis>-<upload id>-<file name with whitespace dashed>`
///
/// `upload_id` keeps same-named files from one batch apart.
pub fn object_key(
    scope: UploadScope,
    owner: &UserId,
    upload_id: &str,
    file_name: &str,
    at: DateTime<Utc>,
) -> String {
    let sanitized: String = file_name
        .trim()
        .chars()
        .map(|ch| match ch {
            '/' | '\\' => '_',
            ch if ch.is_whitespace() => '-',
            ch => ch,
        })
        .collect();

    format!(
        "{}/{}-{}-{}-{}",
        scope.prefix(),
        owner,
        at.timestamp_millis(),
        upload_id,
        sanitized
    )
}

/// Declared content type when it parses, otherwise a guess from the file name.
pub fn content_type_of(file: &UploadedFile) -> Mime {
    file.content_type
        .as_deref()
        .and_then(|raw| raw.parse::<Mime>().ok())
        .filter(|mime| *mime != mime::APPLICATION_OCTET_STREAM)
        .unwrap_or_else(|| mime_guess::from_path(&file.file_name).first_or_octet_stream())
}

/// Writes objects below a directory and links them under a public base URL.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(storage: &StorageConfig, server: &ServerConfig) -> Self {
        Self::new(storage.upload_dir.clone(), storage.base_url_for(server))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &Mime,
    ) -> Result<StoredObject, UploadError> {
        let backend = |err: std::io::Error| UploadError::Backend {
            key: key.to_string(),
            reason: err.to_string(),
        };

        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(backend)?;
        }
        fs::write(&path, bytes).map_err(backend)?;

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{}", self.public_base_url, key),
        })
    }
}

/// Keeps uploads in memory; used by the demo command and the test suites.
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStorage {
    objects: Arc<Mutex<Vec<(String, Mime, usize)>>>,
    fail_after: Arc<Mutex<Option<usize>>>,
}

impl MemoryObjectStorage {
    /// Lets `successful` more uploads through, then fails every later one.
    pub fn fail_after(&self, successful: usize) {
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = Some(successful);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.iter().map(|(key, _, _)| key.clone()).collect())
            .unwrap_or_default()
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &Mime,
    ) -> Result<StoredObject, UploadError> {
        let unavailable = |reason: &str| UploadError::Backend {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let mut budget = self
            .fail_after
            .lock()
            .map_err(|_| unavailable("storage mutex poisoned"))?;
        match budget.as_mut() {
            Some(0) => return Err(unavailable("storage offline")),
            Some(remaining) => *remaining -= 1,
            None => {}
        }
        drop(budget);

        self.objects
            .lock()
            .map_err(|_| unavailable("storage mutex poisoned"))?
            .push((key.to_string(), content_type.clone(), bytes.len()));

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("memory://{key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn object_key_dashes_whitespace_and_strips_separators() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).single().expect("valid");
        let key = object_key(
            UploadScope::PropertyImage,
            &UserId::from("u1"),
            "img7",
            " front view/../x.jpg",
            at,
        );
        assert_eq!(key, "properties/u1-1700000000123-img7-front-view_.._x.jpg");
    }

    #[test]
    fn content_type_prefers_declared_then_guesses() {
        let declared = UploadedFile::new("scan", vec![1]).with_content_type("application/pdf");
        assert_eq!(content_type_of(&declared), mime::APPLICATION_PDF);

        let guessed = UploadedFile::new("photo.png", vec![1])
            .with_content_type("application/octet-stream");
        assert_eq!(content_type_of(&guessed), mime::IMAGE_PNG);
    }

    #[test]
    fn memory_storage_fails_after_budget() {
        let storage = MemoryObjectStorage::default();
        storage.fail_after(1);
        storage
            .put("a", b"1", &mime::IMAGE_PNG)
            .expect("first upload allowed");
        assert!(storage.put("b", b"2", &mime::IMAGE_PNG).is_err());
        assert_eq!(storage.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn local_storage_writes_below_root() {
        let root = std::env::temp_dir().join(format!("estate-trust-{}", UserId::generate()));
        let storage = LocalObjectStorage::new(&root, "https://cdn.example.com/");

        let stored = storage
            .put("kyc/u1-1-id.pdf", b"%PDF", &mime::APPLICATION_PDF)
            .expect("write succeeds");

        assert_eq!(stored.url, "https://cdn.example.com/kyc/u1-1-id.pdf");
        let written = std::fs::read(root.join("kyc/u1-1-id.pdf")).expect("file exists");
        assert_eq!(written, b"%PDF");
        let _ = std::fs::remove_dir_all(&root);
    }
}
