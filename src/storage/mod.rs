//! Storage backend abstraction for cover uploads.
//!
//! Stored objects are content-addressed: the key is the blake3 hash of the
//! bytes followed by the original extension, so identical uploads map to the
//! same object and no user-supplied text ever reaches the filesystem path.

pub mod local;

use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::Stream;
use once_cell::sync::Lazy;
use regex::Regex;
use std::pin::Pin;

pub use local::LocalStorage;

/// A boxed stream of bytes for streaming file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Accepted object keys: 64 hex digits and an optional short extension.
static FILENAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{64}(\.[a-z0-9]{1,8})?$").unwrap());

/// Represents a retrieved storage object with metadata.
pub struct StorageObject {
    /// Streaming body content
    pub body: ByteStream,
    /// Content length in bytes
    pub content_length: Option<i64>,
    /// MIME content type
    pub content_type: Option<String>,
    /// Entity tag for caching
    pub e_tag: Option<String>,
    /// Last modified timestamp
    pub last_modified: Option<String>,
}

/// Storage operation errors.
#[derive(Debug)]
pub enum StorageError {
    /// File not found
    NotFound(String),
    /// Key does not look like a content-addressed filename
    InvalidKey(String),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::InvalidKey(key) => write!(f, "Invalid key: {}", key),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for storage backends.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store a file under its canonical filename.
    async fn put_object(&self, data: Vec<u8>, filename: &str) -> Result<(), StorageError>;

    /// Retrieve a file by its canonical filename (hash + extension).
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;

    /// Remove a file. Removing a missing file is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// Check if a file exists.
    async fn exists(&self, filename: &str) -> Result<bool, StorageError>;
}

/// Returns the hex blake3 digest used as deduplication key and filename stem.
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Builds `{hash}{.ext}` from a digest and the client's original filename.
/// The extension is lowercased and dropped unless it is short and alphanumeric.
pub fn derive_filename(hash: &str, original_name: Option<&str>) -> String {
    let ext = original_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", hash, ext),
        None => hash.to_owned(),
    }
}

/// True if `key` could have been produced by [`derive_filename`].
pub fn is_valid_key(key: &str) -> bool {
    FILENAME_REGEX.is_match(key)
}

/// Get MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash(b"cover bytes");
        let b = content_hash(b"cover bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(b"other bytes"));
    }

    #[test]
    fn test_derive_filename_keeps_clean_extension() {
        let hash = content_hash(b"x");
        assert_eq!(
            derive_filename(&hash, Some("My Cover.JPG")),
            format!("{}.jpg", hash)
        );
        assert_eq!(derive_filename(&hash, Some("noext")), hash);
        assert_eq!(derive_filename(&hash, None), hash);
    }

    #[test]
    fn test_derive_filename_drops_hostile_extension() {
        let hash = content_hash(b"x");
        assert_eq!(derive_filename(&hash, Some("a.p/h p")), hash);
        assert_eq!(derive_filename(&hash, Some("a.verylongextension")), hash);
    }

    #[test]
    fn test_is_valid_key() {
        let hash = content_hash(b"x");
        assert!(is_valid_key(&hash));
        assert!(is_valid_key(&format!("{}.png", hash)));
        assert!(!is_valid_key("../etc/passwd"));
        assert!(!is_valid_key(&format!("../{}.png", hash)));
        assert!(!is_valid_key(&format!("{}.PNG", hash)));
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("abc.jpeg"), "image/jpeg");
        assert_eq!(guess_mime_type("abc.png"), "image/png");
        assert_eq!(guess_mime_type("abc"), "application/octet-stream");
    }
}
