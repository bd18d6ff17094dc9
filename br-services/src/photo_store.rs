//! Photo references and local photo storage.
//!
//! Account photos are stored by reference: the URL the user picked is kept
//! as given and deduplicated by that URL. Incident attachments are copied
//! into the media directory under the MD5 of their content, so attaching the
//! same image twice yields the same `file://` URI and the same `photos` row.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use rusqlite::Connection;
use tracing::{debug, info};

use br_core::error::{BrError, BrResult};
use br_models::Photo;

use crate::validation::{self, require};

/// A photo reference ready to be stored: display name plus URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRef {
    pub name: String,
    pub url: String,
}

impl PhotoRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Find the `photos` row for this URL or create it, returning its id.
pub fn resolve_photo(conn: &Connection, photo: &PhotoRef) -> BrResult<i64> {
    Photo::new(&photo.name, &photo.url).find_or_insert(conn)
}

#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reference a picked photo without copying it.
    ///
    /// URLs are kept exactly as given. A bare path becomes a `file://` URI.
    pub fn reference(source: &str) -> BrResult<PhotoRef> {
        let source = source.trim();
        if source.is_empty() {
            return Err(BrError::validation("photo", "no photo selected"));
        }
        let url = if source.contains("://") {
            source.to_string()
        } else {
            let path = Path::new(source);
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()?.join(path)
            };
            file_uri(&absolute)
        };
        require("photo", validation::url(&url))?;
        let name = last_segment(&url).to_string();
        Ok(PhotoRef::new(name, url))
    }

    /// Turn a picker result or typed URL into a stored attachment.
    ///
    /// `http(s)` URLs pass through. `file://` URIs and bare paths are copied
    /// into the store.
    pub fn import(&self, source: &str) -> BrResult<PhotoRef> {
        let source = source.trim();
        if source.is_empty() {
            return Err(BrError::validation("photo", "no photo selected"));
        }
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(PhotoRef::new(last_segment(source), source));
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        self.import_file(Path::new(path))
    }

    /// Copy a local file into the store, named by its content hash.
    pub fn import_file(&self, path: &Path) -> BrResult<PhotoRef> {
        if !path.is_file() {
            return Err(BrError::not_found("photo", path.display()));
        }

        let digest = content_hash(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string());
        let file_name = format!("{digest}.{extension}");

        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(&file_name);
        if target.exists() {
            debug!("photo {file_name} already stored");
        } else {
            fs::copy(path, &target)?;
            info!("stored photo {file_name}");
        }

        let absolute = target.canonicalize()?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&file_name)
            .to_string();
        Ok(PhotoRef::new(name, file_uri(&absolute)))
    }

    /// Local path behind a `file://` URL produced by this store.
    pub fn local_path(url: &str) -> Option<PathBuf> {
        url.strip_prefix("file://").map(PathBuf::from)
    }
}

fn last_segment(url: &str) -> &str {
    url.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(url)
}

/// `file://` URI for an absolute path.
pub fn file_uri(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{display}")
    } else {
        format!("file:///{display}")
    }
}

fn content_hash(path: &Path) -> BrResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_same_content_same_uri() {
        let dir = TempDir::new().unwrap();
        let store = PhotoStore::new(dir.path().join("photos"));
        let a = dir.path().join("a.PNG");
        let b = dir.path().join("b.png");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        let first = store.import(a.to_str().unwrap()).unwrap();
        let second = store.import(&format!("file://{}", b.display())).unwrap();
        assert_eq!(first.url, second.url);
        assert!(first.url.starts_with("file:///"));
        assert!(first.url.ends_with(".png"));
        assert_eq!(first.name, "a.PNG");

        let stored = PhotoStore::local_path(&first.url).unwrap();
        assert_eq!(fs::read(stored).unwrap(), b"same bytes");
    }

    #[test]
    fn test_remote_urls_pass_through() {
        let store = PhotoStore::new("/nonexistent");
        let photo = store.import("https://cdn.example.com/img/fire.jpg").unwrap();
        assert_eq!(photo.url, "https://cdn.example.com/img/fire.jpg");
        assert_eq!(photo.name, "fire.jpg");
    }

    #[test]
    fn test_references_keep_the_picked_url() {
        let content = PhotoStore::reference("content://media/external/images/media/42").unwrap();
        assert_eq!(content.url, "content://media/external/images/media/42");
        assert_eq!(content.name, "42");

        let local = PhotoStore::reference(" file:///sdcard/DCIM/yo.png ").unwrap();
        assert_eq!(local.url, "file:///sdcard/DCIM/yo.png");
        assert_eq!(local.name, "yo.png");

        let bare = PhotoStore::reference("/sdcard/DCIM/yo.png").unwrap();
        assert_eq!(bare.url, "file:///sdcard/DCIM/yo.png");

        let err = PhotoStore::reference("ftp://old.server/yo.png").unwrap_err();
        assert_eq!(err.kind(), br_core::ErrorKind::Validation);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = PhotoStore::new(dir.path());
        let err = store.import("/definitely/not/here.png").unwrap_err();
        assert_eq!(err.kind(), br_core::ErrorKind::NotFound);
        assert_eq!(store.import("  ").unwrap_err().kind(), br_core::ErrorKind::Validation);
    }
}
