//! Object storage for project attachments.
//!
//! Handlers talk to an [`ObjectStore`]; the default backend is a directory on
//! local disk. Calls are blocking, run them through `web::block`.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()>;
    fn get(&self, key: &str) -> io::Result<Vec<u8>>;
    fn delete(&self, key: &str) -> io::Result<()>;
}

pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Maps a key onto the bucket directory, refusing anything that could
    /// resolve outside of it.
    fn resolve(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(io::Error::new(ErrorKind::InvalidInput, format!("invalid object key: {key}")));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalBucket {
    fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)
    }

    fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(key)?)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.resolve(key)?) {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Reduces an uploaded file name to a safe single path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Key layout: `{user_id}/{unix_millis}-{file name}`.
pub fn object_key(user_id: u64, millis: i64, file_name: &str) -> String {
    format!("{}/{}-{}", user_id, millis, sanitize_file_name(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = LocalBucket::new(dir.path()).unwrap();

        bucket.put("7/1-report.pdf", b"%PDF").unwrap();
        assert_eq!(bucket.get("7/1-report.pdf").unwrap(), b"%PDF");

        bucket.delete("7/1-report.pdf").unwrap();
        assert_eq!(bucket.get("7/1-report.pdf").unwrap_err().kind(), ErrorKind::NotFound);
        // deleting twice is fine
        bucket.delete("7/1-report.pdf").unwrap();
    }

    #[test]
    fn keys_cannot_escape_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = LocalBucket::new(dir.path()).unwrap();

        for key in ["../secret", "/etc/passwd", "7/../../x", ""] {
            assert_eq!(bucket.put(key, b"x").unwrap_err().kind(), ErrorKind::InvalidInput, "{key}");
        }
    }

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("Q1 report (final).pdf"), "Q1_report__final_.pdf");
        assert_eq!(sanitize_file_name(".."), "file");
        assert_eq!(object_key(7, 1700000000000, "a b.txt"), "7/1700000000000-a_b.txt");
    }
}
