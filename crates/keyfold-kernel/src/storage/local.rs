//! Local directory used as a flat object store.
//!
//! Every object is one file directly inside `root`. The file name is the
//! base64url encoding of the key, so keys with separators (and folder
//! markers ending in one) never turn into real directories on disk.
//!
//! Every `list_objects` call reads and decodes the whole directory, every
//! owner included, so listing cost grows with the total object count. Keys
//! past about 190 bytes exceed the usual 255-byte file name limit.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;

use super::page::build_page;
use super::traits::{ListPage, ListRequest, ObjectBackend, ObjectMeta, StorageError};

const TMP_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    base_url: String,
}

impl LocalBackend {
    /// Backend rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base_url = format!("file://{}/", root.display());
        Self { root, base_url }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(B64.encode(key.as_bytes()))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let bytes = B64.decode(file_name).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn io_err(op: &'static str, key: &str, source: io::Error) -> StorageError {
        StorageError::Io {
            op,
            key: key.to_string(),
            source,
        }
    }

    async fn meta_for(key: &str, path: &Path) -> io::Result<ObjectMeta> {
        let metadata = fs::metadata(path).await?;
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(ObjectMeta {
            key: key.to_string(),
            size: metadata.len(),
            last_modified,
        })
    }
}

#[async_trait]
impl ObjectBackend for LocalBackend {
    #[tracing::instrument(level = "trace", skip(self, data), fields(size = data.len()))]
    async fn put_object(&self, key: &str, data: Bytes) -> Result<ObjectMeta, StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_err("create root for", key, e))?;

        // Each put writes its own temp file, then renames over the key. Racing
        // puts to one key each land whole; the last rename wins.
        let root = self.root.clone();
        let path = self.path_for(key);
        let size = data.len() as u64;
        let written = tokio::task::spawn_blocking(move || -> Result<(), (&'static str, io::Error)> {
            let mut tmp = tempfile::Builder::new()
                .suffix(TMP_SUFFIX)
                .tempfile_in(&root)
                .map_err(|e| ("create", e))?;
            tmp.write_all(&data).map_err(|e| ("write", e))?;
            tmp.flush().map_err(|e| ("flush", e))?;
            tmp.persist(&path).map_err(|e| ("commit", e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Backend(format!("put {key}: writer task failed: {e}")))?;
        written.map_err(|(op, e)| Self::io_err(op, key, e))?;

        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            last_modified: Utc::now(),
        })
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        match Self::meta_for(key, &self.path_for(key)).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err("stat", key, e)),
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err("delete", key, e)),
        }
    }

    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ListPage::default()),
            Err(e) => return Err(Self::io_err("list", request.prefix, e)),
        };

        let mut candidates = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Self::io_err("list", request.prefix, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let Some(key) = Self::key_for(name) else {
                tracing::warn!(file = name, "skipping file that is not an encoded key");
                continue;
            };
            if !key.starts_with(request.prefix) {
                continue;
            }
            match Self::meta_for(&key, &entry.path()).await {
                Ok(meta) => candidates.push(meta),
                // Deleted between read_dir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::io_err("stat", &key, e)),
            }
        }
        candidates.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(build_page(candidates, &request))
    }

    fn locator(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prefix: &str, delimiter: Option<char>) -> ListRequest<'_> {
        ListRequest {
            prefix,
            delimiter,
            continuation: None,
            max_keys: 1000,
        }
    }

    #[tokio::test]
    async fn test_markers_stay_flat_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.put_object("u1/docs/", Bytes::new()).await.unwrap();
        backend
            .put_object("u1/docs/a.txt", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        assert!(entries.all(|e| e.unwrap().file_type().unwrap().is_file()));

        let page = backend.list_objects(request("u1/", Some('/'))).await.unwrap();
        assert_eq!(page.common_prefixes, vec!["u1/docs/"]);

        let page = backend.list_objects(request("u1/docs/", Some('/'))).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["u1/docs/", "u1/docs/a.txt"]);
        assert_eq!(page.objects[1].size, 3);
    }

    #[tokio::test]
    async fn test_missing_root_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path().join("not-yet"));
        let page = backend.list_objects(request("u1/", None)).await.unwrap();
        assert!(page.objects.is_empty());
        assert!(backend.head_object("u1/a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_then_head() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.put_object("u1/a", Bytes::from_static(b"x")).await.unwrap();
        backend.delete_object("u1/a").await.unwrap();
        backend.delete_object("u1/a").await.unwrap();
        assert!(backend.head_object("u1/a").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_puts_leave_one_whole_payload() {
        let dir = tempfile::tempdir().unwrap();
        let backend = std::sync::Arc::new(LocalBackend::new(dir.path()));
        let big = Bytes::from(vec![b'a'; 4 << 20]);
        let small = Bytes::from(vec![b'b'; 1 << 20]);

        for _ in 0..20 {
            let tasks = [big.clone(), small.clone()].map(|data| {
                let backend = backend.clone();
                tokio::spawn(async move { backend.put_object("u1/k", data).await })
            });
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let stored = std::fs::read(backend.path_for("u1/k")).unwrap();
            assert!(
                stored.as_slice() == &big[..] || stored.as_slice() == &small[..],
                "torn object of {} bytes",
                stored.len()
            );
        }

        let page = backend.list_objects(request("u1/", None)).await.unwrap();
        assert_eq!(page.objects.len(), 1);
    }
}
