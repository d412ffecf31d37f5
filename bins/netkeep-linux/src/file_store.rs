//! File-backed persistence.
//!
//! Each namespace is a directory under the data directory and each key a file
//! inside it. Writes go to a temporary file that is renamed into place, so a
//! crash mid-write leaves the previous value intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use netkeep_core::{copy_prefix, Persistence, PersistenceSession, StoreError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FilePersistence {
    root: PathBuf,
}

impl FilePersistence {
    /// Use `root` as the data directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

impl Persistence for FilePersistence {
    fn begin(
        &self,
        namespace: &str,
        read_only: bool,
    ) -> Result<Box<dyn PersistenceSession + '_>, StoreError> {
        if !valid_name(namespace) {
            return Err(StoreError::Unavailable(format!(
                "invalid namespace '{}'",
                namespace
            )));
        }

        let dir = self.root.join(namespace);
        if !read_only {
            fs::create_dir_all(&dir).map_err(|e| {
                StoreError::Unavailable(format!("{}: {}", dir.display(), e))
            })?;
        }

        Ok(Box::new(FileSession { dir, read_only }))
    }
}

struct FileSession {
    dir: PathBuf,
    read_only: bool,
}

impl FileSession {
    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !valid_name(key) {
            return Err(StoreError::ReadError(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl PersistenceSession for FileSession {
    fn get_length(&self, key: &str) -> Result<Option<usize>, StoreError> {
        let path = self.path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len() as usize)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadError(format!("{}: {}", path.display(), e))),
        }
    }

    fn get_bytes(&self, key: &str, buf: &mut [u8]) -> Result<usize, StoreError> {
        let path = self.path(key)?;
        let data = fs::read(&path)
            .map_err(|e| StoreError::ReadError(format!("{}: {}", path.display(), e)))?;
        Ok(copy_prefix(&data, buf))
    }

    fn put_bytes(&mut self, key: &str, data: &[u8]) -> Result<usize, StoreError> {
        if self.read_only {
            return Err(StoreError::WriteError("session is read-only".to_string()));
        }
        let path = self.path(key)?;
        let tmp = self.dir.join(format!(".{}.tmp", key));

        fs::write(&tmp, data)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| StoreError::WriteError(format!("{}: {}", path.display(), e)))?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(data.len())
    }
}
