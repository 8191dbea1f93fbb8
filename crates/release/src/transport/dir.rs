use super::{Blob, BlobTransport, TransportError, WriteCondition};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A local directory used as a blob container.
///
/// Each blob is one file named after the blob. The version tag is the SHA-256
/// of the contents, which makes conditional writes detect any change made by
/// another process between read and write.
#[derive(Debug, Clone)]
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    /// Creates a transport rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, TransportError> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..")
        {
            return Err(TransportError::Unavailable(format!(
                "invalid blob name '{name}'"
            )));
        }
        Ok(self.root.join(name))
    }

    fn etag_of(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    fn read(path: &Path) -> Result<Option<Vec<u8>>, TransportError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(path, &e)),
        }
    }
}

fn unavailable(path: &Path, err: &io::Error) -> TransportError {
    TransportError::Unavailable(format!("{}: {err}", path.display()))
}

impl BlobTransport for DirTransport {
    fn name(&self) -> &'static str {
        "dir"
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        let path = self.path_for(name)?;
        debug!(path = %path.display(), "Reading blob");
        let bytes = Self::read(&path)?.ok_or(TransportError::NotFound)?;
        let etag = Self::etag_of(&bytes);
        Ok(Blob::new(bytes).with_etag(etag))
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        let path = self.path_for(name)?;

        match condition {
            WriteCondition::None => {}
            WriteCondition::IfAbsent => {
                if Self::read(&path)?.is_some() {
                    return Err(TransportError::PreconditionFailed);
                }
            }
            WriteCondition::IfMatch(expected) => match Self::read(&path)? {
                Some(current) if Self::etag_of(&current) == *expected => {}
                _ => return Err(TransportError::PreconditionFailed),
            },
        }

        fs::create_dir_all(&self.root).map_err(|e| unavailable(&self.root, &e))?;

        // Write-then-rename so a reader never observes a half-written blob
        let staging = self.root.join(format!(".{name}.partial"));
        fs::write(&staging, bytes).map_err(|e| unavailable(&staging, &e))?;
        fs::rename(&staging, &path).map_err(|e| unavailable(&path, &e))?;
        debug!(path = %path.display(), size = bytes.len(), "Wrote blob");

        Ok(Some(Self::etag_of(bytes)))
    }
}
