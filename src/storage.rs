use std::io;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Local-disk blob store for uploaded files.
///
/// Files are laid out as `<root>/<namespace>/<uuid>.<ext>`. Callers keep
/// only the relative `<namespace>/<uuid>.<ext>` part; the public URL for
/// a stored file is built from that path and the configured origin.
#[derive(Clone, Debug)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store a blob under the given namespace and return its relative path.
    pub async fn put(&self, namespace: &str, extension: &str, data: &[u8]) -> io::Result<String> {
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let dir = self.root.join(namespace);

        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&file_name), data).await?;

        let relative = format!("{namespace}/{file_name}");
        debug!("Stored uploaded file at {}", relative);
        Ok(relative)
    }

    /// Best-effort delete of a previously stored file. A missing or
    /// undeletable file is logged and reported as `false`, never an error.
    pub async fn delete(&self, relative: &str) -> bool {
        match fs::remove_file(self.root.join(relative)).await {
            Ok(()) => {
                debug!("Deleted stored file {}", relative);
                true
            }
            Err(e) => {
                warn!("Failed to delete stored file {}: {}", relative, e);
                false
            }
        }
    }
}
