//! # Local Persistence Port
//!
//! Named blobs that survive a full restart of the client.
//!
//! ## Blob Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Persisted Blobs                                   │
//! │                                                                         │
//! │  {data_dir}/bizflow-pos.json    ◄── CartState (CartEngine)             │
//! │  {data_dir}/bizflow-auth.json   ◄── SessionState (token + user)        │
//! │                                                                         │
//! │  Each blob is an envelope:                                             │
//! │    { "state": { … }, "version": 0 }                                    │
//! │                                                                         │
//! │  Writes go to {name}.json.tmp first and are renamed over the old       │
//! │  file, so a crash mid-write leaves the previous state readable.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Envelope version written by this client.
pub const STATE_VERSION: u32 = 0;

// =============================================================================
// Blob Store Trait
// =============================================================================

/// Raw storage of named string blobs.
///
/// Calls are synchronous: a mutation is only complete once its blob is
/// written.
pub trait BlobStore: Send + Sync {
    /// Returns `None` if no blob with this name was ever saved.
    fn load(&self, name: &str) -> ClientResult<Option<String>>;

    fn save(&self, name: &str, contents: &str) -> ClientResult<()>;

    /// No-op if the blob does not exist.
    fn remove(&self, name: &str) -> ClientResult<()>;
}

// =============================================================================
// File Store
// =============================================================================

/// One JSON file per blob under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> ClientResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(?dir, "Opened file blob store");
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl BlobStore for FileStore {
    fn load(&self, name: &str) -> ClientResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, name: &str, contents: &str) -> ClientResult<()> {
        let path = self.path_for(name);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> ClientResult<()> {
        match std::fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process store for tests and for running without a data directory.
///
/// Clones share the same blobs, which lets a test "reload" the client by
/// building a second engine over the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClientResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.blobs
            .lock()
            .map_err(|_| ClientError::StorageFailed("memory store lock poisoned".into()))
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, name: &str) -> ClientResult<Option<String>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn save(&self, name: &str, contents: &str) -> ClientResult<()> {
        self.lock()?.insert(name.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> ClientResult<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

// =============================================================================
// Typed State Helpers
// =============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    state: &'a T,
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

/// Serializes `state` into its envelope and writes it.
pub fn save_state<T: Serialize>(store: &dyn BlobStore, name: &str, state: &T) -> ClientResult<()> {
    let json = serde_json::to_string(&EnvelopeRef {
        state,
        version: STATE_VERSION,
    })?;
    store.save(name, &json)
}

/// Reads and decodes a blob written by [`save_state`].
///
/// ## Errors
/// - [`ClientError::CorruptState`]: the blob is not a valid envelope for `T`
/// - [`ClientError::VersionMismatch`]: written by a newer client
pub fn load_state<T: DeserializeOwned>(store: &dyn BlobStore, name: &str) -> ClientResult<Option<T>> {
    let Some(json) = store.load(name)? else {
        return Ok(None);
    };

    let envelope: Envelope<T> = serde_json::from_str(&json).map_err(|e| ClientError::CorruptState {
        name: name.to_string(),
        reason: e.to_string(),
    })?;

    if envelope.version > STATE_VERSION {
        return Err(ClientError::VersionMismatch {
            name: name.to_string(),
            found: envelope.version,
            expected: STATE_VERSION,
        });
    }

    Ok(Some(envelope.state))
}
