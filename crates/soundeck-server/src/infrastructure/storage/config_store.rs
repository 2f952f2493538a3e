//! JSON-based configuration persistence for the SounDeck server.
//!
//! Reads and writes [`ConfigDocument`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\SounDeck\config.json`
//! - Linux:    `~/.config/soundeck/config.json` (or `$XDG_CONFIG_HOME/soundeck`)
//! - macOS:    `~/Library/Application Support/SounDeck/config.json`
//!
//! # Snapshots (for beginners)
//!
//! Several parts of the server read the document at the same time: the key
//! listener thread, every app session, and the HTTP routes.  Instead of
//! handing out a lock guard, [`ConfigStore::snapshot`] hands out an
//! `Arc<ConfigDocument>`: a cheap, reference-counted pointer to a document
//! that is never modified again.  A writer builds a *new* document, persists
//! it, and then swaps the pointer.  Readers holding the old `Arc` keep seeing
//! the old, complete document; they can never observe a half-applied update.
//!
//! # Atomic saves
//!
//! A save writes `<file>.tmp`, flushes it to disk, and renames it over the
//! real file.  A crash mid-write leaves either the old or the new document on
//! disk, never a truncated one.  Saves are serialised by a writer mutex held
//! across write, rename and publish, so concurrent writers cannot interleave.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use soundeck_core::{ConfigDocument, ValidationError};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Name of the configuration file inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content is not a valid configuration document.
    #[error("failed to parse config JSON at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be serialized to JSON.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A replacement document broke a uniqueness rule.
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

// ── Config store ──────────────────────────────────────────────────────────────

/// Owns the configuration document for the lifetime of the process.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Arc<ConfigDocument>>,
    writer: Mutex<()>,
}

impl ConfigStore {
    /// Loads the document at `path`.
    ///
    /// A missing file yields the default document (no buttons); nothing is
    /// written until the first save.  Duplicate ids or keys only produce a
    /// warning here so hand-edited files keep working.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] for file-system errors other than "not found",
    /// and [`ConfigError::Parse`] if the JSON is malformed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let doc = match fs::read_to_string(&path) {
            Ok(content) => {
                let doc: ConfigDocument =
                    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                info!(
                    "loaded config from {} ({} buttons)",
                    path.display(),
                    doc.buttons.len()
                );
                doc
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no config at {}; starting with defaults", path.display());
                ConfigDocument::default()
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        if let Err(e) = doc.validate() {
            warn!("config {}: {e}; the first matching button wins", path.display());
        }

        Ok(Self {
            path,
            current: RwLock::new(Arc::new(doc)),
            writer: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the document; relative sound references resolve
    /// against it.
    pub fn base_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Returns the current immutable document.
    pub fn snapshot(&self) -> Arc<ConfigDocument> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Persists `doc` atomically and publishes it as the new snapshot.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Serialize`] or [`ConfigError::Io`]; on error the
    /// previous snapshot stays current.
    pub fn save(&self, doc: ConfigDocument) -> Result<Arc<ConfigDocument>, ConfigError> {
        let _guard = self.lock_writer();
        self.persist_and_publish(doc)
    }

    /// Returns the stored credential, generating and persisting one first
    /// when none (or an empty one) is stored.
    ///
    /// An existing non-empty credential is never replaced.
    ///
    /// # Errors
    ///
    /// Propagates save failures; the new credential is not published then.
    pub fn ensure_credential(&self) -> Result<String, ConfigError> {
        let _guard = self.lock_writer();
        let current = self.snapshot();
        if let Some(credential) = current.credential() {
            return Ok(credential.to_string());
        }

        let credential = generate_credential();
        let mut doc = (*current).clone();
        doc.server.credential = Some(credential.clone());
        self.persist_and_publish(doc)?;
        info!("generated a new access credential in {}", self.path.display());
        Ok(credential)
    }

    /// Administrative replacement of the whole document.
    ///
    /// The stored credential is carried over regardless of what `doc`
    /// contains, so this path can neither remove nor rotate it.  The editor's
    /// `backend` block is carried over too when `doc` has none.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `doc` has duplicate ids or keys (nothing
    /// is written), otherwise the same errors as [`ConfigStore::save`].
    pub fn replace(&self, mut doc: ConfigDocument) -> Result<Arc<ConfigDocument>, ConfigError> {
        doc.validate()?;
        let _guard = self.lock_writer();
        let current = self.snapshot();
        doc.server.credential = current.server.credential.clone();
        if doc.backend.is_none() {
            doc.backend = current.backend.clone();
        }
        self.persist_and_publish(doc)
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller must hold the writer lock.
    fn persist_and_publish(&self, doc: ConfigDocument) -> Result<Arc<ConfigDocument>, ConfigError> {
        let content = serde_json::to_string_pretty(&doc).map_err(ConfigError::Serialize)?;
        write_atomic(&self.path, content.as_bytes())?;

        let doc = Arc::new(doc);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&doc);
        debug!("published config snapshot ({} buttons)", doc.buttons.len());
        Ok(doc)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let tmp = tmp_path(path);
    let io_err = |source| ConfigError::Io {
        path: tmp.clone(),
        source,
    };
    let mut file = File::create(&tmp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// 64 hex characters drawn from two v4 UUIDs (244 random bits from the OS).
fn generate_credential() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

// ── Config location ───────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined from the environment.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the platform config directory including the `SounDeck` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SounDeck"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("soundeck"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SounDeck")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
