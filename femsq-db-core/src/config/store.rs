//! Settings file location and owner-only persistence.
//!
//! # Path resolution
//! 1. Explicit override supplied by the process ([`ConfigStore::with_path_override`])
//! 2. `FEMSQ_CONFIG_PATH` environment variable (ignored when empty)
//! 3. `<home>/.femsq/database.properties`
//!
//! # Security
//! On Unix the settings file is kept at mode 0600. The default `~/.femsq`
//! directory and any directory the store creates are kept at 0700; an
//! existing directory chosen through the override or the environment is left
//! as it is, with a warning when other users can access it. Other platforms
//! skip permission handling.

use super::SettingsDocument;
use crate::{FemsqError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

/// Directory under the user's home holding the settings file
pub const APP_DIR_NAME: &str = ".femsq";
/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "database.properties";
/// Environment variable overriding the settings file path
pub const CONFIG_PATH_ENV: &str = "FEMSQ_CONFIG_PATH";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Where the resolved path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathSource {
    Override,
    Environment,
    Default,
}

/// Loads and saves the settings document.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path_override: Option<PathBuf>,
}

impl ConfigStore {
    /// Creates a store resolving its path from the environment and home directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pinned to `path`, ahead of every other source.
    pub fn with_path_override(path: impl Into<PathBuf>) -> Self {
        Self {
            path_override: Some(path.into()),
        }
    }

    /// Resolves the settings file path. Performs no filesystem access.
    pub fn resolve_path(&self) -> PathBuf {
        self.locate().0
    }

    fn locate(&self) -> (PathBuf, PathSource) {
        if let Some(path) = &self.path_override {
            debug!(path = %path.display(), "Using settings path override");
            return (path.clone(), PathSource::Override);
        }

        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
            let path = PathBuf::from(path);
            debug!(path = %path.display(), "Using settings path from {}", CONFIG_PATH_ENV);
            return (path, PathSource::Environment);
        }

        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let path = home.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME);
        debug!(path = %path.display(), "Using default settings path");
        (path, PathSource::Default)
    }

    /// Loads the settings document. A missing file yields an empty document.
    ///
    /// # Errors
    /// `FemsqError::ConfigIo` for any read failure other than absence.
    pub fn load(&self) -> Result<SettingsDocument> {
        let path = self.resolve_path();
        match std::fs::File::open(&path).and_then(SettingsDocument::read_from) {
            Ok(document) => {
                debug!(path = %path.display(), entries = document.len(), "Loaded settings");
                Ok(document)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Settings file not found");
                Ok(SettingsDocument::new())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read settings");
                Err(FemsqError::config_io("read settings", &path, e))
            }
        }
    }

    /// Writes the full document, replacing the file atomically.
    ///
    /// The content goes to an owner-only temporary file next to the target,
    /// is synced, then renamed over the target. Readers see either the old
    /// or the new file.
    ///
    /// # Errors
    /// `FemsqError::ConfigIo` when the directory, temporary file, write or
    /// rename fails.
    pub fn save(&self, document: &SettingsDocument) -> Result<()> {
        let path = self.resolve_path();
        let directory = self.ensure_directory()?;

        let io_error = |context: &str, e: std::io::Error| {
            error!(path = %path.display(), error = %e, "Failed to {context}");
            FemsqError::config_io(context, &path, e)
        };

        let mut staged = tempfile::Builder::new()
            .prefix(&format!(".{SETTINGS_FILE_NAME}."))
            .suffix(".tmp")
            .tempfile_in(&directory)
            .map_err(|e| io_error("create temporary settings file", e))?;
        restrict_file(staged.path());

        document
            .write_to(&mut staged)
            .map_err(|e| io_error("write settings", e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| io_error("sync settings", e))?;
        staged
            .persist(&path)
            .map_err(|e| io_error("replace settings file", e.error))?;

        restrict_file(&path);
        info!(path = %path.display(), entries = document.len(), "Saved database settings");
        Ok(())
    }

    /// Creates the settings directory if missing. Idempotent.
    ///
    /// A directory created here, and the default `~/.femsq`, are restricted
    /// to the owner. Pre-existing override or environment directories keep
    /// their permissions.
    ///
    /// # Errors
    /// `FemsqError::ConfigIo` when the directory cannot be created.
    pub fn ensure_directory(&self) -> Result<PathBuf> {
        let (path, source) = self.locate();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let created = !directory.exists();
        if created {
            std::fs::create_dir_all(&directory).map_err(|e| {
                error!(path = %directory.display(), error = %e, "Failed to create settings directory");
                FemsqError::config_io("create settings directory", &directory, e)
            })?;
            debug!(path = %directory.display(), "Created settings directory");
        }

        if created || source == PathSource::Default {
            restrict_directory(&directory);
        } else {
            warn_if_shared(&directory);
        }
        Ok(directory)
    }

    /// Modification time of the settings file, `None` when it does not exist.
    ///
    /// # Errors
    /// `FemsqError::ConfigIo` when metadata cannot be read for another reason.
    pub fn modified(&self) -> Result<Option<SystemTime>> {
        let path = self.resolve_path();
        match std::fs::metadata(&path) {
            Ok(metadata) => metadata
                .modified()
                .map(Some)
                .map_err(|e| FemsqError::config_io("read settings timestamp", &path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FemsqError::config_io("read settings metadata", &path, e)),
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)) {
        warn!(path = %path.display(), error = %e, "Could not restrict permissions");
    }
}

#[cfg(unix)]
fn restrict_directory(path: &Path) {
    set_mode(path, DIR_MODE);
}

#[cfg(unix)]
fn restrict_file(path: &Path) {
    set_mode(path, FILE_MODE);
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path)
        && metadata.permissions().mode() & 0o077 != 0
    {
        warn!(path = %path.display(), "Settings directory is accessible to other users");
    }
}

#[cfg(not(unix))]
fn restrict_directory(_path: &Path) {}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) {}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
