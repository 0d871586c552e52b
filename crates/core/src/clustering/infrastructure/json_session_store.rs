use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::clustering::domain::clustering_session::{ClusteringSession, SessionSnapshot};
use crate::clustering::domain::identity_error::IdentityError;
use crate::shared::constants::SESSION_SNAPSHOT_VERSION;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("failed to read session {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed session {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode session: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("session {path} is inconsistent: {source}")]
    Restore {
        path: PathBuf,
        #[source]
        source: IdentityError,
    },
    #[error("session {path} has version {found}, expected {expected}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// Saves and loads clustering sessions as pretty-printed JSON snapshots.
pub struct JsonSessionStore;

impl JsonSessionStore {
    /// Writes to a sibling temp file first, then renames over `path`, so
    /// an interrupted save never leaves a truncated snapshot behind.
    pub fn save(path: &Path, session: &ClusteringSession) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string_pretty(&session.snapshot())
            .map_err(SessionStoreError::Serialize)?;
        let write_err = |source: std::io::Error| SessionStoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;

        log::info!(
            "Saved session with {} identities to {}",
            session.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ClusteringSession, SessionStoreError> {
        let json = fs::read_to_string(path).map_err(|source| SessionStoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: SessionSnapshot =
            serde_json::from_str(&json).map_err(|source| SessionStoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if snapshot.version != SESSION_SNAPSHOT_VERSION {
            return Err(SessionStoreError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: snapshot.version,
                expected: SESSION_SNAPSHOT_VERSION,
            });
        }

        let session =
            ClusteringSession::restore(snapshot).map_err(|source| SessionStoreError::Restore {
                path: path.to_path_buf(),
                source,
            })?;
        log::info!(
            "Loaded session with {} identities from {}",
            session.len(),
            path.display()
        );
        Ok(session)
    }
}
