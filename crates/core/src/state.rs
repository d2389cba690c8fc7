// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted "last known common state" of a sync pair.
//!
//! The base state records what every path looked like after the last
//! successful sync, so the planner can tell "changed on both sides" apart
//! from "changed on one side". It is keyed by local root, remote endpoint
//! identity and remote root, so unrelated pairs never share a file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::path::RelPath;
use crate::record::{ContentHash, EntryKind, FileRecord};

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "CROSSYNC_STATE_DIR";

const STATE_VERSION: u32 = 1;

/// What a path held when both sides last agreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fingerprint {
    File { hash: ContentHash },
    Dir,
    Symlink { target: String },
}

impl Fingerprint {
    /// `None` for a file record without a hash.
    pub fn of(record: &FileRecord) -> Option<Self> {
        match &record.kind {
            EntryKind::File => record
                .hash
                .clone()
                .map(|hash| Fingerprint::File { hash }),
            EntryKind::Dir => Some(Fingerprint::Dir),
            EntryKind::Symlink { target } => Some(Fingerprint::Symlink {
                target: target.clone(),
            }),
        }
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        Fingerprint::of(record).as_ref() == Some(self)
    }
}

/// Identifies one sync pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateKey {
    pub local_root: String,
    pub endpoint: String,
    pub remote_root: String,
}

impl StateKey {
    pub fn new(local_root: &Path, endpoint: &Endpoint, remote_root: &str) -> Self {
        let local_root = local_root
            .canonicalize()
            .unwrap_or_else(|_| local_root.to_path_buf());
        StateKey {
            local_root: local_root.display().to_string(),
            endpoint: endpoint.identity(),
            remote_root: remote_root.to_string(),
        }
    }

    /// File name of this pair's state: a hash of the key.
    pub fn file_name(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.local_root.as_bytes());
        hasher.update([0]);
        hasher.update(self.endpoint.as_bytes());
        hasher.update([0]);
        hasher.update(self.remote_root.as_bytes());
        format!("{}.json", hex::encode(hasher.finalize()))
    }
}

/// The base state of one sync pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseState {
    version: u32,
    key: StateKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    entries: BTreeMap<String, Fingerprint>,
}

impl BaseState {
    pub fn new(key: StateKey) -> Self {
        BaseState {
            version: STATE_VERSION,
            key,
            updated_at: None,
            entries: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &StateKey {
        &self.key
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn get(&self, path: &RelPath) -> Option<&Fingerprint> {
        self.entries.get(path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records `record` as agreed on by both sides.
    pub fn record(&mut self, record: &FileRecord) {
        match Fingerprint::of(record) {
            Some(fingerprint) => {
                self.entries
                    .insert(record.path.as_str().to_string(), fingerprint);
            }
            None => self.forget(&record.path),
        }
    }

    pub fn forget(&mut self, path: &RelPath) {
        self.entries.remove(path.as_str());
    }

    /// Drops entries whose path is not in `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|path, _| keep(path));
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Directory of base-state files.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StateStore { dir: dir.into() }
    }

    /// `$CROSSYNC_STATE_DIR`, else `<data dir>/crossync/state`.
    pub fn from_env() -> Result<Self> {
        if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
            return Ok(Self::new(dir));
        }
        dirs::data_dir()
            .map(|d| Self::new(d.join("crossync").join("state")))
            .ok_or(Error::NoStateDir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &StateKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Loads the state for `key`; a missing file yields `None`.
    pub fn load(&self, key: &StateKey) -> Result<Option<BaseState>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let _lock = self.lock(key, false)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: BaseState = serde_json::from_str(&text)?;
        if state.version != STATE_VERSION || state.key != *key {
            debug!("ignoring stale base state {}", path.display());
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Writes the state atomically while holding the pair's lock.
    pub fn save(&self, state: &BaseState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let _lock = self.lock(&state.key, true)?;
        let path = self.path_for(&state.key);
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("saved base state ({} entries) to {}", state.len(), path.display());
        Ok(())
    }

    fn lock(&self, key: &StateKey, exclusive: bool) -> Result<File> {
        let lock_path = self.path_for(key).with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
