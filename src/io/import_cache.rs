// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Import cache - memoizes converted meshes for `import()` statements.
//!
//! Entries are keyed by canonical path, import parameters and the options of
//! the importing builder. An entry is reused while the SHA-256 of the source
//! file is unchanged and its modification time is not later than the
//! recorded one; the time check is skipped once disabled. Script imports
//! also record every file they imported in turn, and each of those must
//! still pass the same check. At most one conversion runs per key: every key
//! owns a mutex slot that is held for the whole lookup-or-convert step.
//!
//! Conversions that can import further files run under a global lock taken
//! by the outermost import on a thread. Together with the per-thread import
//! stack this keeps a whole import chain on one thread, so cycles are
//! reported instead of deadlocking.

use super::converter::{MeshConverter, NativeConverter};
use crate::config::BuilderConfig;
use crate::error::{CsgError, Result};
use crate::geometry::Mesh;
use ahash::AHashSet;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Parameters of an `import()` statement that affect the converted mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportParams {
    /// Uniform scale applied to the imported mesh
    pub scale: f64,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl ImportParams {
    pub fn with_scale(scale: f64) -> Self {
        Self { scale }
    }

    /// Bit-exact identity used in cache keys
    fn cache_tag(&self) -> u64 {
        self.scale.to_bits()
    }
}

/// Fingerprint of the builder options that can change a converted mesh
fn config_tag(config: &BuilderConfig) -> u64 {
    let relevant = config.clone().with_parallel(false);
    let json = serde_json::to_vec(&relevant).unwrap_or_default();
    let digest = Sha256::digest(&json);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    params: u64,
    config: u64,
}

impl CacheKey {
    /// Hex SHA-256 of the key, used as the on-disk file name
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.path.to_string_lossy().as_bytes());
        hasher.update(self.params.to_le_bytes());
        hasher.update(self.config.to_le_bytes());
        hex(&hasher.finalize())
    }
}

/// A source file as it was when a mesh was converted from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SourceState {
    path: PathBuf,
    /// Seconds and nanoseconds since the epoch
    modified: Option<(u64, u32)>,
    /// Hex SHA-256 of the file contents
    digest: String,
}

impl SourceState {
    fn read(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| CsgError::import(path, e.to_string()))?;
        if !metadata.is_file() {
            return Err(CsgError::import(path, "not a regular file"));
        }
        let content = std::fs::read(path).map_err(|e| CsgError::import(path, e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            modified: metadata.modified().ok().and_then(epoch_stamp),
            digest: hex(&Sha256::digest(&content)),
        })
    }
}

fn epoch_stamp(time: SystemTime) -> Option<(u64, u32)> {
    let since = time.duration_since(UNIX_EPOCH).ok()?;
    Some((since.as_secs(), since.subsec_nanos()))
}

#[derive(Debug, Clone)]
struct CacheEntry {
    mesh: Mesh,
    source: SourceState,
    /// Files imported while converting, at any depth
    dependencies: Vec<SourceState>,
}

/// Persisted form of a cache entry
#[derive(Serialize, Deserialize)]
struct StoredEntry {
    params: u64,
    config: u64,
    source: SourceState,
    dependencies: Vec<SourceState>,
    mesh: Mesh,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub conversions: usize,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// One import in progress on this thread
struct ImportFrame {
    path: PathBuf,
    /// Sources resolved by nested imports of this frame
    dependencies: Vec<SourceState>,
}

thread_local! {
    static IMPORT_STACK: RefCell<Vec<ImportFrame>> = const { RefCell::new(Vec::new()) };
}

/// Pops the import stack when a resolution finishes, including on error
struct StackGuard;

impl StackGuard {
    fn push(path: &Path) -> Result<(Self, bool)> {
        IMPORT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|frame| frame.path == path) {
                let chain = stack
                    .iter()
                    .map(|frame| frame.path.as_path())
                    .chain(std::iter::once(path))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(CsgError::import(path, format!("import cycle: {}", chain)));
            }
            let outermost = stack.is_empty();
            stack.push(ImportFrame {
                path: path.to_path_buf(),
                dependencies: Vec::new(),
            });
            Ok((StackGuard, outermost))
        })
    }

    /// Sources recorded by nested imports, each path once
    fn take_dependencies(&self) -> Vec<SourceState> {
        let mut dependencies = IMPORT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|frame| std::mem::take(&mut frame.dependencies))
                .unwrap_or_default()
        });
        let mut seen = AHashSet::new();
        dependencies.retain(|dependency| seen.insert(dependency.path.clone()));
        dependencies
    }

    /// Record `entry` and everything it depends on in the importing frame
    fn report(&self, entry: &CacheEntry) {
        IMPORT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            if depth < 2 {
                return;
            }
            let parent = &mut stack[depth - 2];
            parent.dependencies.push(entry.source.clone());
            parent.dependencies.extend(entry.dependencies.iter().cloned());
        });
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        IMPORT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Process-wide cache of imported meshes
pub struct ImportCache {
    converter: Box<dyn MeshConverter + Send + Sync>,
    entries: DashMap<CacheKey, Slot>,
    chain_lock: Mutex<()>,
    persist_dir: Option<PathBuf>,
    ignore_time: AtomicBool,
    hits: AtomicUsize,
    misses: AtomicUsize,
    conversions: AtomicUsize,
}

impl Default for ImportCache {
    fn default() -> Self {
        Self::new(Box::new(NativeConverter::new()))
    }
}

impl std::fmt::Debug for ImportCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportCache")
            .field("entries", &self.entries.len())
            .field("persist_dir", &self.persist_dir)
            .field("ignore_time", &self.ignore_time.load(Ordering::Relaxed))
            .field("stats", &self.stats())
            .finish()
    }
}

impl ImportCache {
    pub fn new(converter: Box<dyn MeshConverter + Send + Sync>) -> Self {
        Self {
            converter,
            entries: DashMap::new(),
            chain_lock: Mutex::new(()),
            persist_dir: None,
            ignore_time: AtomicBool::new(false),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            conversions: AtomicUsize::new(0),
        }
    }

    /// Also store converted meshes as JSON files in `dir`
    pub fn with_persistence(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    /// Return the mesh for `path` under the default builder options
    pub fn resolve_import(&self, path: &Path, params: &ImportParams) -> Result<Mesh> {
        self.resolve_import_with(path, params, &BuilderConfig::default())
    }

    /// Return the mesh for `path`, converting it with `config` if no valid
    /// entry exists
    pub fn resolve_import_with(
        &self,
        path: &Path,
        params: &ImportParams,
        config: &BuilderConfig,
    ) -> Result<Mesh> {
        let path = path
            .canonicalize()
            .map_err(|e| CsgError::import(path, e.to_string()))?;
        let source = SourceState::read(&path)?;

        let (guard, outermost) = StackGuard::push(&path)?;
        let _chain = if outermost && self.converter.is_composite(&path) {
            Some(lock(&self.chain_lock))
        } else {
            None
        };

        let key = CacheKey {
            path: path.clone(),
            params: params.cache_tag(),
            config: config_tag(config),
        };
        let slot = self.entries.entry(key.clone()).or_default().clone();
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref() {
            if self.is_valid(cached, &source) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Import cache hit: {}", path.display());
                guard.report(cached);
                return Ok(cached.mesh.clone());
            }
        }

        if let Some(stored) = self.load_persisted(&key) {
            if self.is_valid(&stored, &source) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Import cache hit (disk): {}", path.display());
                guard.report(&stored);
                let mesh = stored.mesh.clone();
                *entry = Some(stored);
                return Ok(mesh);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Import cache miss: {}", path.display());

        let mesh = self.converter.convert(&path, params, config, self)?;
        self.conversions.fetch_add(1, Ordering::Relaxed);

        let converted = CacheEntry {
            mesh: mesh.clone(),
            source,
            dependencies: guard.take_dependencies(),
        };
        guard.report(&converted);
        self.persist(&key, &converted);
        *entry = Some(converted);
        Ok(mesh)
    }

    /// Drop every entry, in memory and on disk
    pub fn invalidate_all(&self) {
        self.entries.clear();

        let Some(dir) = &self.persist_dir else {
            return;
        };
        let Ok(listing) = std::fs::read_dir(dir) else {
            return;
        };
        for file in listing.flatten() {
            let path = file.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove cache file {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Treat every entry with unchanged content as valid regardless of the
    /// source timestamp
    pub fn ignore_modification_time(&self) {
        self.ignore_time.store(true, Ordering::Relaxed);
    }

    pub fn respect_modification_time(&self) {
        self.ignore_time.store(false, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
        }
    }

    /// The source and every recorded dependency are unchanged
    fn is_valid(&self, entry: &CacheEntry, source: &SourceState) -> bool {
        self.is_unchanged(&entry.source, source)
            && entry.dependencies.iter().all(|dependency| {
                SourceState::read(&dependency.path)
                    .is_ok_and(|current| self.is_unchanged(dependency, &current))
            })
    }

    fn is_unchanged(&self, recorded: &SourceState, current: &SourceState) -> bool {
        if recorded.digest != current.digest {
            return false;
        }
        if self.ignore_time.load(Ordering::Relaxed) {
            return true;
        }
        match (recorded.modified, current.modified) {
            (Some(recorded), Some(current)) => current <= recorded,
            (None, None) => true,
            _ => false,
        }
    }

    fn cache_file(&self, key: &CacheKey) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", key.digest())))
    }

    fn load_persisted(&self, key: &CacheKey) -> Option<CacheEntry> {
        let file = self.cache_file(key)?;
        let content = std::fs::read_to_string(&file).ok()?;

        let stored: StoredEntry = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Ignoring corrupt cache file {}: {}", file.display(), e);
                return None;
            }
        };
        if stored.source.path != key.path
            || stored.params != key.params
            || stored.config != key.config
        {
            warn!("Ignoring mismatched cache file {}", file.display());
            return None;
        }
        if let Err(e) = stored.mesh.validate() {
            warn!("Ignoring invalid cached mesh {}: {}", file.display(), e);
            return None;
        }

        Some(CacheEntry {
            mesh: stored.mesh,
            source: stored.source,
            dependencies: stored.dependencies,
        })
    }

    fn persist(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(file) = self.cache_file(key) else {
            return;
        };
        let stored = StoredEntry {
            params: key.params,
            config: key.config,
            source: entry.source.clone(),
            dependencies: entry.dependencies.clone(),
            mesh: entry.mesh.clone(),
        };

        let result = file
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| {
                let json = serde_json::to_string(&stored).map_err(std::io::Error::other)?;
                std::fs::write(&file, json)
            });
        if let Err(e) = result {
            warn!("Failed to write cache file {}: {}", file.display(), e);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
