// src/pipeline/cache.rs - Memoization of the resolved dataset by input identity
use anyhow::{Context, Result};
use log::{debug, info};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::errors::TerritoryLoadError;
use crate::models::records::{ResolvedBusinessRecord, RosterEntry};
use crate::models::stats_models::PipelineStats;

/// Identity of one load: archive contents in order, plus the territory
/// file's path and modification time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_inputs(archives: &[PathBuf], territory: &Path) -> Result<Self> {
        let mut hasher = Sha256::new();
        for archive in archives {
            match File::open(archive) {
                Ok(mut file) => {
                    let mut archive_hasher = Sha256::new();
                    std::io::copy(&mut file, &mut archive_hasher)
                        .with_context(|| format!("hashing {}", archive.display()))?;
                    hasher.update(archive_hasher.finalize());
                }
                // Unreadable archives are skipped by extraction; key on the path.
                Err(_) => {
                    hasher.update(b"unreadable:");
                    hasher.update(archive.to_string_lossy().as_bytes());
                }
            }
        }

        let modified = std::fs::metadata(territory)
            .and_then(|m| m.modified())
            .map_err(|e| TerritoryLoadError::Unreadable {
                path: territory.to_path_buf(),
                reason: e.to_string(),
            })?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        hasher.update(b"territory:");
        hasher.update(territory.to_string_lossy().as_bytes());
        hasher.update(mtime.to_le_bytes());

        Ok(Self(hex::encode(hasher.finalize())))
    }
}

/// Dataset as it stands before the status overlay and last-modified
/// derivation, which are applied fresh on every call.
#[derive(Debug, Clone)]
pub struct ResolvedBase {
    pub records: Vec<ResolvedBusinessRecord>,
    pub roster: Vec<RosterEntry>,
    pub stats: PipelineStats,
}

pub struct ResolutionCache {
    inner: Option<LruCache<CacheKey, ResolvedBase>>,
    pub hits: usize,
    pub misses: usize,
}

impl ResolutionCache {
    /// Capacity 0 disables caching.
    pub fn new(capacity: usize) -> Self {
        info!("Initializing ResolutionCache with capacity: {}", capacity);
        Self {
            inner: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<ResolvedBase> {
        let found = self.inner.as_mut()?.get(key).cloned();
        match found {
            Some(_) => self.hits += 1,
            None => self.misses += 1,
        }
        debug!("ResolutionCache hits: {}, misses: {}", self.hits, self.misses);
        found
    }

    pub fn put(&mut self, key: CacheKey, base: ResolvedBase) {
        if let Some(cache) = self.inner.as_mut() {
            cache.put(key, base);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
