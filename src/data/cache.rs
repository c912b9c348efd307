use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use super::loader::{load_with_report, LoadReport};
use super::model::Dataset;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Stable identity of a source: its canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(PathBuf);

impl SourceId {
    pub fn for_path(path: &Path) -> Result<Self> {
        path.canonicalize()
            .map(SourceId)
            .map_err(|source| PipelineError::SourceUnavailable {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct CachedSource {
    dataset: Arc<Dataset>,
    report: LoadReport,
}

/// Memoizes loaded datasets: at most one [`Dataset`] per source, handed out
/// as a shared [`Arc`] until invalidated.
///
/// Every entry is loaded with the configuration given at construction; build
/// a new cache to load with different options.
#[derive(Debug, Default)]
pub struct DatasetCache {
    config: PipelineConfig,
    entries: HashMap<SourceId, CachedSource>,
}

impl DatasetCache {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Return the cached dataset for `path`, loading it on first request.
    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let id = SourceId::for_path(path)?;
        if let Some(entry) = self.entries.get(&id) {
            debug!("cache hit: {}", id.path().display());
            return Ok(Arc::clone(&entry.dataset));
        }
        debug!("cache miss: {}", id.path().display());
        self.load_into(id)
    }

    /// Drop any cached entry for `path` and load it again.
    pub fn reload(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        let id = SourceId::for_path(path)?;
        self.entries.remove(&id);
        self.load_into(id)
    }

    /// Forget `path`. Returns whether an entry existed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        match SourceId::for_path(path) {
            Ok(id) => self.entries.remove(&id).is_some(),
            // A source that vanished from disk is matched on its literal path.
            Err(_) => {
                let before = self.entries.len();
                self.entries.retain(|id, _| id.path() != path);
                before != self.entries.len()
            }
        }
    }

    /// Load report of the cached entry for `path`, if any.
    pub fn report(&self, path: &Path) -> Option<&LoadReport> {
        let id = SourceId::for_path(path).ok()?;
        self.entries.get(&id).map(|e| &e.report)
    }

    pub fn contains(&self, path: &Path) -> bool {
        SourceId::for_path(path).is_ok_and(|id| self.entries.contains_key(&id))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn load_into(&mut self, id: SourceId) -> Result<Arc<Dataset>> {
        let (dataset, report) = load_with_report(id.path(), &self.config)?;
        let dataset = Arc::new(dataset);
        self.entries.insert(
            id,
            CachedSource {
                dataset: Arc::clone(&dataset),
                report,
            },
        );
        Ok(dataset)
    }
}
