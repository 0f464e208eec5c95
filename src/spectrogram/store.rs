use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use ndarray_npy::{ReadNpyError, read_npy};
use parking_lot::RwLock;

use super::Spectrogram;
use crate::{Error, Result};

/// Cache key: which recording, at which STFT window size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpectrogramKey {
    pub source: String,
    pub window: usize,
}

impl SpectrogramKey {
    pub fn new(source: impl Into<String>, window: usize) -> Self {
        Self {
            source: source.into(),
            window,
        }
    }
}

impl fmt::Display for SpectrogramKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.window)
    }
}

/// Supplier of precomputed magnitude spectrograms.
pub trait SpectrogramStore: Send + Sync {
    fn load(&self, key: &SpectrogramKey) -> Result<Arc<Spectrogram>>;
}

fn missing(key: &SpectrogramKey) -> Error {
    Error::MissingSpectrogram {
        source_id: key.source.clone(),
        window: key.window,
    }
}

/// In-memory store filled up front.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<SpectrogramKey, Arc<Spectrogram>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SpectrogramKey, spectrogram: Spectrogram) {
        self.entries.insert(key, Arc::new(spectrogram));
    }

    pub fn with(mut self, key: SpectrogramKey, spectrogram: Spectrogram) -> Self {
        self.insert(key, spectrogram);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SpectrogramStore for MemoryStore {
    fn load(&self, key: &SpectrogramKey) -> Result<Arc<Spectrogram>> {
        self.entries.get(key).cloned().ok_or_else(|| missing(key))
    }
}

/// Store backed by `.npy` files, read lazily and cached.
///
/// Each key is registered with an explicit path; the store never derives a
/// key from a file name.
#[derive(Debug, Default)]
pub struct NpyStore {
    paths: HashMap<SpectrogramKey, PathBuf>,
    cache: RwLock<HashMap<SpectrogramKey, Arc<Spectrogram>>>,
}

impl NpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: SpectrogramKey, path: impl Into<PathBuf>) {
        self.paths.insert(key, path.into());
    }

    pub fn contains(&self, key: &SpectrogramKey) -> bool {
        self.paths.contains_key(key)
    }

    /// Number of spectrograms currently held in memory.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

/// Read a 2D `.npy` array stored as either float64 or float32.
pub fn read_magnitude(path: &Path) -> Result<Array2<f64>> {
    match read_npy::<_, Array2<f64>>(path) {
        Ok(data) => Ok(data),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let data: Array2<f32> = read_npy(path)?;
            Ok(data.mapv(f64::from))
        }
        Err(e) => Err(e.into()),
    }
}

impl SpectrogramStore for NpyStore {
    fn load(&self, key: &SpectrogramKey) -> Result<Arc<Spectrogram>> {
        if let Some(hit) = self.cache.read().get(key) {
            return Ok(Arc::clone(hit));
        }
        let path = self.paths.get(key).ok_or_else(|| missing(key))?;
        log::debug!("loading spectrogram {} from {}", key, path.display());
        let spectrogram = Arc::new(Spectrogram::new(read_magnitude(path)?)?);

        // Another thread may have loaded the same key meanwhile; keep the first.
        let mut cache = self.cache.write();
        let entry = cache
            .entry(key.clone())
            .or_insert_with(|| Arc::clone(&spectrogram));
        Ok(Arc::clone(entry))
    }
}
