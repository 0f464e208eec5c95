//! Directory-backed collection of drum loops.
//!
//! Expected layout under the data root:
//!
//! ```text
//! drum-loops/<sample>/{<loop>.mid, <loop>.wav, <loop>-<window>.npy, info.txt}
//! kits/<kit>/instruments/{<name>.wav, <name>-<window>.npy}
//! background/<noise>-<window>.npy
//! background-loud/<noise>-<window>.npy
//! ```
//!
//! Samples that do not fit the layout are skipped with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::Params;
use crate::eval::{Outcome, Scores};
use crate::labels::GroundTruth;
use crate::sample::{SampleMeta, SampleReport, SampleRun};
use crate::spectrogram::{NpyStore, SpectrogramKey};
use crate::{Error, Result};

pub const LOOPS_DIR: &str = "drum-loops";
pub const KITS_DIR: &str = "kits";
pub const NOISE_DIRS: [&str; 2] = ["background", "background-loud"];

/// Cached spectrogram path of a recording: `<stem>-<window>.npy` beside it.
pub fn spectrogram_path(recording: &Path, window: usize) -> PathBuf {
    recording.with_file_name(format!("{}-{}.npy", stem(recording), window))
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn single_file(dir: &Path, extension: &str) -> Result<PathBuf> {
    let mut files = files_with_extension(dir, extension)?;
    match files.len() {
        1 => Ok(files.remove(0)),
        n => Err(Error::Metadata(format!(
            "expected a single .{} file, found {}",
            extension, n
        ))),
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every sample found under a data root, plus the store holding their
/// spectrograms at one window size.
#[derive(Debug)]
pub struct Dataset {
    root: PathBuf,
    window: usize,
    store: NpyStore,
    samples: Vec<SampleRun>,
    skipped: Vec<String>,
}

impl Dataset {
    /// Walk `root` and collect every well-formed sample.
    ///
    /// Fails only if the loops directory itself cannot be read.
    pub fn discover(root: impl AsRef<Path>, window: usize) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut store = NpyStore::new();

        for dir in NOISE_DIRS {
            let noise_dir = root.join(dir);
            if !noise_dir.is_dir() {
                continue;
            }
            let suffix = format!("-{}", window);
            for path in files_with_extension(&noise_dir, "npy")? {
                if let Some(name) = stem(&path).strip_suffix(&suffix) {
                    let key = SpectrogramKey::new(format!("{}/{}", dir, name), window);
                    store.register(key, path.clone());
                }
            }
        }

        let mut dirs: Vec<PathBuf> = fs::read_dir(root.join(LOOPS_DIR))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        let mut samples = Vec::new();
        let mut skipped = Vec::new();
        for dir in dirs {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match Self::read_sample(&root, &dir, &name, window, &mut store) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    log::warn!("skipping sample {}: {}", name, e);
                    skipped.push(name);
                }
            }
        }
        log::info!(
            "found {} samples under {} ({} skipped)",
            samples.len(),
            root.display(),
            skipped.len()
        );

        Ok(Self {
            root,
            window,
            store,
            samples,
            skipped,
        })
    }

    fn read_sample(
        root: &Path,
        dir: &Path,
        name: &str,
        window: usize,
        store: &mut NpyStore,
    ) -> Result<SampleRun> {
        let midi = single_file(dir, "mid")?;
        let wav = single_file(dir, "wav")?;
        let meta = SampleMeta::read(dir.join("info.txt"))?;

        let kit_dir = root.join(KITS_DIR).join(&meta.kit).join("instruments");
        let missing: Vec<&str> = meta
            .instruments
            .iter()
            .map(|i| i.file.as_str())
            .filter(|file| !kit_dir.join(file).is_file())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Metadata(format!(
                "{:?} missing from {}",
                missing,
                kit_dir.display()
            )));
        }

        let truth = GroundTruth::read(&midi)?;
        let recording = format!("{}/{}/{}", LOOPS_DIR, name, stem(&wav));
        let mut instruments = Vec::with_capacity(meta.instruments.len());
        for entry in &meta.instruments {
            let path = kit_dir.join(&entry.file);
            let source = format!("{}/{}/{}", KITS_DIR, meta.kit, stem(&path));
            store.register(
                SpectrogramKey::new(source.clone(), window),
                spectrogram_path(&path, window),
            );
            instruments.push(source);
        }
        store.register(
            SpectrogramKey::new(recording.clone(), window),
            spectrogram_path(&wav, window),
        );
        SampleRun::new(name, meta, truth, recording, instruments)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn samples(&self) -> &[SampleRun] {
        &self.samples
    }

    /// Names of the sample directories left out during discovery.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn store(&self) -> &NpyStore {
        &self.store
    }

    /// Evaluate every sample, each with its own generator seeded from
    /// `seed + index`, so results do not depend on scheduling.
    ///
    /// Samples that fail are logged and left out of the report.
    pub fn evaluate(&self, params: &Params, seed: u64) -> Result<DatasetReport> {
        params.validate()?;
        if params.window != self.window {
            return Err(Error::InvalidParameter {
                name: "window",
                value: params.window.to_string(),
                reason: format!("dataset was discovered with window {}", self.window),
            });
        }

        let run = |(index, sample): (usize, &SampleRun)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            (sample.name.clone(), sample.evaluate(&self.store, params, &mut rng))
        };

        let results: Vec<(String, Result<SampleReport>)> = {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                self.samples.par_iter().enumerate().map(run).collect()
            }
            #[cfg(not(feature = "parallel"))]
            {
                self.samples.iter().enumerate().map(run).collect()
            }
        };

        let mut samples = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (name, result) in results {
            match result {
                Ok(report) => {
                    log::info!("{}", report);
                    samples.push(report);
                }
                Err(e) => {
                    log::warn!("sample {} failed: {}", name, e);
                    failed.push(name);
                }
            }
        }
        Ok(DatasetReport::new(samples, failed))
    }
}

/// Per-sample reports and their averages.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetReport {
    pub samples: Vec<SampleReport>,
    /// Samples whose evaluation returned an error.
    pub failed: Vec<String>,
    /// Per-sample precision, recall and F-measure averaged over samples.
    pub mean: Scores,
    /// Counts summed over every sample.
    pub total: Outcome,
}

impl DatasetReport {
    pub fn new(samples: Vec<SampleReport>, failed: Vec<String>) -> Self {
        let total = samples.iter().map(|s| s.outcome).sum();
        let mean = if samples.is_empty() {
            Scores::default()
        } else {
            let n = samples.len() as f64;
            Scores {
                precision: samples.iter().map(|s| s.scores.precision).sum::<f64>() / n,
                recall: samples.iter().map(|s| s.scores.recall).sum::<f64>() / n,
                f_measure: samples.iter().map(|s| s.scores.f_measure).sum::<f64>() / n,
            }
        };
        Self {
            samples,
            failed,
            mean,
            total,
        }
    }
}
