//! One drum loop: metadata, ground truth and the estimation pipeline.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rand::Rng;

use crate::config::{NmfType, NoiseSelection, Params};
use crate::eval::{Outcome, Scores, match_onsets};
use crate::factorize::{FactorizeOptions, Templates, factorize};
use crate::labels::{GroundTruth, TickClock};
use crate::onset::OnsetExtractor;
use crate::spectrogram::{SpectrogramKey, SpectrogramStore};
use crate::template::{
    InstrumentTemplate, add_noise, log_compress, template_matrix, template_tensor,
};
use crate::{Error, Result};

/// One `<midi-note> <instrument-file>` line of `info.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentEntry {
    pub note: u8,
    pub file: String,
}

/// Contents of a sample's `info.txt`.
///
/// Line 0 starts with the tempo in BPM, line 2 names the drum kit and every
/// line from 4 on maps a MIDI note to an instrument recording of that kit.
///
/// # Example
/// ```
/// use rattle::sample::SampleMeta;
///
/// let meta: SampleMeta = "96 bpm\nfunk\n606\n\n36 kick.wav\n38 snare.wav".parse().unwrap();
/// assert_eq!(meta.bpm, 96.0);
/// assert_eq!(meta.kit, "606");
/// assert_eq!(meta.notes(), vec![36, 38]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMeta {
    pub bpm: f64,
    pub kit: String,
    pub instruments: Vec<InstrumentEntry>,
}

impl SampleMeta {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Declared notes in file order.
    pub fn notes(&self) -> Vec<u8> {
        self.instruments.iter().map(|i| i.note).collect()
    }
}

impl FromStr for SampleMeta {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lines: Vec<&str> = s.lines().collect();
        if lines.len() < 3 {
            return Err(Error::Metadata(format!(
                "expected at least 3 lines, got {}",
                lines.len()
            )));
        }
        let bpm_field = lines[0].split_whitespace().next().unwrap_or("");
        let bpm: f64 = bpm_field
            .parse()
            .map_err(|_| Error::Metadata(format!("bad tempo `{}`", bpm_field)))?;
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::Metadata(format!("tempo must be positive, got {}", bpm)));
        }
        let kit = lines[2].trim().to_string();
        if kit.is_empty() {
            return Err(Error::Metadata("missing kit name on line 3".to_string()));
        }

        let mut instruments: Vec<InstrumentEntry> = Vec::new();
        for (i, line) in lines.iter().enumerate().skip(4) {
            let mut fields = line.split_whitespace();
            let Some(note_field) = fields.next() else {
                continue;
            };
            let note: u8 = note_field
                .parse()
                .ok()
                .filter(|&n| n < 128)
                .ok_or_else(|| {
                    Error::Metadata(format!("line {}: bad MIDI note `{}`", i + 1, note_field))
                })?;
            let file = fields
                .next()
                .ok_or_else(|| Error::Metadata(format!("line {}: missing file name", i + 1)))?;
            if instruments.iter().any(|e| e.note == note) {
                return Err(Error::Metadata(format!(
                    "line {}: note {} declared twice",
                    i + 1,
                    note
                )));
            }
            instruments.push(InstrumentEntry {
                note,
                file: file.to_string(),
            });
        }
        if instruments.is_empty() {
            return Err(Error::Metadata("no instruments declared".to_string()));
        }
        Ok(Self {
            bpm,
            kit,
            instruments,
        })
    }
}

/// Store source id of a noise recording.
pub fn noise_source(noise: &NoiseSelection) -> String {
    format!("{}/{}", noise.directory(), noise.name)
}

/// Result for one instrument of a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentReport {
    pub note: u8,
    /// Ground-truth onsets in seconds.
    pub reference: Vec<f64>,
    /// Estimated onsets in seconds.
    pub estimated: Vec<f64>,
    pub outcome: Outcome,
}

/// Result for one sample, counts summed over its instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    pub name: String,
    pub instruments: Vec<InstrumentReport>,
    pub outcome: Outcome,
    pub scores: Scores,
    /// Factorization iterations actually run.
    pub iterations: usize,
}

impl fmt::Display for SampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.name, self.outcome, self.scores)
    }
}

/// Everything needed to evaluate one sample.
///
/// Spectrograms are referred to by store source id; the recording and each
/// instrument are loaded at `params.window` when the run is evaluated.
/// The metadata, ground truth and instrument sources are only set through
/// [`SampleRun::new`], which checks that they agree.
#[derive(Debug, Clone)]
pub struct SampleRun {
    pub name: String,
    /// Source id of the drum loop recording.
    pub recording: String,
    meta: SampleMeta,
    truth: GroundTruth,
    instruments: Vec<String>,
}

impl SampleRun {
    /// Build a run, checking that the MIDI notes match the metadata.
    pub fn new(
        name: impl Into<String>,
        meta: SampleMeta,
        truth: GroundTruth,
        recording: impl Into<String>,
        instruments: Vec<String>,
    ) -> Result<Self> {
        if instruments.len() != meta.instruments.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} instrument sources", meta.instruments.len()),
                got: format!("{}", instruments.len()),
            });
        }
        truth.check_notes(&meta.notes())?;
        Ok(Self {
            name: name.into(),
            meta,
            truth,
            recording: recording.into(),
            instruments,
        })
    }

    pub fn meta(&self) -> &SampleMeta {
        &self.meta
    }

    pub fn truth(&self) -> &GroundTruth {
        &self.truth
    }

    /// Source ids of the instrument recordings, in `meta().instruments` order.
    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    /// Estimate onsets and score them against the ground truth.
    ///
    /// When `params.noise` is set, one noise recording is loaded and an
    /// independently placed window of it is added to each instrument and to
    /// the loop before compression.
    pub fn evaluate<S, R>(&self, store: &S, params: &Params, rng: &mut R) -> Result<SampleReport>
    where
        S: SpectrogramStore + ?Sized,
        R: Rng + ?Sized,
    {
        params.validate()?;
        let seconds_per_tick = params
            .tick_clock
            .seconds_per_tick(&self.truth, self.meta.bpm)?;
        let key = |source: &str| SpectrogramKey::new(source, params.window);

        let noise = match &params.noise {
            Some(selection) => Some(store.load(&key(&noise_source(selection)))?),
            None => None,
        };

        let mut templates = Vec::with_capacity(self.instruments.len());
        for source in &self.instruments {
            let spectrogram = store.load(&key(source))?;
            templates.push(match &noise {
                Some(noise) => InstrumentTemplate::with_noise(&spectrogram, noise, rng)?,
                None => InstrumentTemplate::new(&spectrogram),
            });
        }

        let recording = store.load(&key(&self.recording))?;
        let v = match &noise {
            Some(noise) => log_compress(&add_noise(recording.data(), noise, rng)?),
            None => log_compress(recording.data()),
        };

        let templates = match params.nmf_type {
            NmfType::Nmf => Templates::Flat(template_matrix(&templates)?),
            NmfType::Nmfd => Templates::Convolutive(template_tensor(&templates)?),
        };
        let factorization = factorize(&v, &templates, &FactorizeOptions::from(params), rng)?;

        let extractor = OnsetExtractor::from_params(params);
        let activations = factorization.instrument_activations();
        let mut instruments = Vec::with_capacity(self.meta.instruments.len());
        for (entry, row) in self.meta.instruments.iter().zip(activations.rows()) {
            let reference = self.truth.onset_seconds(entry.note, seconds_per_tick);
            let estimated = extractor.times_for_row(row);
            let outcome = match_onsets(&reference, &estimated, params.tolerance)?;
            log::trace!("{} note {}: {}", self.name, entry.note, outcome);
            instruments.push(InstrumentReport {
                note: entry.note,
                reference,
                estimated,
                outcome,
            });
        }

        let outcome: Outcome = instruments.iter().map(|i| i.outcome).sum();
        let report = SampleReport {
            name: self.name.clone(),
            instruments,
            outcome,
            scores: outcome.scores(),
            iterations: factorization.iterations,
        };
        log::debug!("{}", report);
        Ok(report)
    }
}
