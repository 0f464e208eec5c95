//! Run configuration.
//!
//! A [`Params`] value is built once per run and handed by reference to every
//! stage of the pipeline. Nothing in the crate mutates it.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Sample rate the cached spectrograms were computed at.
pub const DEFAULT_SAMPLE_RATE: f64 = 22050.0;

/// Exponent used by the semi-fixed blend when none is given.
pub const DEFAULT_BETA: f64 = 4.0;

/// Factorization variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NmfType {
    /// Flat NMF with one spectral vector per instrument.
    Nmf,
    /// Convolutive NMFD with a spectro-temporal pattern per instrument.
    Nmfd,
}

impl NmfType {
    /// Peak-height divisor used when picking onsets from activations.
    pub fn theta(self) -> f64 {
        match self {
            NmfType::Nmf => 3.0,
            NmfType::Nmfd => 6.0,
        }
    }

    /// Default iteration budget.
    pub fn default_iterations(self) -> usize {
        match self {
            NmfType::Nmf => 1000,
            NmfType::Nmfd => 50,
        }
    }
}

impl FromStr for NmfType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NMF" | "nmf" => Ok(NmfType::Nmf),
            "NMFD" | "nmfd" => Ok(NmfType::Nmfd),
            other => Err(Error::InvalidParameter {
                name: "nmf_type",
                value: other.to_string(),
                reason: "expected NMF or NMFD".to_string(),
            }),
        }
    }
}

impl fmt::Display for NmfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NmfType::Nmf => "NMF",
            NmfType::Nmfd => "NMFD",
        })
    }
}

/// How far the instrument templates may drift from their initial values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixW {
    /// Templates are restored after every update.
    Fixed,
    /// Templates are blended with `alpha = (iteration / L)^beta`.
    Semi { beta: f64 },
    /// Templates adapt freely.
    Adaptive,
}

impl FromStr for FixW {
    type Err = Error;

    /// Parses `fixed`, `adaptive`, `semi` (default beta) or `semi:<beta>`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, beta) = match s.split_once(':') {
            Some((name, beta)) => (name, Some(beta)),
            None => (s, None),
        };
        match (name, beta) {
            ("fixed", None) => Ok(FixW::Fixed),
            ("adaptive", None) => Ok(FixW::Adaptive),
            ("semi", None) => Ok(FixW::Semi { beta: DEFAULT_BETA }),
            ("semi", Some(beta)) => {
                let beta = beta.parse::<f64>().map_err(|e| Error::InvalidParameter {
                    name: "beta",
                    value: beta.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(FixW::Semi { beta })
            }
            _ => Err(Error::InvalidParameter {
                name: "fixW",
                value: s.to_string(),
                reason: "expected fixed, semi[:beta] or adaptive".to_string(),
            }),
        }
    }
}

impl fmt::Display for FixW {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixW::Fixed => f.write_str("fixed"),
            FixW::Semi { beta } => write!(f, "semi:{beta}"),
            FixW::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// Activation matrix initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitH {
    #[default]
    Uniform,
    Random,
}

impl FromStr for InitH {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(InitH::Uniform),
            "random" => Ok(InitH::Random),
            other => Err(Error::InvalidParameter {
                name: "initH",
                value: other.to_string(),
                reason: "expected uniform or random".to_string(),
            }),
        }
    }
}

/// Conversion from MIDI ticks to seconds of recording time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickConversion {
    /// `60 / (bpm * ticks_per_beat)`.
    #[default]
    RecordingTempo,
    /// MIDI playback length over total ticks, rescaled from 120 BPM.
    LengthRatio,
}

/// Additive background interference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoiseSelection {
    /// Noise recording stem, e.g. `chatter`.
    pub name: String,
    /// Loudness level; 1 selects the quiet set.
    pub level: u8,
}

impl NoiseSelection {
    pub fn new(name: impl Into<String>, level: u8) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }

    /// Directory holding the noise recording for this level.
    pub fn directory(&self) -> &'static str {
        if self.level == 1 {
            "background"
        } else {
            "background-loud"
        }
    }
}

impl FromStr for NoiseSelection {
    type Err = Error;

    /// Parses `<name>` (level 1) or `<name>:<level>`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, level) = s.split_once(':').unwrap_or((s, "1"));
        if name.is_empty() {
            return Err(Error::InvalidParameter {
                name: "noise",
                value: s.to_string(),
                reason: "missing noise name".to_string(),
            });
        }
        let level = level.parse::<u8>().map_err(|e| Error::InvalidParameter {
            name: "noise level",
            value: level.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(name, level))
    }
}

/// Immutable parameters for one evaluation run.
///
/// # Example
/// ```
/// use rattle::config::{FixW, NmfType, Params};
///
/// let params = Params::new()
///     .with_nmf_type(NmfType::Nmf)
///     .with_fix_w(FixW::Semi { beta: 2.0 })
///     .with_added_comp_w(2);
/// assert_eq!(params.hop, 256);
/// assert_eq!(params.theta(), 3.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub nmf_type: NmfType,
    pub fix_w: FixW,
    /// Number of extra all-ones template components.
    pub added_comp_w: usize,
    pub init_h: InitH,
    /// STFT window the spectrograms were computed with.
    pub window: usize,
    /// STFT hop length.
    pub hop: usize,
    pub sample_rate: f64,
    pub noise: Option<NoiseSelection>,
    pub tick_clock: TickConversion,
    /// Matching tolerance in seconds.
    pub tolerance: f64,
    /// Overrides the per-variant iteration budget.
    pub max_iter: Option<usize>,
    /// Step-size threshold for early stopping.
    pub threshold: f64,
}

impl Params {
    pub fn new() -> Self {
        Self {
            nmf_type: NmfType::Nmfd,
            fix_w: FixW::Adaptive,
            added_comp_w: 0,
            init_h: InitH::Uniform,
            window: 512,
            hop: 256,
            sample_rate: DEFAULT_SAMPLE_RATE,
            noise: None,
            tick_clock: TickConversion::RecordingTempo,
            tolerance: 0.05,
            max_iter: None,
            threshold: 0.001,
        }
    }

    pub fn with_nmf_type(mut self, nmf_type: NmfType) -> Self {
        self.nmf_type = nmf_type;
        self
    }

    pub fn with_fix_w(mut self, fix_w: FixW) -> Self {
        self.fix_w = fix_w;
        self
    }

    pub fn with_added_comp_w(mut self, added_comp_w: usize) -> Self {
        self.added_comp_w = added_comp_w;
        self
    }

    pub fn with_init_h(mut self, init_h: InitH) -> Self {
        self.init_h = init_h;
        self
    }

    /// Set the window size; the hop follows as `window / 2`.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self.hop = window / 2;
        self
    }

    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_noise(mut self, noise: Option<NoiseSelection>) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_tick_clock(mut self, tick_clock: TickConversion) -> Self {
        self.tick_clock = tick_clock;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Feature rate in frames per second.
    pub fn fs_feature(&self) -> f64 {
        self.sample_rate / self.hop as f64
    }

    pub fn theta(&self) -> f64 {
        self.nmf_type.theta()
    }

    pub fn iteration_cap(&self) -> usize {
        self.max_iter
            .unwrap_or_else(|| self.nmf_type.default_iterations())
    }

    /// Check the parameters before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::InvalidSize {
                name: "window",
                value: 0,
                reason: "must be > 0",
            });
        }
        if self.hop == 0 {
            return Err(Error::InvalidSize {
                name: "hop",
                value: 0,
                reason: "must be > 0",
            });
        }
        if let FixW::Semi { beta } = self.fix_w {
            if !beta.is_finite() || beta < 0.0 {
                return Err(Error::InvalidParameter {
                    name: "beta",
                    value: beta.to_string(),
                    reason: "must be finite and non-negative".to_string(),
                });
            }
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidParameter {
                name: "sample_rate",
                value: self.sample_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "tolerance",
                value: self.tolerance.to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.iteration_cap() == 0 {
            return Err(Error::InvalidSize {
                name: "max_iter",
                value: 0,
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset_spellings() {
        assert_eq!("NMF".parse::<NmfType>().unwrap(), NmfType::Nmf);
        assert_eq!("NMFD".parse::<NmfType>().unwrap(), NmfType::Nmfd);
        assert_eq!("fixed".parse::<FixW>().unwrap(), FixW::Fixed);
        assert_eq!("adaptive".parse::<FixW>().unwrap(), FixW::Adaptive);
        assert_eq!(
            "semi".parse::<FixW>().unwrap(),
            FixW::Semi { beta: DEFAULT_BETA }
        );
        assert_eq!("semi:2.5".parse::<FixW>().unwrap(), FixW::Semi { beta: 2.5 });
        assert_eq!("random".parse::<InitH>().unwrap(), InitH::Random);
        assert!("NMFX".parse::<NmfType>().is_err());
        assert!("semi:x".parse::<FixW>().is_err());
        assert!("fixed:1".parse::<FixW>().is_err());
    }

    #[test]
    fn test_parse_noise_selection() {
        assert_eq!(
            "chatter".parse::<NoiseSelection>().unwrap(),
            NoiseSelection::new("chatter", 1)
        );
        assert_eq!(
            "chatter:2".parse::<NoiseSelection>().unwrap(),
            NoiseSelection::new("chatter", 2)
        );
        for bad in ["chatter:x", "chatter:", "chatter:-1", ":2"] {
            assert!(
                matches!(bad.parse::<NoiseSelection>(), Err(Error::InvalidParameter { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_display_roundtrip() {
        for fix in [FixW::Fixed, FixW::Adaptive, FixW::Semi { beta: 3.0 }] {
            assert_eq!(fix.to_string().parse::<FixW>().unwrap(), fix);
        }
        assert_eq!(NmfType::Nmfd.to_string(), "NMFD");
    }

    #[test]
    fn test_derived_values() {
        let params = Params::new().with_window(1024);
        assert_eq!(params.hop, 512);
        assert!((params.fs_feature() - 22050.0 / 512.0).abs() < 1e-12);
        assert_eq!(params.iteration_cap(), 50);
        assert_eq!(params.with_nmf_type(NmfType::Nmf).iteration_cap(), 1000);
    }

    #[test]
    fn test_validate() {
        assert!(Params::new().validate().is_ok());
        assert!(Params::new().with_hop(0).validate().is_err());
        assert!(Params::new()
            .with_fix_w(FixW::Semi { beta: -1.0 })
            .validate()
            .is_err());
        assert!(Params::new().with_max_iter(0).validate().is_err());
    }

    #[test]
    fn test_noise_directory() {
        assert_eq!(NoiseSelection::new("chatter", 1).directory(), "background");
        assert_eq!(
            NoiseSelection::new("chatter", 2).directory(),
            "background-loud"
        );
    }
}
