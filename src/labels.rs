//! Ground-truth onsets read from Standard MIDI Files.

use std::collections::BTreeMap;
use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::config::TickConversion;
use crate::{Error, Result};

/// Tempo in effect before the first tempo event, in microseconds per beat.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Onset ticks per MIDI note, taken from the first track of a MIDI file.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub ticks_per_beat: u16,
    /// Absolute tick of the last event of the first track.
    pub length_ticks: u64,
    /// Playback length of the file in seconds, following its tempo map.
    pub length_secs: f64,
    /// Ascending onset ticks keyed by note number.
    pub onsets: BTreeMap<u8, Vec<u64>>,
}

impl GroundTruth {
    /// Read and parse a MIDI file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let smf = Smf::parse(bytes)?;
        Self::from_smf(&smf)
    }

    /// Collect the onsets of the first track.
    ///
    /// Every note-on with a non-zero velocity is an onset. Absolute ticks
    /// accumulate the delta of every event, meta events included.
    pub fn from_smf(smf: &Smf<'_>) -> Result<Self> {
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
            other => {
                return Err(Error::InvalidParameter {
                    name: "timing",
                    value: format!("{:?}", other),
                    reason: "only metrical timing is supported".to_string(),
                });
            }
        };
        let track = smf
            .tracks
            .first()
            .ok_or_else(|| Error::Metadata("MIDI file has no tracks".to_string()))?;

        let mut onsets: BTreeMap<u8, Vec<u64>> = BTreeMap::new();
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } = event.kind
            {
                if vel.as_int() > 0 {
                    onsets.entry(key.as_int()).or_default().push(tick);
                }
            }
        }

        Ok(Self {
            ticks_per_beat,
            length_ticks: tick,
            length_secs: playback_length(smf, ticks_per_beat),
            onsets,
        })
    }

    /// Notes with at least one onset, ascending.
    pub fn notes(&self) -> Vec<u8> {
        self.onsets.keys().copied().collect()
    }

    /// Onset ticks of `note`; empty if the note never sounds.
    pub fn onset_ticks(&self, note: u8) -> &[u64] {
        self.onsets.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Onset times of `note` in seconds.
    pub fn onset_seconds(&self, note: u8, seconds_per_tick: f64) -> Vec<f64> {
        self.onset_ticks(note)
            .iter()
            .map(|&t| t as f64 * seconds_per_tick)
            .collect()
    }

    /// Fail unless the notes in the file are exactly the `declared` ones.
    pub fn check_notes(&self, declared: &[u8]) -> Result<()> {
        let mut declared = declared.to_vec();
        declared.sort_unstable();
        declared.dedup();
        let found = self.notes();
        if found != declared {
            return Err(Error::NoteMismatch { found, declared });
        }
        Ok(())
    }
}

/// Seconds of end of file, integrating the tempo map of all tracks.
fn playback_length(smf: &Smf<'_>, ticks_per_beat: u16) -> f64 {
    let mut tempo_changes = Vec::new();
    let mut end = 0u64;
    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                tempo_changes.push((tick, tempo.as_int()));
            }
        }
        end = end.max(tick);
    }
    tempo_changes.sort_by_key(|&(tick, _)| tick);

    let tpb = f64::from(ticks_per_beat);
    let mut seconds = 0.0;
    let mut last_tick = 0u64;
    let mut tempo = DEFAULT_TEMPO;
    for (tick, next) in tempo_changes {
        let tick = tick.min(end);
        seconds += (tick - last_tick) as f64 * f64::from(tempo) * 1e-6 / tpb;
        last_tick = tick;
        tempo = next;
    }
    seconds + (end - last_tick) as f64 * f64::from(tempo) * 1e-6 / tpb
}

/// Converts MIDI ticks to seconds of the audio recording.
pub trait TickClock {
    fn seconds_per_tick(&self, truth: &GroundTruth, bpm: f64) -> Result<f64>;
}

/// Ticks at the recording's own tempo: `60 / (bpm * ticks_per_beat)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingTempo;

impl TickClock for RecordingTempo {
    fn seconds_per_tick(&self, truth: &GroundTruth, bpm: f64) -> Result<f64> {
        check_bpm(bpm)?;
        Ok(60.0 / (bpm * f64::from(truth.ticks_per_beat)))
    }
}

/// MIDI playback length over the first track's tick count, rescaled from
/// 120 BPM to the recording tempo.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthRatio;

impl TickClock for LengthRatio {
    fn seconds_per_tick(&self, truth: &GroundTruth, bpm: f64) -> Result<f64> {
        check_bpm(bpm)?;
        if truth.length_ticks == 0 {
            return Err(Error::InvalidSize {
                name: "length_ticks",
                value: 0,
                reason: "MIDI track has no duration",
            });
        }
        Ok(truth.length_secs / truth.length_ticks as f64 * (120.0 / bpm))
    }
}

impl TickClock for TickConversion {
    fn seconds_per_tick(&self, truth: &GroundTruth, bpm: f64) -> Result<f64> {
        match self {
            TickConversion::RecordingTempo => RecordingTempo.seconds_per_tick(truth, bpm),
            TickConversion::LengthRatio => LengthRatio.seconds_per_tick(truth, bpm),
        }
    }
}

fn check_bpm(bpm: f64) -> Result<()> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter {
            name: "bpm",
            value: bpm.to_string(),
            reason: "must be positive".to_string(),
        })
    }
}
