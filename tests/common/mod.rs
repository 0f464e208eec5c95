#![allow(dead_code)]

use std::fs;
use std::path::Path;

use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use ndarray::{Array2, s};
use ndarray_npy::write_npy;

pub const WINDOW: usize = 512;
pub const FRAMES: usize = 120;
pub const KICK_HITS: [usize; 4] = [8, 40, 72, 104];
pub const SNARE_HITS: [usize; 3] = [24, 56, 88];
const FLOOR: f64 = f64::EPSILON;

fn pattern(spectrum: &[f64; 8], envelope: &[f64; 4]) -> Array2<f64> {
    Array2::from_shape_fn((8, 4), |(k, t)| (spectrum[k] * envelope[t]).max(FLOOR))
}

pub fn kick() -> Array2<f64> {
    pattern(&[2.0, 1.5, 0.5, 0.2, 0.0, 0.0, 0.0, 0.0], &[1.0, 0.5, 0.25, 0.1])
}

pub fn snare() -> Array2<f64> {
    pattern(&[0.0, 0.0, 0.0, 0.3, 1.2, 1.5, 1.0, 0.6], &[1.0, 0.6, 0.3, 0.1])
}

/// Loop spectrogram with non-overlapping kick and snare hits.
pub fn mix() -> Array2<f64> {
    let mut v = Array2::zeros((8, FRAMES));
    for (hits, p) in [(&KICK_HITS[..], kick()), (&SNARE_HITS[..], snare())] {
        for &f in hits {
            let mut window = v.slice_mut(s![.., f..f + 4]);
            window += &p;
        }
    }
    v.mapv_into(|x: f64| x.max(FLOOR))
}

pub fn noise() -> Array2<f64> {
    Array2::from_shape_fn((8, 200), |(k, j)| {
        0.02 * (1.0 + 0.5 * (0.7 * j as f64 + k as f64).sin())
    })
}

/// Tick of frame `f` (hop 256 at 22050 Hz) at 120 BPM and 480 ticks per beat.
pub fn tick(f: usize) -> u32 {
    (f as f64 * 256.0 / 22050.0 * 960.0).round() as u32
}

/// Single-track MIDI file with a note-on per `(tick, key)` and a
/// zero-velocity note-on ten ticks later.
pub fn midi(notes: &[(u32, u8)]) -> Vec<u8> {
    let mut events: Vec<(u32, TrackEventKind<'static>)> = vec![(
        0,
        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
    )];
    for &(tick, key) in notes {
        for (at, vel) in [(tick, 100u8), (tick + 10, 0)] {
            events.push((
                at,
                TrackEventKind::Midi {
                    channel: u4::new(9),
                    message: MidiMessage::NoteOn {
                        key: u7::new(key),
                        vel: u7::new(vel),
                    },
                },
            ));
        }
    }
    events.sort_by_key(|&(at, _)| at);

    let mut track = Track::new();
    let mut last = 0;
    for (at, kind) in events {
        track.push(TrackEvent {
            delta: u28::new(at - last),
            kind,
        });
        last = at;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(u15::new(480)),
    });
    smf.tracks.push(track);
    let mut bytes = Vec::new();
    smf.write_std(&mut bytes).unwrap();
    bytes
}

pub fn loop_notes() -> Vec<(u32, u8)> {
    let mut notes: Vec<(u32, u8)> = KICK_HITS.iter().map(|&f| (tick(f), 36)).collect();
    notes.extend(SNARE_HITS.iter().map(|&f| (tick(f), 38)));
    notes
}

/// Write the kit and noise recordings of a data root.
pub fn write_kit_and_noise(root: &Path) {
    let kit = root.join("kits/synth/instruments");
    fs::create_dir_all(&kit).unwrap();
    fs::write(kit.join("kick.wav"), b"").unwrap();
    fs::write(kit.join("snare.wav"), b"").unwrap();
    write_npy(kit.join(format!("kick-{}.npy", WINDOW)), &kick()).unwrap();
    // Stored as f32; the store widens it on load.
    write_npy(
        kit.join(format!("snare-{}.npy", WINDOW)),
        &snare().mapv(|x| x as f32),
    )
    .unwrap();

    for dir in ["background", "background-loud"] {
        let noise_dir = root.join(dir);
        fs::create_dir_all(&noise_dir).unwrap();
        write_npy(noise_dir.join(format!("hum-{}.npy", WINDOW)), &noise()).unwrap();
    }
}

/// Write one well-formed sample directory.
pub fn write_sample(root: &Path, name: &str, info: &str, notes: &[(u32, u8)]) {
    let dir = root.join("drum-loops").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("loop.mid"), midi(notes)).unwrap();
    fs::write(dir.join("loop.wav"), b"").unwrap();
    write_npy(dir.join(format!("loop-{}.npy", WINDOW)), &mix()).unwrap();
    fs::write(dir.join("info.txt"), info).unwrap();
}

pub const INFO: &str = "120 bpm\nsynthetic loop\nsynth\n\n36 kick.wav\n38 snare.wav\n";
