//! Synthetic Loop Example
//!
//! Builds a two-instrument drum loop in memory, factorizes it with both NMF
//! and NMFD and prints the estimated onsets next to the true ones.

use log::info;
use ndarray::{Array2, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rattle::config::{NmfType, Params};
use rattle::eval::match_onsets;
use rattle::factorize::{FactorizeOptions, Templates, factorize};
use rattle::onset::OnsetExtractor;
use rattle::spectrogram::{EPS, Spectrogram};
use rattle::template::{InstrumentTemplate, log_compress, template_matrix, template_tensor};

fn pattern(spectrum: &[f64], envelope: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((spectrum.len(), envelope.len()), |(k, t)| {
        (spectrum[k] * envelope[t]).max(EPS)
    })
}

fn main() -> rattle::Result<()> {
    env_logger::init();

    let kick = pattern(&[2.0, 1.5, 0.5, 0.2, 0.0, 0.0], &[1.0, 0.5, 0.2]);
    let snare = pattern(&[0.0, 0.2, 0.4, 1.2, 1.5, 0.8], &[1.0, 0.6, 0.2]);
    let hits = [(0usize, vec![4usize, 36, 68]), (1, vec![20, 52, 84])];

    let mut v = Array2::from_elem((6, 100), EPS);
    for (instrument, frames) in &hits {
        let p = if *instrument == 0 { &kick } else { &snare };
        for &f in frames {
            let mut window = v.slice_mut(s![.., f..f + 3]);
            window += p;
        }
    }
    let v = log_compress(Spectrogram::new(v)?.data());
    let templates = [
        InstrumentTemplate::new(&Spectrogram::new(kick)?),
        InstrumentTemplate::new(&Spectrogram::new(snare)?),
    ];

    for nmf_type in [NmfType::Nmf, NmfType::Nmfd] {
        let params = Params::new().with_nmf_type(nmf_type);
        let seeded = match nmf_type {
            NmfType::Nmf => Templates::Flat(template_matrix(&templates)?),
            NmfType::Nmfd => Templates::Convolutive(template_tensor(&templates)?),
        };
        let mut rng = StdRng::seed_from_u64(0);
        let result = factorize(&v, &seeded, &FactorizeOptions::from(&params), &mut rng)?;
        info!("{}: {} iterations", nmf_type, result.iterations);

        let extractor = OnsetExtractor::from_params(&params);
        for ((instrument, frames), row) in hits.iter().zip(result.instrument_activations().rows()) {
            let truth: Vec<f64> = frames.iter().map(|&f| f as f64 / params.fs_feature()).collect();
            let estimated = extractor.times_for_row(row);
            let outcome = match_onsets(&truth, &estimated, params.tolerance)?;
            info!("  instrument {}: truth {:.3?}", instrument, truth);
            info!("  instrument {}: found {:.3?} ({})", instrument, estimated, outcome);
        }
    }
    Ok(())
}
