mod common;

use std::fs;

use common::{INFO, WINDOW, loop_notes, write_kit_and_noise, write_sample};
use rattle::Error;
use rattle::config::{FixW, NmfType, NoiseSelection, Params};
use rattle::dataset::Dataset;
use rattle::eval::Outcome;
use rattle::spectrogram::{SpectrogramKey, SpectrogramStore};

fn data_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_kit_and_noise(dir.path());
    write_sample(dir.path(), "01", INFO, &loop_notes());
    dir
}

#[test]
fn discovers_well_formed_samples() {
    let root = data_root();
    write_sample(root.path(), "02", INFO, &loop_notes());
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    assert_eq!(dataset.samples().len(), 2);
    assert!(dataset.skipped().is_empty());

    let sample = &dataset.samples()[0];
    assert_eq!(sample.name, "01");
    assert_eq!(sample.meta().kit, "synth");
    assert_eq!(sample.meta().notes(), vec![36, 38]);
    for source in ["drum-loops/01/loop", "kits/synth/kick", "background/hum", "background-loud/hum"] {
        assert!(
            dataset.store().contains(&SpectrogramKey::new(source, WINDOW)),
            "{} not registered",
            source
        );
    }
}

#[test]
fn skips_malformed_samples() {
    let root = data_root();

    write_sample(root.path(), "two-wavs", INFO, &loop_notes());
    fs::write(root.path().join("drum-loops/two-wavs/other.wav"), b"").unwrap();

    write_sample(root.path(), "no-midi", INFO, &loop_notes());
    fs::remove_file(root.path().join("drum-loops/no-midi/loop.mid")).unwrap();

    write_sample(root.path(), "no-info", INFO, &loop_notes());
    fs::remove_file(root.path().join("drum-loops/no-info/info.txt")).unwrap();

    let missing_hat = format!("{}42 hat.wav\n", INFO);
    write_sample(root.path(), "missing-instrument", &missing_hat, &loop_notes());

    let mut extra = loop_notes();
    extra.push((500, 46));
    write_sample(root.path(), "note-mismatch", INFO, &extra);

    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    let names: Vec<&str> = dataset.samples().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["01"]);
    assert_eq!(
        dataset.skipped(),
        &["missing-instrument", "no-info", "no-midi", "note-mismatch", "two-wavs"]
    );
}

#[test]
fn nmf_scores_every_hit() {
    let root = data_root();
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    let params = Params::new().with_nmf_type(NmfType::Nmf);
    let report = dataset.evaluate(&params, 0).unwrap();
    assert_eq!(report.samples.len(), 1);
    assert!(report.failed.is_empty());
    assert_eq!(report.total, Outcome::new(7, 0, 0));
    assert_eq!(report.mean.f_measure, 1.0);
}

#[test]
fn nmfd_scores_every_hit_with_noise() {
    let root = data_root();
    write_sample(root.path(), "02", INFO, &loop_notes());
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    for level in [1, 2] {
        let params = Params::new()
            .with_nmf_type(NmfType::Nmfd)
            .with_fix_w(FixW::Semi { beta: 4.0 })
            .with_noise(Some(NoiseSelection::new("hum", level)));
        let report = dataset.evaluate(&params, 11).unwrap();
        assert_eq!(report.total, Outcome::new(14, 0, 0));
        assert_eq!(report.mean.precision, 1.0);
        assert_eq!(report.mean.recall, 1.0);
    }
}

#[test]
fn evaluation_is_reproducible() {
    let root = data_root();
    write_sample(root.path(), "02", INFO, &loop_notes());
    write_sample(root.path(), "03", INFO, &loop_notes());
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    let params = Params::new()
        .with_nmf_type(NmfType::Nmf)
        .with_noise(Some(NoiseSelection::new("hum", 1)));
    let first = dataset.evaluate(&params, 5).unwrap();
    let second = dataset.evaluate(&params, 5).unwrap();
    assert_eq!(first, second);
}

#[test]
fn failing_samples_are_reported_not_fatal() {
    let root = data_root();
    write_sample(root.path(), "02", INFO, &loop_notes());
    fs::remove_file(root.path().join(format!("drum-loops/02/loop-{}.npy", WINDOW))).unwrap();
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    assert_eq!(dataset.samples().len(), 2);

    let report = dataset.evaluate(&Params::new().with_nmf_type(NmfType::Nmf), 0).unwrap();
    assert_eq!(report.failed, vec!["02".to_string()]);
    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.mean.f_measure, 1.0);

    let missing_noise = Params::new().with_noise(Some(NoiseSelection::new("airplane", 2)));
    let report = dataset.evaluate(&missing_noise, 0).unwrap();
    assert!(report.samples.is_empty());
    assert_eq!(report.failed.len(), 2);
}

#[test]
fn window_must_match_discovery() {
    let root = data_root();
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    let err = dataset.evaluate(&Params::new().with_window(1024), 0);
    assert!(matches!(err, Err(Error::InvalidParameter { name: "window", .. })));
}

#[test]
fn store_caches_loaded_spectrograms() {
    let root = data_root();
    let dataset = Dataset::discover(root.path(), WINDOW).unwrap();
    let key = SpectrogramKey::new("kits/synth/snare", WINDOW);
    assert_eq!(dataset.store().cached(), 0);
    let first = dataset.store().load(&key).unwrap();
    let second = dataset.store().load(&key).unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(dataset.store().cached(), 1);
    assert_eq!(first.n_bins(), 8);
}
