//! Dataset Evaluation Example
//!
//! Walks a data root laid out as `drum-loops/`, `kits/` and `background*/`
//! and scores every sample for one parameter setting.
//!
//! ```text
//! RUST_LOG=info cargo run --example evaluate_dataset -- <data-root> [NMF|NMFD] [fixed|semi:<beta>|adaptive] [added-components] [noise:level]
//! ```

use std::env;
use std::process::ExitCode;

use log::{error, info};
use rattle::config::{FixW, NmfType, NoiseSelection, Params};
use rattle::dataset::Dataset;

fn parse_noise(arg: &str) -> rattle::Result<Option<NoiseSelection>> {
    if arg == "None" {
        return Ok(None);
    }
    arg.parse().map(Some)
}

fn run(args: &[String]) -> rattle::Result<()> {
    let root = &args[0];
    let nmf_type: NmfType = args.get(1).map_or(Ok(NmfType::Nmfd), |s| s.parse())?;
    let fix_w: FixW = args.get(2).map_or(Ok(FixW::Adaptive), |s| s.parse())?;
    let added: usize = match args.get(3) {
        Some(s) => s.parse().map_err(|e: std::num::ParseIntError| rattle::Error::InvalidParameter {
            name: "addedCompW",
            value: s.clone(),
            reason: e.to_string(),
        })?,
        None => 0,
    };
    let noise = args.get(4).map_or(Ok(None), |s| parse_noise(s))?;

    let params = Params::new()
        .with_nmf_type(nmf_type)
        .with_fix_w(fix_w)
        .with_added_comp_w(added)
        .with_noise(noise);
    info!("{:?}", params);

    let dataset = Dataset::discover(root, params.window)?;
    let report = dataset.evaluate(&params, 0)?;

    info!("{} samples scored, {} failed", report.samples.len(), report.failed.len());
    info!("total: {}", report.total);
    info!(
        "mean F = {:.2}, P = {:.2}, R = {:.2}",
        report.mean.f_measure, report.mean.precision, report.mean.recall
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        error!("usage: evaluate_dataset <data-root> [NMF|NMFD] [fixed|semi:<beta>|adaptive] [added] [noise:level]");
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
