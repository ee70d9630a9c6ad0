use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use dwd_galaxy::run_galaxy_from_path;

#[derive(Args, Debug)]
pub struct GalaxyArgs {
    /// YAML galaxy plan.
    #[arg(long)]
    pub plan: PathBuf,
}

pub fn run(args: &GalaxyArgs) -> Result<(), Box<dyn Error>> {
    let report = run_galaxy_from_path(&args.plan).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    let inconsistent: Vec<String> = report
        .inconsistent_bins()
        .map(|bin| bin.bundle.clone())
        .collect();
    println!(
        "bins={} rows={} plan_hash={}",
        report.bins.len(),
        report.rows_written(),
        report.provenance.plan_hash
    );
    if !inconsistent.is_empty() {
        println!("inconsistent row counts: {}", inconsistent.join(", "));
    }
    Ok(())
}
