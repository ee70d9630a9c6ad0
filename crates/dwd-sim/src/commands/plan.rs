use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use dwd_galaxy::GalaxyPlan;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Master seed recorded in the plan.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Destination of the YAML plan.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &PlanArgs) -> Result<(), Box<dyn Error>> {
    let plan = GalaxyPlan::template(args.seed);
    let yaml = plan
        .to_yaml_string()
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(&args.out, yaml)?;
    Ok(())
}
