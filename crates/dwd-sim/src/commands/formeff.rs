use std::error::Error;

use clap::{Args, ValueEnum};
use dwd_galaxy::CsvPopulationSource;
use dwd_post::{formation_efficiency, write_formation_efficiency, MassSource};

use super::{persist_report, AggregateArgs};

#[derive(Args, Debug)]
pub struct FormeffArgs {
    #[command(flatten)]
    pub common: AggregateArgs,
    /// Where the mass normalisation is read from.
    #[arg(long, value_enum, default_value_t = MassArg::Bundle)]
    pub mass: MassArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MassArg {
    /// `mass_total` stored in each result bundle.
    Bundle,
    /// Recomputed from the population tables.
    Population,
}

impl From<MassArg> for MassSource {
    fn from(value: MassArg) -> Self {
        match value {
            MassArg::Bundle => MassSource::Bundle,
            MassArg::Population => MassSource::Population,
        }
    }
}

pub fn run(args: &FormeffArgs) -> Result<(), Box<dyn Error>> {
    let ctx = args.common.context()?;
    let source = CsvPopulationSource::new(ctx.plan.population_root());
    let bins = ctx.plan.bin_indices();
    for model in &ctx.models {
        let table = formation_efficiency(
            &source,
            &ctx.plan.output_root(),
            &ctx.plan.binary_types,
            *model,
            &bins,
            args.mass.into(),
        )
        .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        let report = write_formation_efficiency(&ctx.out, &table)
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        persist_report(&ctx.out, &report)?;
    }
    Ok(())
}
