use std::error::Error;

use clap::Args;
use dwd_galaxy::CsvPopulationSource;
use dwd_post::{interaction_separations, AggregateReport};

use super::{persist_report, AggregateArgs};

#[derive(Args, Debug)]
pub struct IntersepArgs {
    #[command(flatten)]
    pub common: AggregateArgs,
}

pub fn run(args: &IntersepArgs) -> Result<(), Box<dyn Error>> {
    let ctx = args.common.context()?;
    let source = CsvPopulationSource::new(ctx.plan.population_root());
    let bins = ctx.plan.bin_indices();
    for model in &ctx.models {
        let mut report = AggregateReport::new("intersep", *model);
        for binary_type in &ctx.plan.binary_types {
            let summary = interaction_separations(
                &source,
                &ctx.plan.output_root(),
                &ctx.out,
                *binary_type,
                *model,
                &bins,
            )
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
            report.outputs.push(summary.path);
            report.gaps.extend(summary.gaps);
        }
        persist_report(&ctx.out, &report)?;
    }
    Ok(())
}
