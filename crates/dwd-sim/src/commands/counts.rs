use std::error::Error;

use clap::Args;
use dwd_post::{source_counts, write_source_counts};

use super::{persist_report, AggregateArgs};

#[derive(Args, Debug)]
pub struct CountsArgs {
    #[command(flatten)]
    pub common: AggregateArgs,
}

pub fn run(args: &CountsArgs) -> Result<(), Box<dyn Error>> {
    let ctx = args.common.context()?;
    let bins = ctx.plan.bin_indices();
    for model in &ctx.models {
        let counts = source_counts(&ctx.plan.output_root(), &ctx.plan.binary_types, *model, &bins)
            .map_err(|err| Box::new(err) as Box<dyn Error>)?;
        let report =
            write_source_counts(&ctx.out, &counts).map_err(|err| Box::new(err) as Box<dyn Error>)?;
        persist_report(&ctx.out, &report)?;
    }
    Ok(())
}
