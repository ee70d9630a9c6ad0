pub mod counts;
pub mod formeff;
pub mod galaxy;
pub mod intersep;
pub mod plan;

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use dwd_core::BinaryFractionModel;
use dwd_galaxy::codec::write_json;
use dwd_galaxy::{load_plan, GalaxyPlan};
use dwd_post::AggregateReport;

/// Arguments shared by the aggregate commands.
#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// Galaxy plan whose bundles are aggregated.
    #[arg(long)]
    pub plan: PathBuf,
    /// Restrict to one binary-fraction model; every plan model otherwise.
    #[arg(long, value_enum)]
    pub model: Option<ModelArg>,
    /// Output directory; defaults to `post/` under the plan's output root.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModelArg {
    /// Metallicity-dependent binary fraction.
    Fz,
    /// Constant 50% binary fraction.
    F50,
}

impl From<ModelArg> for BinaryFractionModel {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Fz => BinaryFractionModel::Variable,
            ModelArg::F50 => BinaryFractionModel::Fixed50,
        }
    }
}

/// Resolved inputs of an aggregate command.
pub struct AggregateContext {
    pub plan: GalaxyPlan,
    pub models: Vec<BinaryFractionModel>,
    pub out: PathBuf,
}

impl AggregateArgs {
    pub fn context(&self) -> Result<AggregateContext, Box<dyn Error>> {
        let plan = load_plan(&self.plan).map_err(|err| Box::new(err) as Box<dyn Error>)?;
        let models = match self.model {
            Some(model) => vec![model.into()],
            None => plan.models.clone(),
        };
        let out = self
            .out
            .clone()
            .unwrap_or_else(|| plan.output_root().join("post"));
        Ok(AggregateContext { plan, models, out })
    }
}

pub fn persist_report(out: &Path, report: &AggregateReport) -> Result<(), Box<dyn Error>> {
    let path = out.join(format!(
        "{}_report_{}.json",
        report.aggregate,
        report.model.label()
    ));
    write_json(&path, report).map_err(|err| Box::new(err) as Box<dyn Error>)?;
    if !report.is_complete() {
        println!(
            "{} {}: {} dataset gap(s), see {}",
            report.aggregate,
            report.model,
            report.gaps.len(),
            path.display()
        );
    }
    Ok(())
}
