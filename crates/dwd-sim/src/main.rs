use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    counts::{self, CountsArgs},
    formeff::{self, FormeffArgs},
    galaxy::{self, GalaxyArgs},
    intersep::{self, IntersepArgs},
    plan::{self, PlanArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "dwd-sim", about = "Synthetic double white dwarf galaxy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default galaxy plan.
    Plan(PlanArgs),
    /// Assemble the galaxy described by a plan.
    Galaxy(GalaxyArgs),
    /// Formation efficiency per binary type and metallicity bin.
    Formeff(FormeffArgs),
    /// Band survivors binned by host metallicity.
    Counts(CountsArgs),
    /// First RLOF and common-envelope separations of band survivors.
    Intersep(IntersepArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    execute(cli.command)
}

fn execute(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Plan(args) => plan::run(&args),
        Command::Galaxy(args) => galaxy::run(&args),
        Command::Formeff(args) => formeff::run(&args),
        Command::Counts(args) => counts::run(&args),
        Command::Intersep(args) => intersep::run(&args),
    }
}
