use crate::demo::{
    run_compatibility, run_demo, run_eligibility, CompatibilityArgs, DemoArgs, EligibilityArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use red_roja::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Red Roja",
    about = "Blood donation compatibility and eligibility engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the donor/recipient compatibility table
    Compatibility(CompatibilityArgs),
    /// Evaluate a donor profile against the eligibility policy
    Eligibility(EligibilityArgs),
    /// Run an end-to-end donation scenario on in-memory adapters
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Compatibility(args) => run_compatibility(args),
        Command::Eligibility(args) => run_eligibility(args),
        Command::Demo(args) => run_demo(args),
    }
}
