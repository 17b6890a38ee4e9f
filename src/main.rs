use clap::Parser;
use tracing_subscriber::EnvFilter;

use hiercc_solver::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag
    let filter = if cli.verbose {
        EnvFilter::new("hiercc_solver=debug,info")
    } else {
        EnvFilter::new("hiercc_solver=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        cli::Commands::Precluster(args) => {
            cli::precluster::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Resolve(args) => {
            cli::resolve::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Index(args) => {
            cli::index::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}
