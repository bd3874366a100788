use clap::Parser;
use hotlines::cli::{run_config, run_export, run_keygen, run_list, run_refresh, run_serve, Cli, Commands};
use hotlines::Config;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        None => {
            // No subcommand provided - print the directory
            run_list(&config, false)?;
        }
        Some(Commands::Serve(args)) => {
            run_serve(&config, args.port)?;
        }
        Some(Commands::Refresh) => {
            run_refresh(&config)?;
        }
        Some(Commands::List(args)) => {
            run_list(&config, args.json)?;
        }
        Some(Commands::Export(args)) => {
            run_export(&config, args.name.as_deref(), args.out.as_deref())?;
        }
        Some(Commands::Keygen) => {
            run_keygen()?;
        }
        Some(Commands::Config) => {
            run_config(&config)?;
        }
    }

    Ok(())
}
