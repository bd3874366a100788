use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod export;
pub mod keygen;
pub mod list;
pub mod refresh;
pub mod serve;
pub mod settings;

pub use export::run_export;
pub use keygen::run_keygen;
pub use list::run_list;
pub use refresh::run_refresh;
pub use serve::run_serve;
pub use settings::run_config;

#[derive(Parser)]
#[command(name = "hotlines")]
#[command(about = "Emergency contacts directory backed by a published spreadsheet")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (fetch trigger, contacts, vCard downloads)
    Serve(ServeArgs),
    /// Check the sheet for changes and rebuild the cache if needed
    Refresh,
    /// Print the directory
    List(ListArgs),
    /// Write a vCard for one contact or the whole directory
    Export(ExportArgs),
    /// Generate a random fetch key
    Keygen,
    /// Show the effective configuration
    Config,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Print contact cards as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Contact name or label; exports every contact when omitted
    #[arg(short, long)]
    pub name: Option<String>,
    /// Output file (defaults to the derived .vcf name in the current directory)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
