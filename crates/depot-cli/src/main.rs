mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, fleet::FleetSubcommand, report::ReportSubcommand,
    stock::StockSubcommand,
};
use depot_core::policy::Role;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "depot",
    about = "Stock ledger and maintenance due-date scanner",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .depot/)
    #[arg(long, global = true, env = "DEPOT_ROOT")]
    root: Option<PathBuf>,

    /// Role claimed for this invocation (operator | elevated)
    #[arg(long, global = true, env = "DEPOT_ROLE", default_value = "operator")]
    role: Role,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .depot/ with a default config and an empty database
    Init,

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Stock items: register, receive, issue, edit, remove
    Stock {
        #[command(subcommand)]
        subcommand: StockSubcommand,
    },

    /// Timed resources: register, service, edit, remove
    Fleet {
        #[command(subcommand)]
        subcommand: FleetSubcommand,
    },

    /// Run one due scan and print any new notifications
    Scan {
        /// Scan as of this date (default: today)
        #[arg(long)]
        today: Option<chrono::NaiveDate>,
    },

    /// Run the due scanner on its poll interval until interrupted
    Watch,

    /// Aggregate reports (elevated role)
    Report {
        #[command(subcommand)]
        subcommand: ReportSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Stock { subcommand } => cmd::stock::run(&root, subcommand, cli.role, cli.json),
        Commands::Fleet { subcommand } => cmd::fleet::run(&root, subcommand, cli.role, cli.json),
        Commands::Scan { today } => cmd::scan::run(&root, today, cli.json),
        Commands::Watch => cmd::scan::watch(&root, cli.json),
        Commands::Report { subcommand } => {
            cmd::report::run(&root, subcommand, cli.role, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
