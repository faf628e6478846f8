use clap::{Parser, Subcommand};
use tracing::Level;

mod cmd;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a model definition in one of the run modes
    Run(cmd::run::RunArgs),
    /// Describe the parameters of an object type
    Query(cmd::query::QueryArgs),
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cmd::run::run(args),
        Commands::Query(args) => cmd::query::run(args),
    }
}
