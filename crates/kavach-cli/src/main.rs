use clap::{Parser, Subcommand};
use tracing::Level;

mod serve;
mod urgency;

/// Kavach: deepfake detection, crime classification and urgency triage
#[derive(Parser)]
#[command(name = "kavach", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP inference server
    Serve(serve::ServeArgs),
    /// Classify the urgency of one line read from stdin
    Urgency(urgency::UrgencyArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let debug = matches!(&cli.command, Command::Serve(args) if args.debug);
    tracing_subscriber::fmt()
        .with_max_level(if debug { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("kavach v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve(args) => serve::run(args),
        Command::Urgency(args) => urgency::run(&args),
    }
}
