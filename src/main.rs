mod cli;
mod engine;
mod logging;
mod model;
mod orchestrator;
mod session;
mod transport;

use clap::Parser;

#[tokio::main]
async fn main() {
    // Usage errors exit here with clap's own status code.
    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
