mod cli;
mod signal;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use graphpipe_engine::Server;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(&cli) {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let server = Server::bind(cli.server_config())?;
    println!(
        "graphpiped {} listening on {}",
        env!("CARGO_PKG_VERSION"),
        server.local_addr()
    );
    signal::spawn(server.handle())?;
    server.run()
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .init();
}
