use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use graphpipe_engine::ServerConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "graphpiped", version, about = "Pipelined graph-algorithm TCP server")]
pub struct Cli {
    /// TCP port to listen on (positive; defaults to 9090 otherwise).
    pub port: Option<u16>,

    /// Number of acceptor/worker threads (0 = size from CPU count).
    #[arg(long, env = "GRAPHPIPE_WORKERS", default_value_t = 0)]
    pub workers: usize,

    /// Shut down after this many seconds with no connected clients.
    #[arg(long, env = "GRAPHPIPE_IDLE_TIMEOUT_SECS", default_value_t = 30)]
    pub idle_timeout_secs: u64,

    /// Capacity of each pipeline stage queue (0 = unbounded).
    #[arg(
        long,
        env = "GRAPHPIPE_QUEUE_CAPACITY",
        default_value_t = ServerConfig::DEFAULT_QUEUE_CAPACITY
    )]
    pub queue_capacity: usize,

    /// Append metrics snapshots (JSON lines) here on SIGUSR1 and shutdown.
    #[arg(long, value_name = "PATH")]
    pub metrics_output: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self
                .port
                .filter(|port| *port > 0)
                .unwrap_or(ServerConfig::DEFAULT_PORT),
            workers: self.workers,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            queue_capacity: self.queue_capacity,
            metrics_output: self.metrics_output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;
    use graphpipe_engine::ServerConfig;

    #[test]
    fn port_argument_overrides_the_default() {
        let cli = Cli::parse_from(["graphpiped", "7070"]);
        assert_eq!(cli.server_config().port, 7070);
    }

    #[test]
    fn absent_or_zero_port_falls_back_to_default() {
        let cli = Cli::parse_from(["graphpiped"]);
        assert_eq!(cli.server_config().port, ServerConfig::DEFAULT_PORT);
        let cli = Cli::parse_from(["graphpiped", "0"]);
        assert_eq!(cli.server_config().port, ServerConfig::DEFAULT_PORT);
    }

    #[test]
    fn idle_timeout_is_configurable() {
        let cli = Cli::parse_from(["graphpiped", "--idle-timeout-secs", "2"]);
        assert_eq!(cli.server_config().idle_timeout.as_secs(), 2);
    }
}
