use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use tracing::info;

use graphpipe_engine::ServerHandle;

/// Spawns the signal thread: SIGINT/SIGTERM trigger graceful shutdown,
/// SIGUSR1 flushes the metrics counters. (SIGPIPE is already ignored by the
/// runtime, so dead-peer writes surface as errors instead of killing the
/// process.)
pub fn spawn(handle: ServerHandle) -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGUSR1])?;
    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                match signal {
                    SIGUSR1 => {
                        info!("SIGUSR1 received, flushing metrics");
                        handle.flush_metrics();
                    }
                    _ => {
                        info!(signal, "termination signal received");
                        handle.shutdown();
                        return;
                    }
                }
            }
        })?;
    Ok(())
}
