use std::thread;

use log::{info, warn};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

/// Install the interrupt disposition: the first SIGINT logs the shutdown
/// and exits with status 0, abandoning in-flight sessions to the OS.
/// Pipeline children are reaped synchronously at their wait sites, so no
/// child-exit handler is needed in the threaded model.
pub fn install() {
    let mut signals = match Signals::new([SIGINT]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("::signal setup failed: {}", e);
            return;
        }
    };
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if signals.forever().next().is_some() {
                info!("::caught interrupt");
                info!("::server down");
                std::process::exit(0);
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| warn!("::signal thread failed: {}", e));
}
