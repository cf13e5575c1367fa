mod connection;

use std::net::TcpListener;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::net;
use crate::signals;

/// Load the credential table, install the interrupt disposition, bind the
/// listener, and serve until interrupted. Startup failures are fatal.
pub fn run_server(cfg: ServerConfig) -> Result<()> {
    let store = Arc::new(CredentialStore::load(&cfg.credentials)?);
    if store.is_empty() {
        warn!("::credential file {} has no records; nobody can log in", cfg.credentials);
    } else {
        info!("::loaded {} credential records from {}", store.len(), cfg.credentials);
    }
    signals::install();
    let listener = net::listen(&cfg.addr())?;
    info!("::server up on {}", cfg.addr());
    serve(listener, store, Arc::new(cfg))
}

/// The accept loop, split from the bootstrap so tests can drive it against
/// an ephemeral listener. Each accepted connection gets a monotonic client
/// id and its own worker thread; a worker failure never reaches here.
pub(crate) fn serve(
    listener: TcpListener,
    store: Arc<CredentialStore>,
    cfg: Arc<ServerConfig>,
) -> Result<()> {
    let next_id = AtomicU64::new(1);
    loop {
        // accept failure is fatal: the listener itself is broken
        let (stream, peer) = listener.accept().map_err(Error::Socket)?;
        let client_id = next_id.fetch_add(1, Ordering::Relaxed);
        info!("::client {} connected", client_id);
        debug!("::client {} peer address {}", client_id, peer);

        let store = Arc::clone(&store);
        let cfg = Arc::clone(&cfg);
        let spawned = thread::Builder::new()
            .name(format!("session-{client_id}"))
            .spawn(move || {
                if let Err(e) = connection::handle_connection(stream, client_id, store, cfg) {
                    warn!("::client {} session error: {}", client_id, e);
                }
                info!("::client {} disconnected", client_id);
            });
        if let Err(e) = spawned {
            // the connection is dropped but the server keeps accepting
            error!("::client {} worker spawn failed: {}", client_id, e);
        }
    }
}
