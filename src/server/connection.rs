use std::net::TcpStream;
use std::sync::Arc;

use log::{info, warn};

use crate::auth::CredentialStore;
use crate::commands::{parse_argv, parse_pipeline};
use crate::config::{ServerConfig, PROMPT};
use crate::error::{Error, Result};
use crate::pipeline;
use crate::transfer::{self, IoCtx};

/// Serve one accepted connection from login to teardown. Runs on its own
/// worker thread; any error here ends this session only.
pub(crate) fn handle_connection(
    stream: TcpStream,
    client_id: u64,
    store: Arc<CredentialStore>,
    cfg: Arc<ServerConfig>,
) -> Result<()> {
    let mut io = IoCtx::new(stream)?;

    let user = match login(&mut io, &store, &cfg, client_id)? {
        Some(user) => user,
        None => return Ok(()), // the failure reply has already been sent
    };
    info!("::client {} logged in as {}", client_id, store.username_at(user));

    command_loop(&mut io, client_id)
}

/// Run the login dialogue: greeting, then up to the configured number of
/// `Username: ` / `Password: ` rounds. Returns the authenticated user index
/// or `None` after the attempts are spent. The client is told nothing about
/// individual failed rounds; passwords never reach the log.
fn login(
    io: &mut IoCtx,
    store: &CredentialStore,
    cfg: &ServerConfig,
    client_id: u64,
) -> Result<Option<usize>> {
    io.send(&cfg.greeting)?;
    for _ in 0..cfg.max_login_attempts {
        io.send("Username: ")?;
        let username = io.recv_line()?;
        info!("::client {} sent {}", client_id, username);

        io.send("Password: ")?;
        let password = io.recv_line()?;

        if let Some(user) = store.verify(&username, &password) {
            io.send(&format!("welcome back {}\n", store.username_at(user)))?;
            return Ok(Some(user));
        }
        warn!("::client {} failed password attempt", client_id);
    }
    io.send("login failed\n")?;
    Ok(None)
}

/// The per-session REPL: prompt, read one line, dispatch, repeat. Reserved
/// verbs match exactly (no arguments on the same line); anything else is
/// handed to the pipeline engine.
fn command_loop(io: &mut IoCtx, client_id: u64) -> Result<()> {
    loop {
        io.send(PROMPT)?;
        let line = match io.try_recv_line()? {
            Some(line) => line,
            None => return Ok(()), // peer went away at the prompt
        };
        info!("::client {} sent {}", client_id, line);

        match line.as_str() {
            "get" => transfer::server_get(io, client_id)?,
            "put" => transfer::server_put(io, client_id)?,
            "del" => transfer::server_del(io, client_id)?,
            "help" => transfer::server_help(io)?,
            "exit" => return Ok(()),
            "" => continue,
            _ => run_command_line(io, client_id, &line)?,
        }
    }
}

/// Execute one pipeline command line. Exec-level failures (unknown program,
/// spawn error) are reported and swallowed so the loop continues; the
/// client just sees the next prompt. Anything else is session-fatal.
fn run_command_line(io: &mut IoCtx, client_id: u64, line: &str) -> Result<()> {
    let stages = parse_pipeline(&parse_argv(line));
    match pipeline::run(&stages, &io.writer) {
        Ok(()) => Ok(()),
        Err(Error::Exec(e)) => {
            warn!("::client {} command failed: {}", client_id, e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
