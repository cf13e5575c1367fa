use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use log::{info, warn};
use which::which;

use crate::commands::Stage;
use crate::error::{Error, Result};

/// Execute a pipeline of external programs with the peer socket as the
/// final stdout:
///
/// | stage       | stdin                  | stdout                     |
/// |-------------|------------------------|----------------------------|
/// | `0`         | inherited              | pipe (socket when alone)   |
/// | `0 < i < n` | previous stage's pipe  | pipe                       |
/// | `n-1`       | previous stage's pipe  | client socket (dup'd)      |
///
/// Stage programs are looked up on `PATH`. Every stage is awaited before
/// returning, and each exit status is logged, so the command loop never
/// resumes with children still writing to the socket.
pub fn run(stages: &[Stage], socket: &impl AsFd) -> Result<()> {
    if stages.is_empty() {
        return Err(Error::Exec("empty pipeline".to_string()));
    }
    let programs = resolve_stages(stages)?;
    let socket_out: OwnedFd = socket.as_fd().try_clone_to_owned()?;

    let last = stages.len() - 1;
    let mut children: Vec<Child> = Vec::with_capacity(stages.len());
    let mut next_stdin: Option<Stdio> = None;
    let mut socket_out = Some(socket_out);
    let mut spawn_err: Option<Error> = None;

    for (i, stage) in stages.iter().enumerate() {
        let mut cmd = Command::new(&programs[i]);
        cmd.args(&stage.argv[1..]);
        if let Some(stdin) = next_stdin.take() {
            cmd.stdin(stdin);
        }
        if i == last {
            match socket_out.take() {
                Some(fd) => cmd.stdout(Stdio::from(fd)),
                None => break, // unreachable: the socket dup is consumed only here
            };
        } else {
            cmd.stdout(Stdio::piped());
        }

        match cmd.spawn() {
            Ok(mut child) => {
                if i != last {
                    match child.stdout.take() {
                        // handing the read side straight to the next stage;
                        // the parent keeps no copy, so EOF propagates
                        Some(stdout) => next_stdin = Some(Stdio::from(stdout)),
                        None => {
                            spawn_err = Some(Error::Exec(format!(
                                "{}: no stdout pipe",
                                programs[i].display()
                            )));
                        }
                    }
                }
                children.push(child);
                if spawn_err.is_some() {
                    break;
                }
            }
            Err(e) => {
                spawn_err = Some(Error::Exec(format!("{}: {e}", programs[i].display())));
                break;
            }
        }
    }

    // Any pipe end still held here belongs to an aborted tail of the chain;
    // dropping it lets the already-running stages see EOF.
    drop(next_stdin);
    drop(socket_out);

    for mut child in children {
        match child.wait() {
            Ok(status) => log_exit(&status),
            Err(e) => warn!("::wait failed: {}", e),
        }
    }

    match spawn_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Resolve every stage's program up front so a typo in a later stage fails
/// the whole command before anything runs.
fn resolve_stages(stages: &[Stage]) -> Result<Vec<PathBuf>> {
    let mut programs = Vec::with_capacity(stages.len());
    for stage in stages {
        let name = stage
            .argv
            .first()
            .ok_or_else(|| Error::Exec("empty pipeline stage".to_string()))?;
        let path = which(name).map_err(|e| Error::Exec(format!("{name}: {e}")))?;
        programs.push(path);
    }
    Ok(programs)
}

fn log_exit(status: &ExitStatus) {
    if let Some(code) = status.code() {
        info!("::child exited, status={}", code);
    } else if let Some(signal) = status.signal() {
        info!("::child killed by signal {}", signal);
    }
}
