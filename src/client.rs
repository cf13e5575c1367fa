use std::io::{self, BufRead};

use crate::error::{Error, Result};
use crate::net;
use crate::transfer::{self, IoCtx};

/// Interactive client: the mirror of the server's session loop. Each turn
/// prints whatever the server has sent (greeting, prompts, command output),
/// forwards one line of user input, then runs the client half of any
/// reserved verb.
pub fn run_client(ip: &str, port: &str) -> Result<()> {
    let stream = net::connect(ip, port)?;
    eprintln!("client: connected");
    let mut io = IoCtx::new(stream)?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    loop {
        if net::drain_available(&mut io.reader, &mut output)? == 0 {
            break; // server closed the connection
        }
        let line = match read_input_line(&mut input)? {
            Some(line) => line,
            None => break, // EOF on stdin
        };
        io.send(&format!("{line}\n"))?;

        match line.as_str() {
            "get" => transfer::client_get(&mut io, &mut input, &mut output)?,
            "put" => transfer::client_put(&mut io, &mut input, &mut output)?,
            "del" => transfer::client_del(&mut io, &mut input, &mut output)?,
            "exit" => break,
            // help and pipeline output arrive with the next prompt drain
            _ => {}
        }
    }
    Ok(())
}

fn read_input_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).map_err(Error::Io)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}
