mod auth;
mod cli;
mod client;
mod commands;
mod config;
mod error;
mod net;
mod pipeline;
mod server;
mod signals;
mod transfer;

use std::env;
use std::process::ExitCode;

use log::error;

use crate::cli::Role;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let args: Vec<String> = env::args().collect();
    let result = match cli::parse_role(&args) {
        Role::Server => server::run_server(config::ServerConfig::from_env()),
        Role::Client { ip, port } => client::run_client(&ip, &port),
        Role::Help => {
            cli::print_help();
            Ok(())
        }
        Role::Version => {
            cli::print_version();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
